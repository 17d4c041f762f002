use std::error::Error;
use std::sync::Arc;
use thiserror::Error;

/// Shared pointer to an arbitrary error, usually coming from user code.
pub type ErrorPtr = Arc<dyn Error + Send + Sync>;

/// Boxed error returned by user-provided constructors, methods and functions. Any error type can
/// be propagated with `?`.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Result of user-provided callables.
pub type CallResult<T> = Result<T, BoxError>;

/// Converts any error into an [ErrorPtr].
pub fn convert_error<E: Error + Send + Sync + 'static>(error: E) -> ErrorPtr {
    Arc::new(error) as ErrorPtr
}

/// Errors raised while interpreting textual parameter values.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum CastError {
    #[error("Cannot interpret '{value}' as {kind}")]
    Format { kind: &'static str, value: String },
    #[error("Unknown environment variable with no default value: {0}")]
    UnknownEnvironmentVariable(String),
}

/// Errors related to registering service definitions.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum DefinitionError {
    #[error("Attempted to define a duplicated parameter named: {0}")]
    DuplicateParameterName(String),
    #[error("Unknown interception event: {0}")]
    UnknownEvent(String),
    #[error("Cannot define '{0}' - the core is on lock-down")]
    CoreOnLockDown(String),
    #[error("Initial calls require both the actor ID and the method name")]
    InvalidInitialCall,
    #[error("Undefined container ID: {0}")]
    UndefinedContainerId(String),
    #[error("Container ID defined more than once in a batch: {0}")]
    DuplicateContainerId(String),
    #[error("Lambda '{0}' does not accept parameters")]
    LambdaParameters(String),
    #[error("Attempted to re-register a type named: {0}")]
    DuplicateTypeName(String),
    #[error("Attempted to re-register a callable named: {0}")]
    DuplicateCallableName(String),
}

/// Errors raised while resolving (activating) services.
#[derive(Error, Clone, Debug)]
pub enum ResolutionError {
    #[error("Undefined container ID: {0}")]
    UndefinedContainerId(String),
    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),
    #[error("Missing parameters for '{id}': {}", .parameters.join(", "))]
    MissingParameter { id: String, parameters: Vec<String> },
    #[error("Unexpected parameter for '{id}': {parameter}")]
    UnexpectedParameter { id: String, parameter: String },
    #[error("Parameter '{parameter}' of '{id}' expects {expected}, but {actual} was given")]
    UnexpectedDefinitionType {
        id: String,
        parameter: String,
        expected: String,
        actual: String,
    },
    #[error("Cannot interpret value: {0}")]
    ValueInterpretation(#[from] CastError),
    #[error("Cannot resolve type: {0}")]
    TypeResolution(String),
    #[error("Cannot resolve callable: {0}")]
    CallableResolution(String),
    #[error("Type '{0}' cannot be constructed directly")]
    NotConstructible(String),
    #[error("Tried to downcast an instance to incompatible type: {0}")]
    IncompatibleInstance(String),
    #[error("{type_name} has no method \"{method}\"")]
    UnknownMethod { type_name: String, method: String },
    #[error("Interceptor '{interceptor}' has no callable method \"{method}\"")]
    NonCallable { interceptor: String, method: String },
    #[error("Invalid interception lookup: {0}")]
    InvalidLookup(String),
    #[error("Cannot call '{callable}': {reason}")]
    Arguments { callable: String, reason: String },
    #[error("The core owning this handle is no longer available")]
    CoreUnavailable,
    #[error("{0}")]
    Failure(ErrorPtr),
}

impl ResolutionError {
    /// Converts an error returned by user code. Container errors propagated through user code are
    /// kept as they are, everything else becomes a [ResolutionError::Failure].
    pub fn from_user_error(error: BoxError) -> Self {
        match error.downcast::<ResolutionError>() {
            Ok(error) => *error,
            Err(error) => Self::Failure(Arc::from(error)),
        }
    }

    /// Returns the error as a shareable pointer, unwrapping user errors.
    pub fn into_error_ptr(self) -> ErrorPtr {
        match self {
            Self::Failure(error) => error,
            error => convert_error(error),
        }
    }
}
