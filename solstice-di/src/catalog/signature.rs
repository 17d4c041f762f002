//! Explicit descriptions of callable signatures. Each constructor, method and function known to
//! the container declares its formal parameters up front, which is what makes auto-wiring and
//! parameter reconciliation possible without runtime reflection.

use crate::catalog::{CallableDescriptorPtr, TypeDescriptorPtr};
use crate::error::{ErrorPtr, ResolutionError};
use crate::instance::ServiceInstance;
use crate::registry::CoreHandle;
use crate::value::{Arguments, Value};
use indexmap::IndexMap;
use std::any::{type_name, Any};
use std::sync::Arc;

/// Declared type of a formal parameter.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Annotation {
    /// Accepts anything.
    Any,
    Str,
    Int,
    Float,
    Bool,
    List,
    Tuple,
    Set,
    Dict,
    Type,
    /// Generic callable marker - not checked.
    Callable,
    Core,
    /// A service of the given type name (or a type implementing it).
    Service(String),
}

impl Annotation {
    /// Service annotation for a Rust type, using its [type_name].
    pub fn service<T: ?Sized + 'static>() -> Self {
        Self::Service(type_name::<T>().to_string())
    }

    /// Checks if given value conforms to this annotation.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Annotation::Any, _) | (Annotation::Callable, _) => true,
            (Annotation::Str, Value::Str(_))
            | (Annotation::Int, Value::Int(_))
            | (Annotation::Float, Value::Float(_))
            | (Annotation::Bool, Value::Bool(_))
            | (Annotation::List, Value::List(_))
            | (Annotation::Tuple, Value::Tuple(_))
            | (Annotation::Set, Value::Set(_))
            | (Annotation::Dict, Value::Dict(_))
            | (Annotation::Type, Value::Type(_))
            | (Annotation::Core, Value::Core(_)) => true,
            (Annotation::Service(name), Value::Service(instance)) => {
                instance.descriptor().is_compatible(name)
            }
            _ => false,
        }
    }

    /// Human-readable name of the expected type.
    pub fn describe(&self) -> String {
        match self {
            Annotation::Service(name) => name.clone(),
            annotation => format!("{annotation:?}").to_lowercase(),
        }
    }
}

/// How a formal parameter receives its value.
#[derive(Clone, Debug, PartialEq)]
pub enum ParameterKind {
    Required,
    Optional(Value),
    /// Catch-all for overflowing positional arguments.
    VarPositional,
    /// Catch-all for unmatched keyword arguments.
    VarKeyword,
}

/// A single formal parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterDescriptor {
    name: String,
    kind: ParameterKind,
    annotation: Option<Annotation>,
}

impl ParameterDescriptor {
    pub fn required(name: &str) -> Self {
        Self::new(name, ParameterKind::Required)
    }

    pub fn optional<T: Into<Value>>(name: &str, default: T) -> Self {
        Self::new(name, ParameterKind::Optional(default.into()))
    }

    pub fn var_positional(name: &str) -> Self {
        Self::new(name, ParameterKind::VarPositional)
    }

    pub fn var_keyword(name: &str) -> Self {
        Self::new(name, ParameterKind::VarKeyword)
    }

    fn new(name: &str, kind: ParameterKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            annotation: None,
        }
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotation = Some(annotation);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> &ParameterKind {
        &self.kind
    }

    #[inline]
    pub fn annotation(&self) -> Option<&Annotation> {
        self.annotation.as_ref()
    }

    #[inline]
    pub fn is_required(&self) -> bool {
        self.kind == ParameterKind::Required
    }

    #[inline]
    pub fn is_variadic(&self) -> bool {
        matches!(
            self.kind,
            ParameterKind::VarPositional | ParameterKind::VarKeyword
        )
    }
}

/// Ordered list of formal parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Signature {
    parameters: Vec<ParameterDescriptor>,
}

impl Signature {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    #[inline]
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// Non-variadic parameters in declaration order.
    pub fn fixed(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        self.parameters
            .iter()
            .filter(|parameter| !parameter.is_variadic())
    }

    pub fn var_positional(&self) -> Option<&ParameterDescriptor> {
        self.parameters
            .iter()
            .find(|parameter| parameter.kind == ParameterKind::VarPositional)
    }

    pub fn var_keyword(&self) -> Option<&ParameterDescriptor> {
        self.parameters
            .iter()
            .find(|parameter| parameter.kind == ParameterKind::VarKeyword)
    }

    /// Binds call arguments to formal parameters: positional values fill fixed parameters in
    /// order, keywords match by name, overflow goes to the variadic buckets and missing optional
    /// parameters get their defaults.
    pub fn bind(
        &self,
        callable: &str,
        arguments: Arguments,
    ) -> Result<BoundArguments, ResolutionError> {
        let error = |reason: String| ResolutionError::Arguments {
            callable: callable.to_string(),
            reason,
        };

        let fixed: Vec<&ParameterDescriptor> = self.fixed().collect();
        let mut values = IndexMap::with_capacity(fixed.len());
        let mut positional = arguments.positional.into_iter();

        for (parameter, value) in fixed.iter().zip(&mut positional) {
            values.insert(parameter.name.clone(), value);
        }

        let rest: Vec<Value> = positional.collect();
        if !rest.is_empty() && self.var_positional().is_none() {
            return Err(error(format!(
                "takes {} positional arguments but {} were given",
                fixed.len(),
                fixed.len() + rest.len()
            )));
        }

        let mut extra = IndexMap::new();
        for (name, value) in arguments.keyword {
            if fixed.iter().any(|parameter| parameter.name == name) {
                if values.contains_key(&name) {
                    return Err(error(format!("got multiple values for argument '{name}'")));
                }

                values.insert(name, value);
            } else if self.var_keyword().is_some() {
                extra.insert(name, value);
            } else {
                return Err(error(format!("got an unexpected keyword argument '{name}'")));
            }
        }

        let mut missing = vec![];
        for parameter in &fixed {
            if values.contains_key(&parameter.name) {
                continue;
            }

            match &parameter.kind {
                ParameterKind::Optional(default) => {
                    values.insert(parameter.name.clone(), default.clone());
                }
                _ => missing.push(parameter.name.as_str()),
            }
        }

        if !missing.is_empty() {
            return Err(error(format!(
                "missing required arguments: {}",
                missing.join(", ")
            )));
        }

        Ok(BoundArguments {
            callable: callable.to_string(),
            values,
            rest,
            extra,
        })
    }
}

/// Conversion from a [Value] for typed access to [BoundArguments].
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_int()
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_float()
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for Vec<Value> {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_sequence().map(<[Value]>::to_vec)
    }
}

impl FromValue for IndexMap<String, Value> {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_dict().cloned()
    }
}

impl FromValue for ServiceInstance {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_service().cloned()
    }
}

impl FromValue for TypeDescriptorPtr {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_type().cloned()
    }
}

impl FromValue for CallableDescriptorPtr {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_callable().cloned()
    }
}

impl FromValue for CoreHandle {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_core().cloned()
    }
}

impl FromValue for ErrorPtr {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_error().cloned()
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::None => Some(None),
            value => T::from_value(value).map(Some),
        }
    }
}

/// Arguments bound to a [Signature], passed to constructors, methods and functions.
#[derive(Clone, Debug)]
pub struct BoundArguments {
    callable: String,
    values: IndexMap<String, Value>,
    rest: Vec<Value>,
    extra: IndexMap<String, Value>,
}

impl BoundArguments {
    /// Raw value of a fixed parameter.
    #[inline]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Typed value of a fixed parameter.
    pub fn get<T: FromValue>(&self, name: &str) -> Result<T, ResolutionError> {
        let value = self.values.get(name).ok_or_else(|| ResolutionError::Arguments {
            callable: self.callable.clone(),
            reason: format!("no parameter named '{name}'"),
        })?;

        T::from_value(value).ok_or_else(|| ResolutionError::Arguments {
            callable: self.callable.clone(),
            reason: format!(
                "parameter '{name}' holds {}, which cannot be converted to {}",
                value.kind_name(),
                type_name::<T>()
            ),
        })
    }

    /// Concrete service instance passed as a fixed parameter.
    pub fn service<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, ResolutionError> {
        self.get::<ServiceInstance>(name)?
            .downcast::<T>()
            .ok_or_else(|| ResolutionError::IncompatibleInstance(type_name::<T>().to_string()))
    }

    /// Overflowing positional arguments.
    #[inline]
    pub fn rest(&self) -> &[Value] {
        &self.rest
    }

    /// Unmatched keyword arguments.
    #[inline]
    pub fn extra(&self) -> &IndexMap<String, Value> {
        &self.extra
    }
}
