//! Functionality related to describing types and free functions the container can build or
//! return. Since Rust offers no runtime reflection, every constructible type carries an explicit
//! [TypeDescriptor]: its name, constructor [Signature], type-erased constructor and a table of
//! methods callable by name. Free functions are described by [CallableDescriptor]s.
//!
//! Service definitions refer to types and functions by name, which are then looked up by a
//! [TypeResolver]. The default resolver is a [TypeCatalog], which can be populated manually or
//! from descriptors submitted statically:
//!
//! ```
//! use solstice_di::catalog::internal::{submit, TypeRegisterer};
//! use solstice_di::catalog::{TypeDescriptor, TypeDescriptorPtr};
//!
//! struct Clock;
//!
//! fn clock_descriptor() -> TypeDescriptorPtr {
//!     TypeDescriptor::builder::<Clock>()
//!         .constructor(|_| Ok(Clock))
//!         .build()
//! }
//!
//! submit! {
//!     TypeRegisterer { register: clock_descriptor }
//! }
//! ```

pub mod naming;
pub mod signature;

use crate::catalog::internal::{CallableRegisterer, TypeRegisterer};
use crate::catalog::signature::{BoundArguments, Signature};
use crate::error::{CallResult, DefinitionError, ResolutionError};
use crate::instance::InstanceAnyPtr;
use crate::value::{Arguments, Value};
use derivative::Derivative;
use fxhash::FxHashMap;
#[cfg(test)]
use mockall::automock;
use std::any::{type_name, Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

pub type TypeDescriptorPtr = Arc<TypeDescriptor>;
pub type CallableDescriptorPtr = Arc<CallableDescriptor>;
pub type TypeResolverPtr = Arc<dyn TypeResolver + Send + Sync>;

pub type ConstructorFn =
    Arc<dyn Fn(BoundArguments) -> Result<InstanceAnyPtr, ResolutionError> + Send + Sync>;
pub type MethodFn =
    Arc<dyn Fn(&InstanceAnyPtr, BoundArguments) -> Result<Value, ResolutionError> + Send + Sync>;
pub type FunctionFn = Arc<dyn Fn(BoundArguments) -> Result<Value, ResolutionError> + Send + Sync>;

/// A method callable by name on instances of a described type.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct MethodDescriptor {
    name: String,
    signature: Signature,
    #[derivative(Debug = "ignore")]
    function: MethodFn,
}

impl MethodDescriptor {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Calls the method on given instance.
    pub fn invoke(
        &self,
        instance: &InstanceAnyPtr,
        arguments: Arguments,
    ) -> Result<Value, ResolutionError> {
        let arguments = self.signature.bind(&self.name, arguments)?;
        (self.function)(instance, arguments)
    }
}

/// Description of a type known to the container.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct TypeDescriptor {
    name: String,
    type_id: TypeId,
    signature: Signature,
    implements: Vec<String>,
    #[derivative(Debug = "ignore")]
    constructor: Option<ConstructorFn>,
    methods: FxHashMap<String, MethodDescriptor>,
}

impl TypeDescriptor {
    /// Starts describing `T`, named after its [type_name].
    pub fn builder<T: Any + Send + Sync>() -> TypeDescriptorBuilder<T> {
        TypeDescriptorBuilder {
            name: type_name::<T>().to_string(),
            signature: Signature::default(),
            implements: vec![],
            constructor: None,
            methods: Default::default(),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn instance_type_id(&self) -> TypeId {
        self.type_id
    }

    /// Signature of the constructor.
    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    #[inline]
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }

    #[inline]
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Checks if instances of this type can be used where `type_name` is expected - either it's
    /// the same type, or this type declared implementing it.
    pub fn is_compatible(&self, type_name: &str) -> bool {
        self.name == type_name || self.implements.iter().any(|name| name == type_name)
    }

    #[inline]
    pub fn is_constructible(&self) -> bool {
        self.constructor.is_some()
    }

    /// Creates a new type-erased instance.
    pub fn instantiate(&self, arguments: Arguments) -> Result<InstanceAnyPtr, ResolutionError> {
        let constructor = self
            .constructor
            .as_ref()
            .ok_or_else(|| ResolutionError::NotConstructible(self.name.clone()))?;

        let arguments = self.signature.bind(&self.name, arguments)?;
        constructor(arguments)
    }
}

/// Builder for [TypeDescriptor]s with typed constructors and methods.
pub struct TypeDescriptorBuilder<T> {
    name: String,
    signature: Signature,
    implements: Vec<String>,
    constructor: Option<ConstructorFn>,
    methods: FxHashMap<String, MethodDescriptor>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> TypeDescriptorBuilder<T> {
    /// Overrides the default name.
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Sets the constructor signature.
    pub fn signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    /// Declares this type can be used where `type_name` is expected.
    pub fn implements(mut self, type_name: &str) -> Self {
        self.implements.push(type_name.to_string());
        self
    }

    /// Declares this type can be used where `I` is expected.
    pub fn implements_type<I: ?Sized + 'static>(self) -> Self {
        self.implements(type_name::<I>())
    }

    pub fn constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn(BoundArguments) -> CallResult<T> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(move |arguments| {
            constructor(arguments)
                .map(|instance| Arc::new(instance) as InstanceAnyPtr)
                .map_err(ResolutionError::from_user_error)
        }));
        self
    }

    /// Adds a method callable by name.
    pub fn method<F>(mut self, name: &str, signature: Signature, method: F) -> Self
    where
        F: Fn(&T, BoundArguments) -> CallResult<Value> + Send + Sync + 'static,
    {
        let function: MethodFn = Arc::new(move |instance, arguments| {
            let this = (**instance).downcast_ref::<T>().ok_or_else(|| {
                ResolutionError::IncompatibleInstance(type_name::<T>().to_string())
            })?;

            method(this, arguments).map_err(ResolutionError::from_user_error)
        });

        self.methods.insert(
            name.to_string(),
            MethodDescriptor {
                name: name.to_string(),
                signature,
                function,
            },
        );
        self
    }

    pub fn build(self) -> TypeDescriptorPtr {
        Arc::new(TypeDescriptor {
            name: self.name,
            type_id: TypeId::of::<T>(),
            signature: self.signature,
            implements: self.implements,
            constructor: self.constructor,
            methods: self.methods,
        })
    }
}

/// Description of a free function, returned as-is by lambda services.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct CallableDescriptor {
    name: String,
    signature: Signature,
    #[derivative(Debug = "ignore")]
    function: FunctionFn,
}

impl CallableDescriptor {
    pub fn new<F>(name: &str, signature: Signature, function: F) -> CallableDescriptorPtr
    where
        F: Fn(BoundArguments) -> CallResult<Value> + Send + Sync + 'static,
    {
        Arc::new(Self {
            name: name.to_string(),
            signature,
            function: Arc::new(move |arguments| {
                function(arguments).map_err(ResolutionError::from_user_error)
            }),
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn call(&self, arguments: Arguments) -> Result<Value, ResolutionError> {
        let arguments = self.signature.bind(&self.name, arguments)?;
        (self.function)(arguments)
    }
}

/// Looks up types and free functions by their fully-qualified names.
#[cfg_attr(test, automock)]
pub trait TypeResolver {
    fn resolve_type(&self, name: &str) -> Option<TypeDescriptorPtr>;

    fn resolve_callable(&self, name: &str) -> Option<CallableDescriptorPtr>;
}

/// [TypeResolver] backed by maps of registered descriptors.
#[derive(Clone, Debug, Default)]
pub struct TypeCatalog {
    types: FxHashMap<String, TypeDescriptorPtr>,
    callables: FxHashMap<String, CallableDescriptorPtr>,
    allow_overriding: bool,
}

impl TypeCatalog {
    /// Creates an empty catalog.
    pub fn new(allow_overriding: bool) -> Self {
        Self {
            allow_overriding,
            ..Default::default()
        }
    }

    /// Creates a catalog containing all statically submitted descriptors.
    pub fn with_static_registrations(allow_overriding: bool) -> Result<Self, DefinitionError> {
        let mut catalog = Self::new(allow_overriding);

        for registerer in inventory::iter::<TypeRegisterer> {
            catalog.register_type((registerer.register)())?;
        }

        for registerer in inventory::iter::<CallableRegisterer> {
            catalog.register_callable((registerer.register)())?;
        }

        Ok(catalog)
    }

    pub fn register_type(&mut self, descriptor: TypeDescriptorPtr) -> Result<(), DefinitionError> {
        if !self.allow_overriding && self.types.contains_key(descriptor.name()) {
            return Err(DefinitionError::DuplicateTypeName(
                descriptor.name().to_string(),
            ));
        }

        self.types.insert(descriptor.name().to_string(), descriptor);
        Ok(())
    }

    pub fn register_callable(
        &mut self,
        descriptor: CallableDescriptorPtr,
    ) -> Result<(), DefinitionError> {
        if !self.allow_overriding && self.callables.contains_key(descriptor.name()) {
            return Err(DefinitionError::DuplicateCallableName(
                descriptor.name().to_string(),
            ));
        }

        self.callables
            .insert(descriptor.name().to_string(), descriptor);
        Ok(())
    }

    /// Builder-style version of [TypeCatalog::register_type].
    pub fn with_type(mut self, descriptor: TypeDescriptorPtr) -> Result<Self, DefinitionError> {
        self.register_type(descriptor)?;
        Ok(self)
    }

    /// Builder-style version of [TypeCatalog::register_callable].
    pub fn with_callable(
        mut self,
        descriptor: CallableDescriptorPtr,
    ) -> Result<Self, DefinitionError> {
        self.register_callable(descriptor)?;
        Ok(self)
    }
}

impl TypeResolver for TypeCatalog {
    #[inline]
    fn resolve_type(&self, name: &str) -> Option<TypeDescriptorPtr> {
        self.types.get(name).cloned()
    }

    #[inline]
    fn resolve_callable(&self, name: &str) -> Option<CallableDescriptorPtr> {
        self.callables.get(name).cloned()
    }
}

#[doc(hidden)]
pub mod internal {
    use crate::catalog::{CallableDescriptorPtr, TypeDescriptorPtr};
    use inventory::collect;
    pub use inventory::submit;

    pub struct TypeRegisterer {
        pub register: fn() -> TypeDescriptorPtr,
    }

    pub struct CallableRegisterer {
        pub register: fn() -> CallableDescriptorPtr,
    }

    collect!(TypeRegisterer);
    collect!(CallableRegisterer);
}
