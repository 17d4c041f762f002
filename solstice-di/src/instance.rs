use crate::catalog::TypeDescriptorPtr;
use crate::error::ResolutionError;
use crate::value::{Arguments, Value};
use crate::wrapper::Wrapper;
use std::any::{Any, TypeId};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

pub type InstanceAnyPtr = Arc<dyn Any + Send + Sync>;

/// Handle to an activated service: the type-erased object, its
/// [TypeDescriptor](crate::catalog::TypeDescriptor) and, if any interceptions apply to the
/// service, the intercepting [Wrapper].
///
/// Calls made via [ServiceInstance::call] go through the wrapper. Accessing the concrete object
/// with [ServiceInstance::downcast] bypasses interception.
#[derive(Clone)]
pub struct ServiceInstance {
    object: InstanceAnyPtr,
    descriptor: TypeDescriptorPtr,
    wrapper: Option<Arc<Wrapper>>,
}

impl ServiceInstance {
    /// Creates a new instance handle. Fails if `object` is not of the described type.
    pub fn new<T: Any + Send + Sync>(
        object: T,
        descriptor: TypeDescriptorPtr,
    ) -> Result<Self, ResolutionError> {
        Self::from_parts(Arc::new(object), descriptor)
    }

    /// Creates a new instance handle from a type-erased object.
    pub fn from_parts(
        object: InstanceAnyPtr,
        descriptor: TypeDescriptorPtr,
    ) -> Result<Self, ResolutionError> {
        if (*object).type_id() != descriptor.instance_type_id() {
            return Err(ResolutionError::IncompatibleInstance(
                descriptor.name().to_string(),
            ));
        }

        Ok(Self {
            object,
            descriptor,
            wrapper: None,
        })
    }

    pub(crate) fn wrapped(self, wrapper: Wrapper) -> Self {
        Self {
            object: self.object.clone(),
            descriptor: self.descriptor.clone(),
            wrapper: Some(Arc::new(wrapper)),
        }
    }

    #[inline]
    pub fn type_name(&self) -> &str {
        self.descriptor.name()
    }

    #[inline]
    pub fn descriptor(&self) -> &TypeDescriptorPtr {
        &self.descriptor
    }

    #[inline]
    pub fn is_wrapped(&self) -> bool {
        self.wrapper.is_some()
    }

    #[inline]
    pub fn object_type_id(&self) -> TypeId {
        (*self.object).type_id()
    }

    /// Returns the concrete object, if it's of type `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.object.clone().downcast::<T>().ok()
    }

    #[inline]
    pub fn has_method(&self, method: &str) -> bool {
        self.descriptor.has_method(method)
    }

    /// Calls a method by name, running any registered interceptions.
    pub fn call(&self, method: &str, arguments: Arguments) -> Result<Value, ResolutionError> {
        match &self.wrapper {
            Some(wrapper) => wrapper.call(method, arguments),
            None => self.call_unintercepted(method, arguments),
        }
    }

    pub(crate) fn call_unintercepted(
        &self,
        method: &str,
        arguments: Arguments,
    ) -> Result<Value, ResolutionError> {
        self.descriptor
            .method(method)
            .ok_or_else(|| ResolutionError::UnknownMethod {
                type_name: self.type_name().to_string(),
                method: method.to_string(),
            })?
            .invoke(&self.object, arguments)
    }

    /// Checks if both handles point to the same object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::as_ptr(&self.object) as *const () == Arc::as_ptr(&other.object) as *const ()
    }
}

impl Debug for ServiceInstance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("type_name", &self.type_name())
            .field("wrapped", &self.is_wrapped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::signature::Signature;
    use crate::catalog::TypeDescriptor;
    use crate::error::ResolutionError;
    use crate::instance::ServiceInstance;
    use crate::value::{Arguments, Value};
    use std::any::TypeId;
    use std::sync::Arc;

    struct Echo;

    #[test]
    fn should_call_methods_by_name() {
        let descriptor = TypeDescriptor::builder::<Echo>()
            .method("ping", Signature::new(), |_, _| Ok(Value::from("pong")))
            .build();
        let instance = ServiceInstance::new(Echo, descriptor).unwrap();

        assert_eq!(
            instance.call("ping", Arguments::new()).unwrap(),
            Value::from("pong")
        );
        assert!(matches!(
            instance.call("missing", Arguments::new()),
            Err(ResolutionError::UnknownMethod { method, .. }) if method == "missing"
        ));
        assert!(instance.downcast::<Echo>().is_some());
        assert!(instance.downcast::<u8>().is_none());
        assert!(instance.ptr_eq(&instance.clone()));
    }

    #[test]
    fn should_accept_objects_of_described_type() {
        let descriptor = TypeDescriptor::builder::<Echo>().build();
        let instance = ServiceInstance::from_parts(Arc::new(Echo), descriptor.clone()).unwrap();

        assert_eq!(instance.object_type_id(), descriptor.instance_type_id());
        assert_eq!(instance.object_type_id(), TypeId::of::<Echo>());
    }

    #[test]
    fn should_reject_mismatched_descriptors() {
        let descriptor = TypeDescriptor::builder::<Echo>().build();
        assert!(ServiceInstance::new(1u8, descriptor).is_err());
    }
}
