//! Programmatic definition of services. Each `define_*` method of [Core] passes a
//! [DefinitionContext] bound to a single service to the given closure:
//!
//! ```
//! use solstice_di::registry::Core;
//!
//! let core = Core::new().unwrap();
//! core.define_entity("greeter", "app::Greeter", |context| {
//!     context
//!         .set_param("Hello", Some("greeting"))?
//!         .add_dependency("printer", None)?;
//!
//!     context.call("warm_up", None, |call| {
//!         call.with_param(3, Some("times"))?;
//!         Ok(())
//!     })?;
//!
//!     Ok(())
//! })
//! .unwrap();
//!
//! assert!(core.contain("greeter"));
//! ```

use crate::container::{Container, Event, Interception, MethodCall};
use crate::error::DefinitionError;
use crate::parameter::{Definition, ParameterCollection, ParameterDefinition};
use crate::registry::Core;
use crate::value::Value;

/// Builder bound to a single service definition.
pub struct DefinitionContext {
    container: Container,
    initial_calls: Vec<MethodCall>,
}

impl DefinitionContext {
    fn new(container: Container) -> Self {
        Self {
            container,
            initial_calls: vec![],
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        self.container.id()
    }

    #[inline]
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Adds a parameter.
    pub fn add_param(&mut self, param: ParameterDefinition) -> Result<&mut Self, DefinitionError> {
        self.container.add_param(param)?;
        Ok(self)
    }

    /// Adds a ready-made value as a parameter - positional if `name` is not given.
    pub fn set_param<T: Into<Value>>(
        &mut self,
        value: T,
        name: Option<&str>,
    ) -> Result<&mut Self, DefinitionError> {
        self.add_param(ParameterDefinition::new(
            Definition::Value(value.into()),
            name,
            false,
        ))
    }

    /// Adds a reference to another service as a parameter.
    pub fn add_dependency(
        &mut self,
        id: &str,
        name: Option<&str>,
    ) -> Result<&mut Self, DefinitionError> {
        self.add_param(ParameterDefinition::new(
            Definition::Service(id.to_string()),
            name,
            true,
        ))
    }

    /// Adds a reference to a type as a parameter.
    pub fn add_class_info(
        &mut self,
        type_name: &str,
        name: Option<&str>,
    ) -> Result<&mut Self, DefinitionError> {
        self.add_param(ParameterDefinition::new(
            Definition::Type(type_name.to_string()),
            name,
            true,
        ))
    }

    pub fn set_cacheable(&mut self, cacheable: bool) -> &mut Self {
        self.container.set_cacheable(cacheable);
        self
    }

    pub fn set_auto_wired(&mut self, auto_wired: bool) -> &mut Self {
        self.container.set_auto_wired(auto_wired);
        self
    }

    /// Makes this service intercept `method` of service `intercepted_id` with its own
    /// `intercepting_method`.
    pub fn intercept(
        &mut self,
        event: Event,
        intercepted_id: &str,
        method: &str,
        intercepting_method: &str,
    ) -> &mut Self {
        let interceptor_id = self.container.id().to_string();
        self.container.add_interception(Interception::new(
            event,
            intercepted_id,
            method,
            &interceptor_id,
            intercepting_method,
        ));
        self
    }

    /// Adds a fully configured interception.
    pub fn add_interception(&mut self, interception: Interception) -> &mut Self {
        self.container.add_interception(interception);
        self
    }

    /// Declares an initial call of `method`. Without `origin`, the method is called on this
    /// service. Otherwise it's called on the `origin` service.
    pub fn call<F>(
        &mut self,
        method: &str,
        origin: Option<&str>,
        configure: F,
    ) -> Result<&mut Self, DefinitionError>
    where
        F: FnOnce(&mut MethodCallContext) -> Result<(), DefinitionError>,
    {
        let mut context = MethodCallContext::default();
        configure(&mut context)?;

        match origin {
            None => {
                let call = MethodCall::new(self.container.id(), method, context.parameters);
                self.container.add_initial_call(call);
            }
            Some(origin) => {
                let call = MethodCall::new(origin, method, context.parameters);
                if call.actor_id().is_empty() || call.method().is_empty() {
                    return Err(DefinitionError::InvalidInitialCall);
                }

                self.initial_calls.push(call);
            }
        }

        Ok(self)
    }
}

/// Builder for parameters of an initial call.
#[derive(Debug, Default)]
pub struct MethodCallContext {
    parameters: ParameterCollection,
}

impl MethodCallContext {
    pub fn add_param(&mut self, param: ParameterDefinition) -> Result<&mut Self, DefinitionError> {
        self.parameters.add(param)?;
        Ok(self)
    }

    pub fn with_param<T: Into<Value>>(
        &mut self,
        value: T,
        name: Option<&str>,
    ) -> Result<&mut Self, DefinitionError> {
        self.add_param(ParameterDefinition::new(
            Definition::Value(value.into()),
            name,
            false,
        ))
    }

    pub fn with_entity(
        &mut self,
        id: &str,
        name: Option<&str>,
    ) -> Result<&mut Self, DefinitionError> {
        self.add_param(ParameterDefinition::new(
            Definition::Service(id.to_string()),
            name,
            true,
        ))
    }

    pub fn with_type(
        &mut self,
        type_name: &str,
        name: Option<&str>,
    ) -> Result<&mut Self, DefinitionError> {
        self.add_param(ParameterDefinition::new(
            Definition::Type(type_name.to_string()),
            name,
            true,
        ))
    }
}

impl Core {
    /// Defines a service built by instantiating `type_name`.
    pub fn define_entity<F>(
        &self,
        id: &str,
        type_name: &str,
        define: F,
    ) -> Result<(), DefinitionError>
    where
        F: FnOnce(&mut DefinitionContext) -> Result<(), DefinitionError>,
    {
        self.define(Container::entity(id, type_name), define)
    }

    /// Defines a service built by calling `method` of the `factory_id` service.
    pub fn define_factorization<F>(
        &self,
        id: &str,
        factory_id: &str,
        method: &str,
        define: F,
    ) -> Result<(), DefinitionError>
    where
        F: FnOnce(&mut DefinitionContext) -> Result<(), DefinitionError>,
    {
        self.define(Container::factorization(id, factory_id, method), define)
    }

    /// Defines a service referring to the free function `callable_name`.
    pub fn define_lambda<F>(
        &self,
        id: &str,
        callable_name: &str,
        define: F,
    ) -> Result<(), DefinitionError>
    where
        F: FnOnce(&mut DefinitionContext) -> Result<(), DefinitionError>,
    {
        self.define(Container::lambda(id, callable_name), define)
    }

    /// Modifies an existing definition.
    pub fn update_definition<F>(&self, id: &str, define: F) -> Result<(), DefinitionError>
    where
        F: FnOnce(&mut DefinitionContext) -> Result<(), DefinitionError>,
    {
        let container = self
            .get_metadata(id)
            .map_err(|_| DefinitionError::UndefinedContainerId(id.to_string()))?;

        self.define(container, define)
    }

    fn define<F>(&self, container: Container, define: F) -> Result<(), DefinitionError>
    where
        F: FnOnce(&mut DefinitionContext) -> Result<(), DefinitionError>,
    {
        let mut context = DefinitionContext::new(container);
        define(&mut context)?;

        let DefinitionContext {
            container,
            initial_calls,
        } = context;

        let id = container.id().to_string();
        self.register(vec![(id, container)], initial_calls)
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::TypeCatalog;
    use crate::container::{ContainerKind, Event};
    use crate::error::DefinitionError;
    use crate::parameter::Definition;
    use crate::registry::{Core, CoreBuilder};
    use crate::value::Value;
    use std::sync::Arc;

    fn core() -> Core {
        CoreBuilder::new()
            .unwrap()
            .with_type_resolver(Arc::new(TypeCatalog::new(false)))
            .build()
    }

    #[test]
    fn should_define_entities() {
        let core = core();
        core.define_entity("worker", "app::Worker", |context| {
            context
                .set_param(1, None)?
                .add_dependency("queue", Some("queue"))?
                .add_class_info("app::Job", Some("job"))?
                .set_cacheable(false);
            context.intercept(Event::After, "queue", "push", "on_push");
            Ok(())
        })
        .unwrap();

        let metadata = core.get_metadata("worker").unwrap();
        assert_eq!(
            metadata.kind(),
            &ContainerKind::Entity {
                type_name: "app::Worker".to_string()
            }
        );
        assert_eq!(metadata.params().sequence()[0].raw(), Value::Int(1));
        assert_eq!(
            metadata.params().items()["queue"].definition(),
            &Definition::Service("queue".to_string())
        );
        assert!(!metadata.is_cacheable());
        assert_eq!(metadata.dependencies(), ["queue"]);
        assert_eq!(metadata.interceptions()[0].interceptor_id(), "worker");
    }

    #[test]
    fn should_declare_initial_calls() {
        let core = core();
        core.define_entity("a", "app::A", |_| Ok(())).unwrap();
        core.define_entity("b", "app::B", |context| {
            context.call("start", None, |call| {
                call.with_entity("a", None)?.with_param("fast", Some("mode"))?;
                Ok(())
            })?;
            context.call("notify", Some("a"), |_| Ok(()))?;
            Ok(())
        })
        .unwrap();

        let b = core.get_metadata("b").unwrap();
        assert_eq!(b.initial_calls().len(), 1);
        assert_eq!(b.initial_calls()[0].actor_id(), "b");
        assert_eq!(b.dependencies(), ["a"]);

        core.lock_down();
        let a = core.get_metadata("a").unwrap();
        assert_eq!(a.initial_calls()[0].method(), "notify");
    }

    #[test]
    fn should_reject_lambda_parameters() {
        let core = core();
        assert_eq!(
            core.define_lambda("add", "math::add", |context| {
                context.set_param(1, None)?;
                Ok(())
            })
            .unwrap_err(),
            DefinitionError::LambdaParameters("add".to_string())
        );
        assert!(!core.contain("add"));
    }

    #[test]
    fn should_update_existing_definitions() {
        let core = core();
        core.define_factorization("product", "factory", "make", |_| Ok(()))
            .unwrap();
        core.update_definition("product", |context| {
            context.set_param("x", Some("name"))?;
            Ok(())
        })
        .unwrap();

        assert_eq!(core.get_metadata("product").unwrap().params().len(), 1);
        assert_eq!(
            core.update_definition("missing", |_| Ok(())).unwrap_err(),
            DefinitionError::UndefinedContainerId("missing".to_string())
        );
    }

    #[test]
    fn should_reject_definitions_on_lock_down() {
        let core = core();
        core.lock_down();

        assert_eq!(
            core.define_entity("a", "app::A", |_| Ok(())).unwrap_err(),
            DefinitionError::CoreOnLockDown("a".to_string())
        );
    }

    #[test]
    fn should_not_define_services_with_rejected_initial_calls() {
        let core = Core::standalone().unwrap();
        core.lock_down();

        assert_eq!(
            core.define_entity("late", "app::A", |context| {
                context.call("notify", Some("other"), |_| Ok(()))?;
                Ok(())
            })
            .unwrap_err(),
            DefinitionError::CoreOnLockDown("other".to_string())
        );
        assert!(!core.contain("late"));

        core.define_entity("late", "app::A", |_| Ok(())).unwrap();
        assert!(core.contain("late"));
    }
}
