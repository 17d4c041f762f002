//! Per-service activation. Each registered [Container] gets a [Controller], which builds the
//! service on first request and caches it, if the service is cacheable.

pub mod reconciliation;

use crate::catalog::signature::Signature;
use crate::container::{Container, ContainerKind};
use crate::controller::reconciliation::{reconcile, AutoWiring};
use crate::error::ResolutionError;
use crate::instance::ServiceInstance;
use crate::registry::Core;
use crate::value::{Arguments, Value};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use tracing::debug;

/// Result of activating a service. `fresh` is set when the value has just been built, as opposed
/// to being returned from the cache.
#[derive(Clone, Debug)]
pub(crate) struct Activation {
    pub value: Value,
    pub fresh: bool,
}

/// Lazy builder of a single service.
#[derive(Debug)]
pub struct Controller {
    metadata: RwLock<Container>,
    instance: Mutex<Option<Value>>,
    activation_sequence: OnceCell<Vec<String>>,
}

impl Controller {
    pub fn new(metadata: Container) -> Self {
        Self {
            metadata: RwLock::new(metadata),
            instance: Mutex::new(None),
            activation_sequence: OnceCell::new(),
        }
    }

    #[inline]
    pub fn metadata(&self) -> RwLockReadGuard<'_, Container> {
        self.metadata.read()
    }

    pub(crate) fn update_metadata<F: FnOnce(&mut Container)>(&self, update: F) {
        update(&mut self.metadata.write());
    }

    /// Checks if a cached instance exists.
    #[inline]
    pub fn activated(&self) -> bool {
        self.instance.lock().is_some()
    }

    #[inline]
    pub fn cached(&self) -> Option<Value> {
        self.instance.lock().clone()
    }

    /// IDs of all dependencies in activation order, calculated once.
    pub(crate) fn activation_sequence<F>(
        &self,
        calculate: F,
    ) -> Result<Vec<String>, ResolutionError>
    where
        F: FnOnce() -> Result<Vec<String>, ResolutionError>,
    {
        self.activation_sequence
            .get_or_try_init(calculate)
            .map(Clone::clone)
    }

    /// Builds the service, unless a cached instance exists. `chain` contains IDs of services
    /// currently being activated.
    pub(crate) fn activate(
        &self,
        core: &Core,
        chain: &[String],
    ) -> Result<Activation, ResolutionError> {
        if let Some(value) = self.cached() {
            return Ok(Activation {
                value,
                fresh: false,
            });
        }

        let metadata = self.metadata().clone();
        let id = metadata.id();

        if chain.iter().any(|activating| activating == id) {
            let mut cycle = chain.to_vec();
            cycle.push(id.to_string());
            return Err(ResolutionError::CircularDependency(cycle));
        }

        let mut chain = chain.to_vec();
        chain.push(id.to_string());

        debug!(id, "Activating service.");

        let value = match metadata.kind() {
            ContainerKind::Lambda { callable_name } => core
                .transformer()
                .type_resolver()
                .resolve_callable(callable_name)
                .map(Value::Callable)
                .ok_or_else(|| ResolutionError::CallableResolution(callable_name.clone()))?,
            ContainerKind::Entity { type_name } => {
                let descriptor = core
                    .transformer()
                    .type_resolver()
                    .resolve_type(type_name)
                    .ok_or_else(|| ResolutionError::TypeResolution(type_name.clone()))?;

                let arguments =
                    self.prepare_arguments(core, &metadata, descriptor.signature(), &chain)?;
                let object = descriptor.instantiate(arguments)?;

                Value::Service(ServiceInstance::from_parts(object, descriptor)?)
            }
            ContainerKind::Factorization { factory_id, method } => {
                let factory = core.get_with_chain(factory_id, &chain)?;
                let instance = factory
                    .as_service()
                    .ok_or_else(|| ResolutionError::UnknownMethod {
                        type_name: factory.kind_name().to_string(),
                        method: method.clone(),
                    })?;

                let signature = instance
                    .descriptor()
                    .method(method)
                    .ok_or_else(|| ResolutionError::UnknownMethod {
                        type_name: instance.type_name().to_string(),
                        method: method.clone(),
                    })?
                    .signature()
                    .clone();

                let arguments = self.prepare_arguments(core, &metadata, &signature, &chain)?;
                instance.call(method, arguments)?
            }
        };

        let value = core.wrap(id, value);

        if metadata.is_cacheable() {
            let mut instance = self.instance.lock();
            if let Some(existing) = instance.as_ref() {
                return Ok(Activation {
                    value: existing.clone(),
                    fresh: false,
                });
            }

            *instance = Some(value.clone());
        }

        debug!(id, "Activated service.");

        Ok(Activation { value, fresh: true })
    }

    /// Runs initial method calls declared for this service on the freshly activated `value`.
    pub(crate) fn run_initial_calls(
        &self,
        core: &Core,
        value: &Value,
        chain: &[String],
    ) -> Result<(), ResolutionError> {
        let (id, calls) = {
            let metadata = self.metadata();
            (metadata.id().to_string(), metadata.initial_calls().to_vec())
        };

        for call in calls {
            let arguments = core
                .transformer()
                .cast_collection(call.parameters(), core, chain)?;

            let actor = if call.actor_id() == id {
                value.clone()
            } else {
                core.get_with_chain(call.actor_id(), chain)?
            };

            debug!(
                id = call.actor_id(),
                method = call.method(),
                "Running initial call."
            );

            match actor.as_service() {
                Some(instance) => {
                    instance.call(call.method(), arguments)?;
                }
                None => {
                    return Err(ResolutionError::UnknownMethod {
                        type_name: actor.kind_name().to_string(),
                        method: call.method().to_string(),
                    })
                }
            }
        }

        Ok(())
    }

    fn prepare_arguments(
        &self,
        core: &Core,
        metadata: &Container,
        signature: &Signature,
        chain: &[String],
    ) -> Result<Arguments, ResolutionError> {
        let arguments = core
            .transformer()
            .cast_collection(metadata.params(), core, chain)?;

        let auto_wiring = metadata.is_auto_wired().then(|| AutoWiring {
            locator: core,
            naming: core.id_naming(),
            chain,
        });

        reconcile(metadata.id(), signature, arguments, auto_wiring.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::signature::{ParameterDescriptor, Signature};
    use crate::catalog::{CallableDescriptor, TypeCatalog, TypeDescriptor};
    use crate::container::Container;
    use crate::controller::Controller;
    use crate::error::ResolutionError;
    use crate::parameter::ParameterDefinition;
    use crate::registry::CoreBuilder;
    use crate::value::Value;
    use std::sync::Arc;

    struct Counted;

    fn core() -> crate::registry::Core {
        let catalog = TypeCatalog::new(false)
            .with_type(
                TypeDescriptor::builder::<Counted>()
                    .named("test::Counted")
                    .signature(Signature::new().with(ParameterDescriptor::required("label")))
                    .constructor(|_| Ok(Counted))
                    .build(),
            )
            .unwrap()
            .with_callable(CallableDescriptor::new(
                "test::answer",
                Signature::new(),
                |_| Ok(Value::Int(42)),
            ))
            .unwrap();

        CoreBuilder::new()
            .unwrap()
            .with_type_resolver(Arc::new(catalog))
            .build()
    }

    #[test]
    fn should_cache_cacheable_instances() {
        let core = core();
        let controller = Controller::new(
            Container::entity("counted", "test::Counted")
                .with_param(ParameterDefinition::value("a"))
                .unwrap(),
        );

        assert!(!controller.activated());

        let first = controller.activate(&core, &[]).unwrap();
        let second = controller.activate(&core, &[]).unwrap();

        assert!(first.fresh);
        assert!(!second.fresh);
        assert_eq!(first.value, second.value);
        assert!(controller.activated());
    }

    #[test]
    fn should_not_cache_non_cacheable_instances() {
        let core = core();
        let controller = Controller::new(
            Container::entity("counted", "test::Counted")
                .with_param(ParameterDefinition::value("a"))
                .unwrap()
                .with_cacheable(false),
        );

        let first = controller.activate(&core, &[]).unwrap();
        let second = controller.activate(&core, &[]).unwrap();

        assert!(second.fresh);
        assert_ne!(first.value, second.value);
        assert!(!controller.activated());
    }

    #[test]
    fn should_detect_reentry() {
        let core = core();
        let controller = Controller::new(Container::entity("counted", "test::Counted"));

        assert!(matches!(
            controller.activate(&core, &["other".to_string(), "counted".to_string()]),
            Err(ResolutionError::CircularDependency(chain))
                if chain == vec!["other", "counted", "counted"]
        ));
    }

    #[test]
    fn should_return_lambdas_uncalled() {
        let core = core();
        let controller = Controller::new(Container::lambda("answer", "test::answer"));

        let activation = controller.activate(&core, &[]).unwrap();
        let callable = activation.value.as_callable().unwrap();

        assert_eq!(callable.name(), "test::answer");
        assert_eq!(callable.call(Default::default()).unwrap(), Value::Int(42));
    }

    #[test]
    fn should_report_unresolvable_types() {
        let core = core();
        let controller = Controller::new(Container::entity("missing", "test::Missing"));

        assert!(matches!(
            controller.activate(&core, &[]),
            Err(ResolutionError::TypeResolution(name)) if name == "test::Missing"
        ));
        assert!(!controller.activated());
    }
}
