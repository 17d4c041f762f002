//! The [Core] registry maps service IDs to [Controller]s and drives activation.
//!
//! Definitions are accepted until the first service is requested. At that point the core locks
//! down: pending initial calls are merged into their target definitions and the interception
//! graph is compiled. Requesting a service activates all its transitive dependencies first (in a
//! deterministic order, dependencies before dependants), then the service itself, and finally
//! runs initial calls of everything which has just been activated.

use crate::catalog::naming::{fully_qualified_type_name, IdNaming};
use crate::catalog::{TypeCatalog, TypeResolverPtr};
use crate::container::{Container, Event, Interception, MethodCall};
use crate::controller::Controller;
use crate::error::{DefinitionError, ResolutionError};
use crate::transformer::{EnvironmentPtr, ProcessEnvironment, ServiceLocator, Transformer};
use crate::value::Value;
use crate::wrapper::Wrapper;
use fxhash::{FxHashMap, FxHashSet};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::any::{type_name, Any};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Reserved IDs resolving to the core itself.
pub const SELF_IDS: [&str; 2] = ["container", "core"];

/// Interceptions of a single method, grouped by event in registration order.
pub type EventInterceptions = IndexMap<Event, Vec<Interception>>;

/// Interceptions of a single service, grouped by intercepted method.
pub type MethodInterceptions = IndexMap<String, EventInterceptions>;

/// Interceptions of all services, grouped by intercepted service ID.
pub type InterceptionGraph = FxHashMap<String, MethodInterceptions>;

/// Result of [Core::get_interceptions], depending on how specific the lookup was.
#[derive(Clone, Debug, PartialEq)]
pub enum InterceptionLookup {
    /// All interceptions of a service.
    All(MethodInterceptions),
    /// Interceptions for a given event, grouped by method.
    ByEvent(IndexMap<String, Vec<Interception>>),
    /// Interceptions for a given event and method.
    Exact(Vec<Interception>),
}

struct Shared {
    controllers: RwLock<IndexMap<String, Arc<Controller>>>,
    locked_down: AtomicBool,
    standalone: bool,
    interception_graph: RwLock<InterceptionGraph>,
    pending_initial_calls: Mutex<IndexMap<String, Vec<MethodCall>>>,
    registration: Mutex<()>,
    transformer: Transformer,
    id_naming: IdNaming,
}

/// Builder for [Core]s.
pub struct CoreBuilder {
    type_resolver: TypeResolverPtr,
    environment: EnvironmentPtr,
    id_naming: IdNaming,
    standalone: bool,
}

impl CoreBuilder {
    /// Creates a new builder with a default configuration: statically registered types, process
    /// environment and fully-qualified type names as auto-wiring IDs.
    pub fn new() -> Result<Self, DefinitionError> {
        Ok(Self {
            type_resolver: Arc::new(TypeCatalog::with_static_registrations(true)?),
            environment: Arc::new(ProcessEnvironment),
            id_naming: fully_qualified_type_name,
            standalone: false,
        })
    }

    /// Sets new [TypeResolver](crate::catalog::TypeResolver).
    pub fn with_type_resolver(mut self, type_resolver: TypeResolverPtr) -> Self {
        self.type_resolver = type_resolver;
        self
    }

    /// Sets new [Environment](crate::transformer::Environment) used for interpolation.
    pub fn with_environment(mut self, environment: EnvironmentPtr) -> Self {
        self.environment = environment;
        self
    }

    /// Sets new strategy for deriving IDs of auto-wired services.
    pub fn with_id_naming(mut self, id_naming: IdNaming) -> Self {
        self.id_naming = id_naming;
        self
    }

    /// Standalone cores accept definitions of new IDs after lock-down. Redefinition is still
    /// rejected. Interceptions declared that way only apply to instances activated afterwards,
    /// since cached instances keep the wrapper they were created with.
    pub fn with_standalone(mut self, standalone: bool) -> Self {
        self.standalone = standalone;
        self
    }

    /// Builds resulting [Core].
    pub fn build(self) -> Core {
        Core {
            shared: Arc::new(Shared {
                controllers: Default::default(),
                locked_down: AtomicBool::new(false),
                standalone: self.standalone,
                interception_graph: Default::default(),
                pending_initial_calls: Default::default(),
                registration: Mutex::new(()),
                transformer: Transformer::new(self.type_resolver, self.environment),
                id_naming: self.id_naming,
            }),
        }
    }
}

/// Registry of service definitions and their activated instances. Cloning produces another
/// reference to the same registry.
#[derive(Clone)]
pub struct Core {
    shared: Arc<Shared>,
}

impl Core {
    /// Creates a core with default configuration. See [CoreBuilder::new].
    pub fn new() -> Result<Self, DefinitionError> {
        CoreBuilder::new().map(CoreBuilder::build)
    }

    /// Creates a standalone core with default configuration.
    pub fn standalone() -> Result<Self, DefinitionError> {
        CoreBuilder::new().map(|builder| builder.with_standalone(true).build())
    }

    /// Returns a weak handle to this core, which is what services receive when depending on the
    /// core.
    pub fn handle(&self) -> CoreHandle {
        CoreHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }

    #[inline]
    pub fn transformer(&self) -> &Transformer {
        &self.shared.transformer
    }

    #[inline]
    pub fn id_naming(&self) -> IdNaming {
        self.shared.id_naming
    }

    #[inline]
    pub fn is_standalone(&self) -> bool {
        self.shared.standalone
    }

    #[inline]
    pub fn is_on_lockdown(&self) -> bool {
        self.shared.locked_down.load(Ordering::Acquire)
    }

    /// Defines (or redefines) a service. The container gets `id` assigned.
    pub fn set_metadata(&self, id: &str, container: Container) -> Result<(), DefinitionError> {
        self.register(vec![(id.to_string(), container)], vec![])
    }

    /// Defines multiple services at once. Either all are defined, or none.
    pub fn update_metadata<I>(&self, containers: I) -> Result<(), DefinitionError>
    where
        I: IntoIterator<Item = (String, Container)>,
    {
        self.register(containers.into_iter().collect(), vec![])
    }

    /// Declares a method to call after the actor gets activated.
    pub fn set_initial_call(&self, call: MethodCall) -> Result<(), DefinitionError> {
        self.register(vec![], vec![call])
    }

    /// Defines services together with initial calls declared on any service, under a single
    /// registration lock. Nothing is registered if any part is rejected.
    pub fn register(
        &self,
        containers: Vec<(String, Container)>,
        initial_calls: Vec<MethodCall>,
    ) -> Result<(), DefinitionError> {
        if initial_calls
            .iter()
            .any(|call| call.actor_id().is_empty() || call.method().is_empty())
        {
            return Err(DefinitionError::InvalidInitialCall);
        }

        let _registration = self.shared.registration.lock();

        let mut ids = FxHashSet::default();
        for (id, _) in &containers {
            if !ids.insert(id.as_str()) {
                return Err(DefinitionError::DuplicateContainerId(id.clone()));
            }

            self.check_registration(id)?;
        }

        if let Some(call) = initial_calls.first() {
            if self.is_on_lockdown() {
                return Err(DefinitionError::CoreOnLockDown(call.actor_id().to_string()));
            }
        }

        for (id, container) in containers {
            self.install(&id, container);
        }

        if !initial_calls.is_empty() {
            let mut pending = self.shared.pending_initial_calls.lock();
            for call in initial_calls {
                pending
                    .entry(call.actor_id().to_string())
                    .or_default()
                    .push(call);
            }
        }

        Ok(())
    }

    #[inline]
    pub fn contain(&self, id: &str) -> bool {
        self.shared.controllers.read().contains_key(id)
    }

    /// IDs of all defined services, in definition order.
    pub fn all_ids(&self) -> Vec<String> {
        self.shared.controllers.read().keys().cloned().collect()
    }

    pub fn controller(&self, id: &str) -> Result<Arc<Controller>, ResolutionError> {
        self.shared
            .controllers
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ResolutionError::UndefinedContainerId(id.to_string()))
    }

    /// Returns a copy of service metadata.
    pub fn get_metadata(&self, id: &str) -> Result<Container, ResolutionError> {
        Ok(self.controller(id)?.metadata().clone())
    }

    /// Checks if given service has a cached instance.
    pub fn is_activated(&self, id: &str) -> bool {
        self.controller(id)
            .map(|controller| controller.activated())
            .unwrap_or(false)
    }

    /// Locks the core, merging pending initial calls and compiling the interception graph. Only
    /// the first call has any effect.
    pub fn lock_down(&self) {
        if self.is_on_lockdown() {
            return;
        }

        let _registration = self.shared.registration.lock();
        if self.is_on_lockdown() {
            return;
        }

        info!("Locking down the core.");

        let controllers: Vec<Arc<Controller>> =
            self.shared.controllers.read().values().cloned().collect();

        {
            let mut pending = self.shared.pending_initial_calls.lock();
            for controller in &controllers {
                let id = controller.metadata().id().to_string();
                if let Some(calls) = pending.shift_remove(&id) {
                    controller.update_metadata(|metadata| {
                        calls
                            .into_iter()
                            .for_each(|call| metadata.add_initial_call(call))
                    });
                }
            }

            if !pending.is_empty() {
                debug!(
                    actors = ?pending.keys().collect::<Vec<_>>(),
                    "Initial calls declared for undefined services."
                );
            }
        }

        let mut graph = self.shared.interception_graph.write();
        for controller in &controllers {
            register_interceptions(&mut graph, &controller.metadata());
        }

        debug!(services = graph.len(), "Compiled interception graph.");

        self.shared.locked_down.store(true, Ordering::Release);
    }

    /// Removes all definitions, instances and interceptions, and lifts the lock-down. Must not be
    /// called while any service is being activated.
    pub fn reset(&self) {
        let _registration = self.shared.registration.lock();

        self.shared.controllers.write().clear();
        self.shared.interception_graph.write().clear();
        self.shared.pending_initial_calls.lock().clear();
        self.shared.locked_down.store(false, Ordering::Release);

        info!("Core has been reset.");
    }

    /// Returns the service with given ID, activating it if needed.
    #[inline]
    pub fn get(&self, id: &str) -> Result<Value, ResolutionError> {
        self.get_with_chain(id, &[])
    }

    /// Returns the service with given ID. `chain` contains IDs of services currently being
    /// activated and is used to detect circular dependencies.
    pub fn get_with_chain(&self, id: &str, chain: &[String]) -> Result<Value, ResolutionError> {
        if SELF_IDS.contains(&id) {
            return Ok(Value::Core(self.handle()));
        }

        self.lock_down();

        let controller = self.controller(id)?;
        if let Some(value) = controller.cached() {
            return Ok(value);
        }

        if chain.iter().any(|activating| activating == id) {
            let mut cycle = chain.to_vec();
            cycle.push(id.to_string());
            return Err(ResolutionError::CircularDependency(cycle));
        }

        let sequence =
            controller.activation_sequence(|| self.calculate_activation_sequence(id))?;

        let mut dependency_chain = chain.to_vec();
        dependency_chain.push(id.to_string());

        let mut activated = vec![];
        for dependency_id in &sequence {
            let dependency = self.controller(dependency_id)?;
            let activation = dependency.activate(self, &dependency_chain)?;
            if activation.fresh {
                activated.push((dependency, activation.value));
            }
        }

        let activation = controller.activate(self, chain)?;
        let value = activation.value.clone();
        if activation.fresh {
            activated.push((controller, activation.value));
        }

        for (controller, value) in &activated {
            controller.run_initial_calls(self, value, chain)?;
        }

        Ok(value)
    }

    /// Returns the concrete object of a service.
    pub fn instance<T: Any + Send + Sync>(&self, id: &str) -> Result<Arc<T>, ResolutionError> {
        self.get(id)?
            .as_service()
            .and_then(|instance| instance.downcast::<T>())
            .ok_or_else(|| ResolutionError::IncompatibleInstance(type_name::<T>().to_string()))
    }

    /// Looks up compiled interceptions of a service. Filtering by method requires an event.
    pub fn get_interceptions(
        &self,
        id: &str,
        event: Option<Event>,
        method: Option<&str>,
    ) -> Result<InterceptionLookup, ResolutionError> {
        let methods = self
            .shared
            .interception_graph
            .read()
            .get(id)
            .cloned()
            .unwrap_or_default();

        match (event, method) {
            (None, None) => Ok(InterceptionLookup::All(methods)),
            (None, Some(method)) => Err(ResolutionError::InvalidLookup(format!(
                "looking up method \"{method}\" requires an event"
            ))),
            (Some(event), None) => Ok(InterceptionLookup::ByEvent(
                methods
                    .into_iter()
                    .filter_map(|(method, mut events)| {
                        events
                            .shift_remove(&event)
                            .map(|interceptions| (method, interceptions))
                    })
                    .collect(),
            )),
            (Some(event), Some(method)) => Ok(InterceptionLookup::Exact(
                methods
                    .get(method)
                    .and_then(|events| events.get(&event))
                    .cloned()
                    .unwrap_or_default(),
            )),
        }
    }

    /// Wraps a service instance if any interceptions target it.
    pub(crate) fn wrap(&self, id: &str, value: Value) -> Value {
        match value {
            Value::Service(instance) => {
                let interceptions = self.shared.interception_graph.read().get(id).cloned();
                match interceptions {
                    Some(interceptions) if !interceptions.is_empty() => {
                        debug!(id, "Wrapping intercepted service.");
                        let wrapper =
                            Wrapper::new(self.handle(), id, instance.clone(), interceptions);
                        Value::Service(instance.wrapped(wrapper))
                    }
                    _ => Value::Service(instance),
                }
            }
            value => value,
        }
    }

    fn check_registration(&self, id: &str) -> Result<(), DefinitionError> {
        if self.is_on_lockdown() && (!self.shared.standalone || self.contain(id)) {
            return Err(DefinitionError::CoreOnLockDown(id.to_string()));
        }

        Ok(())
    }

    fn install(&self, id: &str, mut container: Container) {
        container.set_id(id);

        if self.is_on_lockdown() {
            if let Some(calls) = self.shared.pending_initial_calls.lock().shift_remove(id) {
                calls
                    .into_iter()
                    .for_each(|call| container.add_initial_call(call));
            }

            register_interceptions(&mut self.shared.interception_graph.write(), &container);

            for interception in container.interceptions() {
                let intercepted = interception.resolved(id);
                if self.is_activated(intercepted.intercepted_id()) {
                    debug!(
                        id,
                        intercepted = intercepted.intercepted_id(),
                        "Interception does not apply to the already activated instance."
                    );
                }
            }
        }

        debug!(id, "Defining service.");

        self.shared
            .controllers
            .write()
            .insert(id.to_string(), Arc::new(Controller::new(container)));
    }

    /// Depth-first walk over dependencies, producing each dependency after all of its own.
    /// Dependencies are visited in sorted order, so the sequence is deterministic.
    fn calculate_activation_sequence(&self, id: &str) -> Result<Vec<String>, ResolutionError> {
        let mut sequence = vec![];
        let mut visited = FxHashSet::default();
        let mut path = vec![id.to_string()];

        self.visit_dependencies(id, &mut path, &mut visited, &mut sequence)?;

        debug!(id, ?sequence, "Calculated activation sequence.");
        Ok(sequence)
    }

    fn visit_dependencies(
        &self,
        id: &str,
        path: &mut Vec<String>,
        visited: &mut FxHashSet<String>,
        sequence: &mut Vec<String>,
    ) -> Result<(), ResolutionError> {
        let dependencies = self.controller(id)?.metadata().dependencies().to_vec();

        for dependency in dependencies {
            if SELF_IDS.contains(&dependency.as_str()) {
                continue;
            }

            if path.contains(&dependency) {
                let mut cycle = path.clone();
                cycle.push(dependency);
                return Err(ResolutionError::CircularDependency(cycle));
            }

            if !visited.insert(dependency.clone()) {
                continue;
            }

            path.push(dependency.clone());
            self.visit_dependencies(&dependency, path, visited, sequence)?;
            path.pop();

            sequence.push(dependency);
        }

        Ok(())
    }
}

impl ServiceLocator for Core {
    #[inline]
    fn locate(&self, id: &str, chain: &[String]) -> Result<Value, ResolutionError> {
        self.get_with_chain(id, chain)
    }
}

impl Debug for Core {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("ids", &self.all_ids())
            .field("locked_down", &self.is_on_lockdown())
            .field("standalone", &self.shared.standalone)
            .finish()
    }
}

fn register_interceptions(graph: &mut InterceptionGraph, container: &Container) {
    for interception in container.interceptions() {
        let interception = interception.resolved(container.id());

        graph
            .entry(interception.intercepted_id().to_string())
            .or_default()
            .entry(interception.method().to_string())
            .or_default()
            .entry(interception.event())
            .or_default()
            .push(interception);
    }
}

/// Weak reference to a [Core], injected into services depending on the core itself.
#[derive(Clone)]
pub struct CoreHandle {
    shared: Weak<Shared>,
}

impl CoreHandle {
    /// Returns the referenced core, if it still exists.
    pub fn upgrade(&self) -> Result<Core, ResolutionError> {
        self.shared
            .upgrade()
            .map(|shared| Core { shared })
            .ok_or(ResolutionError::CoreUnavailable)
    }

    /// Shortcut for [Core::get].
    pub fn get(&self, id: &str) -> Result<Value, ResolutionError> {
        self.upgrade()?.get(id)
    }

    /// Checks if both handles refer to the same core.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.shared, &other.shared)
    }
}

impl Debug for CoreHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreHandle")
            .field("available", &(self.shared.strong_count() > 0))
            .finish()
    }
}
