//! Declarative metadata describing how to build a single service. A [Container] is one of three
//! kinds (see [ContainerKind]) and carries everything needed to activate it: parameters,
//! interceptions declared by the service and initial method calls.

use crate::error::DefinitionError;
use crate::parameter::{ParameterCollection, ParameterDefinition};
use fxhash::FxHashSet;
use itertools::Itertools;
use once_cell::sync::OnceCell;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// IDs which refer to the service currently being declared, when used in an [Interception].
pub const SELF_REFERENCES: [&str; 2] = ["self", "me"];

/// How a service gets built.
#[derive(Clone, Debug, PartialEq)]
pub enum ContainerKind {
    /// Direct instantiation of a named type.
    Entity { type_name: String },
    /// Call of a method on another service.
    Factorization { factory_id: String, method: String },
    /// Reference to a free function, returned without calling.
    Lambda { callable_name: String },
}

/// Moment at which an interceptor runs, relative to the intercepted method.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Event {
    Before,
    After,
    Error,
}

impl Event {
    pub const ALL: [Event; 3] = [Event::Before, Event::After, Event::Error];
}

impl FromStr for Event {
    type Err = DefinitionError;

    /// Parses an event name. `pre` and `post` are accepted as aliases of `before` and `after`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "before" | "pre" => Ok(Event::Before),
            "after" | "post" => Ok(Event::After),
            "error" => Ok(Event::Error),
            _ => Err(DefinitionError::UnknownEvent(value.to_string())),
        }
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::Before => write!(f, "before"),
            Event::After => write!(f, "after"),
            Event::Error => write!(f, "error"),
        }
    }
}

/// When `intercepted_id.method` runs, also call `interceptor_id.intercepting_method` with
/// `parameters`.
#[derive(Clone, Debug, PartialEq)]
pub struct Interception {
    event: Event,
    intercepted_id: String,
    method: String,
    interceptor_id: String,
    intercepting_method: String,
    parameters: ParameterCollection,
}

impl Interception {
    pub fn new(
        event: Event,
        intercepted_id: &str,
        method: &str,
        interceptor_id: &str,
        intercepting_method: &str,
    ) -> Self {
        Self {
            event,
            intercepted_id: intercepted_id.to_string(),
            method: method.to_string(),
            interceptor_id: interceptor_id.to_string(),
            intercepting_method: intercepting_method.to_string(),
            parameters: Default::default(),
        }
    }

    /// Sets parameters passed to the intercepting method.
    pub fn with_parameters(mut self, parameters: ParameterCollection) -> Self {
        self.parameters = parameters;
        self
    }

    #[inline]
    pub fn event(&self) -> Event {
        self.event
    }

    #[inline]
    pub fn intercepted_id(&self) -> &str {
        &self.intercepted_id
    }

    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[inline]
    pub fn interceptor_id(&self) -> &str {
        &self.interceptor_id
    }

    #[inline]
    pub fn intercepting_method(&self) -> &str {
        &self.intercepting_method
    }

    #[inline]
    pub fn parameters(&self) -> &ParameterCollection {
        &self.parameters
    }

    #[inline]
    pub fn is_self_interception(&self) -> bool {
        SELF_REFERENCES.contains(&self.interceptor_id.as_str())
    }

    /// Replaces self references with the ID of the declaring service.
    pub fn resolved(&self, declaring_id: &str) -> Self {
        let resolve = |id: &str| {
            if SELF_REFERENCES.contains(&id) {
                declaring_id.to_string()
            } else {
                id.to_string()
            }
        };

        Self {
            intercepted_id: resolve(&self.intercepted_id),
            interceptor_id: resolve(&self.interceptor_id),
            ..self.clone()
        }
    }
}

/// A method to call once, right after the actor service gets activated.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodCall {
    actor_id: String,
    method: String,
    parameters: ParameterCollection,
}

impl MethodCall {
    pub fn new(actor_id: &str, method: &str, parameters: ParameterCollection) -> Self {
        Self {
            actor_id: actor_id.to_string(),
            method: method.to_string(),
            parameters,
        }
    }

    #[inline]
    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[inline]
    pub fn parameters(&self) -> &ParameterCollection {
        &self.parameters
    }
}

/// Metadata of a single service.
#[derive(Clone, Debug)]
pub struct Container {
    id: String,
    kind: ContainerKind,
    params: ParameterCollection,
    interceptions: Vec<Interception>,
    initial_calls: Vec<MethodCall>,
    cacheable: bool,
    auto_wired: bool,
    dependencies: OnceCell<Vec<String>>,
}

impl Container {
    pub fn new(id: &str, kind: ContainerKind) -> Self {
        Self {
            id: id.trim().to_string(),
            kind,
            params: Default::default(),
            interceptions: vec![],
            initial_calls: vec![],
            cacheable: true,
            auto_wired: true,
            dependencies: OnceCell::new(),
        }
    }

    pub fn entity(id: &str, type_name: &str) -> Self {
        Self::new(
            id,
            ContainerKind::Entity {
                type_name: type_name.to_string(),
            },
        )
    }

    pub fn factorization(id: &str, factory_id: &str, method: &str) -> Self {
        Self::new(
            id,
            ContainerKind::Factorization {
                factory_id: factory_id.to_string(),
                method: method.to_string(),
            },
        )
    }

    pub fn lambda(id: &str, callable_name: &str) -> Self {
        Self::new(
            id,
            ContainerKind::Lambda {
                callable_name: callable_name.to_string(),
            },
        )
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }

    #[inline]
    pub fn kind(&self) -> &ContainerKind {
        &self.kind
    }

    #[inline]
    pub fn is_lambda(&self) -> bool {
        matches!(self.kind, ContainerKind::Lambda { .. })
    }

    #[inline]
    pub fn params(&self) -> &ParameterCollection {
        &self.params
    }

    /// Replaces all parameters. Lambdas accept no parameters.
    pub fn set_params(&mut self, params: ParameterCollection) -> Result<(), DefinitionError> {
        if self.is_lambda() && !params.is_empty() {
            return Err(DefinitionError::LambdaParameters(self.id.clone()));
        }

        self.params = params;
        self.dependencies = OnceCell::new();
        Ok(())
    }

    /// Adds a single parameter. Lambdas accept no parameters.
    pub fn add_param(&mut self, param: ParameterDefinition) -> Result<(), DefinitionError> {
        if self.is_lambda() {
            return Err(DefinitionError::LambdaParameters(self.id.clone()));
        }

        self.params.add(param)?;
        self.dependencies = OnceCell::new();
        Ok(())
    }

    /// Builder-style version of [Container::add_param].
    pub fn with_param(mut self, param: ParameterDefinition) -> Result<Self, DefinitionError> {
        self.add_param(param)?;
        Ok(self)
    }

    #[inline]
    pub fn interceptions(&self) -> &[Interception] {
        &self.interceptions
    }

    pub fn add_interception(&mut self, interception: Interception) {
        self.interceptions.push(interception);
    }

    pub fn with_interception(mut self, interception: Interception) -> Self {
        self.add_interception(interception);
        self
    }

    #[inline]
    pub fn initial_calls(&self) -> &[MethodCall] {
        &self.initial_calls
    }

    pub fn add_initial_call(&mut self, call: MethodCall) {
        self.initial_calls.push(call);
        self.dependencies = OnceCell::new();
    }

    pub fn with_initial_call(mut self, call: MethodCall) -> Self {
        self.add_initial_call(call);
        self
    }

    #[inline]
    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    pub fn set_cacheable(&mut self, cacheable: bool) {
        self.cacheable = cacheable;
    }

    pub fn with_cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }

    #[inline]
    pub fn is_auto_wired(&self) -> bool {
        self.auto_wired
    }

    pub fn set_auto_wired(&mut self, auto_wired: bool) {
        self.auto_wired = auto_wired;
    }

    pub fn with_auto_wired(mut self, auto_wired: bool) -> Self {
        self.auto_wired = auto_wired;
        self
    }

    /// IDs of services referenced by parameters and initial calls, plus the factory for
    /// factorizations. Sorted, computed once.
    pub fn dependencies(&self) -> &[String] {
        self.dependencies.get_or_init(|| {
            let mut dependencies = FxHashSet::default();

            if let ContainerKind::Factorization { factory_id, .. } = &self.kind {
                dependencies.insert(factory_id.clone());
            }

            self.params.collect_dependencies(&mut dependencies);
            for call in &self.initial_calls {
                call.parameters.collect_dependencies(&mut dependencies);
            }

            dependencies.into_iter().sorted().collect()
        })
    }
}
