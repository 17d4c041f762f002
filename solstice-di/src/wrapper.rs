//! Method interception for activated services. A [Wrapper] stands in front of a service instance
//! and dispatches intercepted methods through [InterceptableCallable]s, which run registered
//! interceptors around the real call. The wrapped type itself is never modified.

use crate::container::{Event, Interception};
use crate::error::ResolutionError;
use crate::instance::ServiceInstance;
use crate::registry::{Core, CoreHandle, EventInterceptions, MethodInterceptions};
use crate::value::{Arguments, Value};
use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tracing::trace;

/// Intercepting proxy over a service instance.
pub struct Wrapper {
    core: CoreHandle,
    id: String,
    instance: ServiceInstance,
    interceptions: MethodInterceptions,
    callables: Mutex<FxHashMap<String, Arc<InterceptableCallable>>>,
}

impl Wrapper {
    pub fn new(
        core: CoreHandle,
        id: &str,
        instance: ServiceInstance,
        interceptions: MethodInterceptions,
    ) -> Self {
        Self {
            core,
            id: id.to_string(),
            instance,
            interceptions,
            callables: Default::default(),
        }
    }

    /// ID of the wrapped service.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Names of intercepted methods.
    pub fn intercepted_methods(&self) -> impl Iterator<Item = &str> {
        self.interceptions.keys().map(String::as_str)
    }

    /// Returns the intercepting callable for given method, if it has any interceptions.
    pub fn callable(&self, method: &str) -> Option<Arc<InterceptableCallable>> {
        let interceptions = self.interceptions.get(method)?;

        let mut callables = self.callables.lock();
        let callable = callables.entry(method.to_string()).or_insert_with(|| {
            Arc::new(InterceptableCallable {
                core: self.core.clone(),
                method: method.to_string(),
                interceptions: interceptions.clone(),
            })
        });

        Some(callable.clone())
    }

    /// Calls a method of the wrapped instance, running interceptors if the method has any.
    pub fn call(&self, method: &str, arguments: Arguments) -> Result<Value, ResolutionError> {
        match self.callable(method) {
            Some(callable) => callable.invoke(&self.instance, arguments),
            None => self.instance.call_unintercepted(method, arguments),
        }
    }
}

impl Debug for Wrapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wrapper")
            .field("id", &self.id)
            .field("instance", &self.instance)
            .field("interceptions", &self.interceptions)
            .finish()
    }
}

/// A single intercepted method with its interceptors, grouped by event.
#[derive(Debug)]
pub struct InterceptableCallable {
    core: CoreHandle,
    method: String,
    interceptions: EventInterceptions,
}

impl InterceptableCallable {
    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[inline]
    pub fn has_interceptions(&self, event: Event) -> bool {
        self.interceptions
            .get(&event)
            .map(|interceptions| !interceptions.is_empty())
            .unwrap_or(false)
    }

    /// Runs `before` interceptors, the real method and then `after` interceptors. If the real
    /// method fails, `error` interceptors observe the error, which is then returned unchanged.
    pub fn invoke(
        &self,
        instance: &ServiceInstance,
        arguments: Arguments,
    ) -> Result<Value, ResolutionError> {
        let core = self.core.upgrade()?;

        self.intercept(&core, Event::Before, None)?;

        let observed = self
            .has_interceptions(Event::Error)
            .then(|| arguments.clone());

        let result = match instance.call_unintercepted(&self.method, arguments) {
            Ok(result) => result,
            Err(error) => {
                if let Some(arguments) = observed {
                    let mut positional = vec![Value::Error(error.clone().into_error_ptr())];
                    positional.extend(arguments.positional);

                    self.intercept(
                        &core,
                        Event::Error,
                        Some(Arguments {
                            positional,
                            keyword: arguments.keyword,
                        }),
                    )?;
                }

                return Err(error);
            }
        };

        self.intercept(&core, Event::After, None)?;

        Ok(result)
    }

    fn intercept(
        &self,
        core: &Core,
        event: Event,
        arguments: Option<Arguments>,
    ) -> Result<(), ResolutionError> {
        let Some(interceptions) = self.interceptions.get(&event) else {
            return Ok(());
        };

        for interception in interceptions {
            trace!(
                %event,
                method = self.method.as_str(),
                interceptor = interception.interceptor_id(),
                "Running interceptor."
            );

            let arguments = match &arguments {
                Some(arguments) => arguments.clone(),
                None => {
                    core.transformer()
                        .cast_collection(interception.parameters(), core, &[])?
                }
            };

            interceptor(core, interception)?.call(interception.intercepting_method(), arguments)?;
        }

        Ok(())
    }
}

fn interceptor(
    core: &Core,
    interception: &Interception,
) -> Result<ServiceInstance, ResolutionError> {
    let non_callable = || ResolutionError::NonCallable {
        interceptor: interception.interceptor_id().to_string(),
        method: interception.intercepting_method().to_string(),
    };

    let interceptor = core.get(interception.interceptor_id())?;
    let instance = interceptor.as_service().ok_or_else(non_callable)?;
    if !instance.has_method(interception.intercepting_method()) {
        return Err(non_callable());
    }

    Ok(instance.clone())
}
