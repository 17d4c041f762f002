//! Declarative service definitions, read from JSON documents:
//!
//! ```json
//! {
//!   "services": {
//!     "repository": {
//!       "entity": "app::Repository",
//!       "params": [
//!         { "name": "url", "type": "str", "value": "{ $DB_URL or \"sqlite::memory:\" }" },
//!         { "type": "entity", "value": "pool" }
//!       ],
//!       "calls": [{ "method": "migrate" }]
//!     },
//!     "pool": { "factory": { "service": "pools", "method": "create" }, "cacheable": false },
//!     "audit": {
//!       "entity": "app::Audit",
//!       "interceptions": [
//!         { "event": "before", "target": "repository", "method": "save", "with": "record" }
//!       ]
//!     }
//!   }
//! }
//! ```
//!
//! Interceptions are declared by the intercepting service. Multiple documents can be loaded, with
//! later definitions replacing earlier ones with the same ID.

use indexmap::IndexMap;
use serde::Deserialize;
use solstice_di::container::{Container, Event, Interception, MethodCall, SELF_REFERENCES};
use solstice_di::error::DefinitionError;
use solstice_di::parameter::{Definition, ParameterCollection, ParameterDefinition};
use solstice_di::{Core, Value};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Cannot read definitions from {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Malformed definition document: {0}")]
    Format(#[from] serde_json::Error),
    #[error("Invalid definition of '{id}': {reason}")]
    InvalidService { id: String, reason: String },
    #[error("Invalid parameter of '{id}': {reason}")]
    InvalidParameter { id: String, reason: String },
    #[error(transparent)]
    Definition(#[from] DefinitionError),
}

/// Top-level definition document.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DefinitionDocument {
    #[serde(default)]
    pub services: IndexMap<String, ServiceDefinition>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServiceDefinition {
    pub entity: Option<String>,
    pub factory: Option<FactoryDefinition>,
    pub callable: Option<String>,
    #[serde(default)]
    pub params: Vec<ParamDefinition>,
    #[serde(default = "enabled")]
    pub cacheable: bool,
    #[serde(default = "enabled")]
    pub auto_wired: bool,
    #[serde(default)]
    pub interceptions: Vec<InterceptionDefinition>,
    #[serde(default)]
    pub calls: Vec<CallDefinition>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FactoryDefinition {
    pub service: String,
    pub method: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Str,
    Int,
    Float,
    Bool,
    Class,
    Entity,
    List,
    Tuple,
    Set,
    Dict,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ParamDefinition {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub items: Vec<ParamDefinition>,
    #[serde(default)]
    pub entries: Vec<ParamDefinition>,
    #[serde(default = "enabled")]
    pub transform: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct InterceptionDefinition {
    pub event: String,
    pub target: String,
    pub method: String,
    pub with: String,
    #[serde(default)]
    pub params: Vec<ParamDefinition>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CallDefinition {
    pub method: String,
    pub target: Option<String>,
    #[serde(default)]
    pub params: Vec<ParamDefinition>,
}

fn enabled() -> bool {
    true
}

/// A service converted from its declarative definition, with initial calls it declares on other
/// services.
#[derive(Clone, Debug)]
struct LoadedService {
    container: Container,
    foreign_calls: Vec<MethodCall>,
}

/// Accumulates definitions from multiple documents and installs them in a [Core].
#[derive(Clone, Debug, Default)]
pub struct DefinitionLoader {
    services: IndexMap<String, LoadedService>,
}

impl DefinitionLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// IDs of loaded services.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    /// Returns loaded definition of given service.
    pub fn container(&self, id: &str) -> Option<&Container> {
        self.services.get(id).map(|service| &service.container)
    }

    /// Loads a document from a file.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), LoaderError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading service definitions.");

        let source = fs::read_to_string(path).map_err(|source| LoaderError::Io {
            path: path.display().to_string(),
            source,
        })?;

        self.load_str(&source)
    }

    /// Loads a document from its textual form.
    pub fn load_str(&mut self, source: &str) -> Result<(), LoaderError> {
        self.load_document(serde_json::from_str(source)?)
    }

    /// Loads an already parsed document. Either all services from the document are loaded, or
    /// none.
    pub fn load_document(&mut self, document: DefinitionDocument) -> Result<(), LoaderError> {
        let services = document
            .services
            .into_iter()
            .map(|(id, definition)| {
                let service = convert_service(&id, definition)?;
                Ok((id, service))
            })
            .collect::<Result<Vec<_>, LoaderError>>()?;

        for (id, service) in services {
            if self.services.insert(id.clone(), service).is_some() {
                debug!(id = id.as_str(), "Replacing previously loaded definition.");
            }
        }

        Ok(())
    }

    /// Defines all loaded services in one batch, together with the initial calls they declare on
    /// other services. Nothing gets defined if the core rejects any part.
    pub fn install(self, core: &Core) -> Result<(), LoaderError> {
        let mut foreign_calls = vec![];
        let containers: Vec<(String, Container)> = self
            .services
            .into_iter()
            .map(|(id, service)| {
                foreign_calls.extend(service.foreign_calls);
                (id, service.container)
            })
            .collect();

        debug!(services = containers.len(), "Installing service definitions.");
        core.register(containers, foreign_calls)?;
        Ok(())
    }
}

fn convert_service(id: &str, definition: ServiceDefinition) -> Result<LoadedService, LoaderError> {
    let invalid = |reason: &str| LoaderError::InvalidService {
        id: id.to_string(),
        reason: reason.to_string(),
    };

    let mut container = match (definition.entity, definition.factory, definition.callable) {
        (Some(type_name), None, None) => Container::entity(id, &type_name),
        (None, Some(factory), None) => {
            Container::factorization(id, &factory.service, &factory.method)
        }
        (None, None, Some(callable)) => Container::lambda(id, &callable),
        (None, None, None) => {
            return Err(invalid(
                "one of \"entity\", \"factory\" or \"callable\" is required",
            ))
        }
        _ => {
            return Err(invalid(
                "only one of \"entity\", \"factory\" or \"callable\" is allowed",
            ))
        }
    };

    if !definition.params.is_empty() {
        container.set_params(convert_params(id, definition.params)?)?;
    }

    container.set_cacheable(definition.cacheable);
    container.set_auto_wired(definition.auto_wired);

    for interception in definition.interceptions {
        let event: Event = interception.event.parse()?;
        container.add_interception(
            Interception::new(
                event,
                &interception.target,
                &interception.method,
                SELF_REFERENCES[0],
                &interception.with,
            )
            .with_parameters(convert_params(id, interception.params)?),
        );
    }

    let mut foreign_calls = vec![];
    for call in definition.calls {
        let parameters = convert_params(id, call.params)?;
        match call.target {
            Some(target) if !SELF_REFERENCES.contains(&target.as_str()) && target != id => {
                let call = MethodCall::new(&target, &call.method, parameters);
                if call.method().is_empty() {
                    return Err(DefinitionError::InvalidInitialCall.into());
                }

                foreign_calls.push(call);
            }
            _ => {
                if call.method.is_empty() {
                    return Err(DefinitionError::InvalidInitialCall.into());
                }

                container.add_initial_call(MethodCall::new(id, &call.method, parameters));
            }
        }
    }

    Ok(LoadedService {
        container,
        foreign_calls,
    })
}

fn convert_params(
    id: &str,
    params: Vec<ParamDefinition>,
) -> Result<ParameterCollection, LoaderError> {
    let mut collection = ParameterCollection::new();
    for param in params {
        collection.add(convert_param(id, param)?)?;
    }

    Ok(collection)
}

fn convert_param(id: &str, param: ParamDefinition) -> Result<ParameterDefinition, LoaderError> {
    let invalid = |reason: String| LoaderError::InvalidParameter {
        id: id.to_string(),
        reason,
    };

    let name = param.name.as_deref();
    let describe = || name.unwrap_or("positional parameter").to_string();

    let definition = match param.param_type {
        ParamType::List | ParamType::Tuple | ParamType::Set => {
            if let Some(item) = param.items.iter().find(|item| item.name.is_some()) {
                return Err(invalid(format!(
                    "sequence item '{}' of {} cannot be named",
                    item.name.as_deref().unwrap_or_default(),
                    describe()
                )));
            }

            let items = convert_params(id, param.items)?;
            match param.param_type {
                ParamType::List => Definition::List(items),
                ParamType::Tuple => Definition::Tuple(items),
                _ => Definition::Set(items),
            }
        }
        ParamType::Dict => {
            if param.entries.iter().any(|entry| entry.name.is_none()) {
                return Err(invalid(format!("all entries of {} need names", describe())));
            }

            Definition::Dict(convert_params(id, param.entries)?)
        }
        param_type => {
            let value = param
                .value
                .ok_or_else(|| invalid(format!("{} has no value", describe())))?;

            if !param.transform {
                return Ok(ParameterDefinition::new(
                    Definition::Value(json_to_value(value)),
                    name,
                    false,
                ));
            }

            let text = match value {
                serde_json::Value::String(text) => text,
                serde_json::Value::Number(number) => number.to_string(),
                serde_json::Value::Bool(flag) => flag.to_string(),
                _ => {
                    return Err(invalid(format!(
                        "{} needs a textual, numeric or boolean value",
                        describe()
                    )))
                }
            };

            match param_type {
                ParamType::Str => Definition::Str(text),
                ParamType::Int => Definition::Int(text),
                ParamType::Float => Definition::Float(text),
                ParamType::Bool => Definition::Bool(text),
                ParamType::Class => Definition::Type(text),
                _ => Definition::Service(text),
            }
        }
    };

    Ok(ParameterDefinition::new(definition, name, param.transform))
}

fn json_to_value(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::None,
        serde_json::Value::Bool(flag) => Value::Bool(flag),
        serde_json::Value::Number(number) => match number.as_i64() {
            Some(number) => Value::Int(number),
            None => Value::Float(number.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(text) => Value::Str(text),
        serde_json::Value::Array(values) => {
            Value::List(values.into_iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(entries) => Value::Dict(
            entries
                .into_iter()
                .map(|(key, value)| (key, json_to_value(value)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use crate::loader::{DefinitionLoader, LoaderError};
    use solstice_di::catalog::TypeCatalog;
    use solstice_di::container::{ContainerKind, Event};
    use solstice_di::error::DefinitionError;
    use solstice_di::parameter::Definition;
    use solstice_di::registry::InterceptionLookup;
    use solstice_di::{CoreBuilder, Value};
    use std::sync::Arc;

    #[test]
    fn should_load_all_service_kinds() {
        let mut loader = DefinitionLoader::new();
        loader
            .load_str(
                r#"{
                    "services": {
                        "a": { "entity": "app::A", "cacheable": false, "auto_wired": false },
                        "b": { "factory": { "service": "a", "method": "make" } },
                        "c": { "callable": "app::c" }
                    }
                }"#,
            )
            .unwrap();

        assert_eq!(loader.ids().collect::<Vec<_>>(), vec!["a", "b", "c"]);

        let a = loader.container("a").unwrap();
        assert!(!a.is_cacheable());
        assert!(!a.is_auto_wired());
        assert_eq!(
            loader.container("b").unwrap().kind(),
            &ContainerKind::Factorization {
                factory_id: "a".to_string(),
                method: "make".to_string()
            }
        );
        assert!(loader.container("c").unwrap().is_lambda());
    }

    #[test]
    fn should_convert_parameters() {
        let mut loader = DefinitionLoader::new();
        loader
            .load_str(
                r#"{
                    "services": {
                        "a": {
                            "entity": "app::A",
                            "params": [
                                { "type": "int", "value": "{ $PORT or 80 }" },
                                { "name": "ratio", "type": "float", "value": 0.5 },
                                { "name": "raw", "type": "str", "value": [1, "x"], "transform": false },
                                { "name": "peer", "type": "entity", "value": "b" },
                                { "name": "kind", "type": "class", "value": "app::Kind" },
                                {
                                    "name": "tags",
                                    "type": "set",
                                    "items": [{ "type": "str", "value": "x" }]
                                },
                                {
                                    "name": "limits",
                                    "type": "dict",
                                    "entries": [{ "name": "max", "type": "int", "value": 3 }]
                                }
                            ]
                        }
                    }
                }"#,
            )
            .unwrap();

        let a = loader.container("a").unwrap();
        let params = a.params();

        assert_eq!(
            params.sequence()[0].definition(),
            &Definition::Int("{ $PORT or 80 }".to_string())
        );
        assert_eq!(
            params.items()["ratio"].definition(),
            &Definition::Float("0.5".to_string())
        );
        assert_eq!(
            params.items()["raw"].raw(),
            Value::List(vec![Value::Int(1), Value::from("x")])
        );
        assert!(!params.items()["raw"].needs_transform());
        assert!(matches!(
            params.items()["tags"].definition(),
            Definition::Set(items) if items.len() == 1
        ));
        assert!(matches!(
            params.items()["limits"].definition(),
            Definition::Dict(entries) if entries.items().contains_key("max")
        ));
        assert_eq!(a.dependencies(), ["b"]);
    }

    #[test]
    fn should_reject_invalid_definitions() {
        let mut loader = DefinitionLoader::new();

        assert!(matches!(
            loader.load_str(r#"{ "services": { "a": {} } }"#),
            Err(LoaderError::InvalidService { id, .. }) if id == "a"
        ));
        assert!(matches!(
            loader.load_str(r#"{ "services": { "a": { "entity": "x", "callable": "y" } } }"#),
            Err(LoaderError::InvalidService { .. })
        ));
        assert!(matches!(
            loader.load_str(
                r#"{ "services": { "a": { "callable": "y", "params": [{ "type": "int", "value": 1 }] } } }"#
            ),
            Err(LoaderError::Definition(DefinitionError::LambdaParameters(_)))
        ));
        assert!(matches!(
            loader.load_str(
                r#"{ "services": { "a": { "entity": "x", "params": [
                    { "name": "p", "type": "int", "value": 1 },
                    { "name": "p", "type": "int", "value": 2 }
                ] } } }"#
            ),
            Err(LoaderError::Definition(DefinitionError::DuplicateParameterName(_)))
        ));
        assert!(matches!(
            loader.load_str(
                r#"{ "services": { "a": { "entity": "x", "interceptions": [
                    { "event": "during", "target": "b", "method": "m", "with": "n" }
                ] } } }"#
            ),
            Err(LoaderError::Definition(DefinitionError::UnknownEvent(_)))
        ));
        assert!(matches!(
            loader.load_str(
                r#"{ "services": { "a": { "entity": "x", "params": [{ "type": "str" }] } } }"#
            ),
            Err(LoaderError::InvalidParameter { .. })
        ));
        assert!(matches!(
            loader.load_str("not json"),
            Err(LoaderError::Format(_))
        ));
        assert_eq!(loader.ids().count(), 0);
    }

    #[test]
    fn should_replace_earlier_definitions() {
        let mut loader = DefinitionLoader::new();
        loader
            .load_str(
                r#"{ "services": { "a": { "entity": "app::A" }, "b": { "entity": "app::B" } } }"#,
            )
            .unwrap();
        loader
            .load_str(r#"{ "services": { "a": { "entity": "app::Other" } } }"#)
            .unwrap();

        assert_eq!(
            loader.container("a").unwrap().kind(),
            &ContainerKind::Entity {
                type_name: "app::Other".to_string()
            }
        );
        assert!(loader.container("b").is_some());
    }

    #[test]
    fn should_install_definitions() {
        let mut loader = DefinitionLoader::new();
        loader
            .load_str(
                r#"{
                    "services": {
                        "worker": { "entity": "app::Worker", "calls": [{ "method": "start" }] },
                        "audit": {
                            "entity": "app::Audit",
                            "interceptions": [
                                { "event": "pre", "target": "worker", "method": "run", "with": "record" },
                                { "event": "error", "target": "me", "method": "flush", "with": "record" }
                            ],
                            "calls": [{ "method": "attach", "target": "worker" }]
                        }
                    }
                }"#,
            )
            .unwrap();

        let core = CoreBuilder::new()
            .unwrap()
            .with_type_resolver(Arc::new(TypeCatalog::new(false)))
            .build();
        loader.install(&core).unwrap();
        core.lock_down();

        let worker = core.get_metadata("worker").unwrap();
        let calls: Vec<&str> = worker
            .initial_calls()
            .iter()
            .map(|call| call.method())
            .collect();
        assert_eq!(calls, vec!["start", "attach"]);

        let Ok(InterceptionLookup::Exact(interceptions)) =
            core.get_interceptions("worker", Some(Event::Before), Some("run"))
        else {
            panic!("expected interceptions");
        };
        assert_eq!(interceptions[0].interceptor_id(), "audit");

        let Ok(InterceptionLookup::Exact(interceptions)) =
            core.get_interceptions("audit", Some(Event::Error), Some("flush"))
        else {
            panic!("expected self interceptions");
        };
        assert_eq!(interceptions[0].intercepting_method(), "record");
    }

    #[test]
    fn should_install_nothing_when_core_rejects_calls() {
        let mut loader = DefinitionLoader::new();
        loader
            .load_str(
                r#"{
                    "services": {
                        "audit": {
                            "entity": "app::Audit",
                            "calls": [{ "method": "attach", "target": "worker" }]
                        }
                    }
                }"#,
            )
            .unwrap();

        let core = CoreBuilder::new()
            .unwrap()
            .with_type_resolver(Arc::new(TypeCatalog::new(false)))
            .with_standalone(true)
            .build();
        core.lock_down();

        assert!(matches!(
            loader.install(&core),
            Err(LoaderError::Definition(DefinitionError::CoreOnLockDown(id))) if id == "worker"
        ));
        assert!(!core.contain("audit"));
    }
}
