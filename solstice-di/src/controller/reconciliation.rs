//! Matching of declared parameters against the formal parameters of a constructor or factory
//! method. Keywords are bound by name first, positional values then fill the remaining slots in
//! declaration order. Overflow goes to variadic parameters, if the signature has them.
//!
//! Required parameters left undefined, but annotated with a service type, can be auto-wired: the
//! service registered under the ID derived from the annotated type name is used.

use crate::catalog::naming::IdNaming;
use crate::catalog::signature::{Annotation, ParameterDescriptor, Signature};
use crate::error::ResolutionError;
use crate::transformer::ServiceLocator;
use crate::value::{Arguments, Value};
use indexmap::IndexMap;
use tracing::debug;

/// Context required for auto-wiring missing parameters.
pub struct AutoWiring<'a> {
    pub locator: &'a dyn ServiceLocator,
    pub naming: IdNaming,
    pub chain: &'a [String],
}

impl AutoWiring<'_> {
    fn wire(&self, type_name: &str) -> Result<Option<Value>, ResolutionError> {
        let id = (self.naming)(type_name);
        match self.locator.locate(&id, self.chain) {
            Ok(value) => Ok(Some(value)),
            Err(ResolutionError::UndefinedContainerId(undefined)) if undefined == id => Ok(None),
            Err(error) => Err(error),
        }
    }
}

/// Reconciles `arguments` declared for service `id` with `signature`, returning the arguments to
/// call with. Auto-wiring is performed only when `auto_wiring` is present.
pub fn reconcile(
    id: &str,
    signature: &Signature,
    arguments: Arguments,
    auto_wiring: Option<&AutoWiring>,
) -> Result<Arguments, ResolutionError> {
    reconcile_with(id, signature, arguments, IndexMap::new(), auto_wiring)
}

fn reconcile_with(
    id: &str,
    signature: &Signature,
    arguments: Arguments,
    wired: IndexMap<String, Value>,
    auto_wiring: Option<&AutoWiring>,
) -> Result<Arguments, ResolutionError> {
    let original = auto_wiring.map(|_| arguments.clone());
    let fixed: Vec<&ParameterDescriptor> = signature.fixed().collect();

    let mut slots: IndexMap<&str, Option<Value>> = fixed
        .iter()
        .map(|parameter| (parameter.name(), None))
        .collect();

    for (name, value) in wired {
        if let Some(slot) = slots.get_mut(name.as_str()) {
            *slot = Some(value);
        }
    }

    let mut keyword_spill = IndexMap::new();
    for (name, value) in arguments.keyword {
        match slots.get_mut(name.as_str()) {
            Some(slot) => *slot = Some(value),
            None if signature.var_keyword().is_some() => {
                keyword_spill.insert(name, value);
            }
            None => {
                return Err(ResolutionError::UnexpectedParameter {
                    id: id.to_string(),
                    parameter: name,
                })
            }
        }
    }

    let mut positional = arguments.positional.into_iter();
    for slot in slots.values_mut().filter(|slot| slot.is_none()) {
        match positional.next() {
            Some(value) => *slot = Some(value),
            None => break,
        }
    }

    let positional_spill: Vec<Value> = positional.collect();
    if !positional_spill.is_empty() && signature.var_positional().is_none() {
        return Err(ResolutionError::UnexpectedParameter {
            id: id.to_string(),
            parameter: format!("#{}", fixed.len()),
        });
    }

    let missing: Vec<(usize, &ParameterDescriptor)> = fixed
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, parameter)| {
            parameter.is_required() && matches!(slots.get(parameter.name()), Some(None))
        })
        .collect();

    if !missing.is_empty() {
        if let (Some(auto_wiring), Some(original)) = (auto_wiring, original) {
            let mut wired = IndexMap::new();
            for (_, parameter) in &missing {
                if let Some(Annotation::Service(type_name)) = parameter.annotation() {
                    if let Some(value) = auto_wiring.wire(type_name)? {
                        debug!(id, parameter = parameter.name(), "Auto-wired parameter.");
                        wired.insert(parameter.name().to_string(), value);
                    }
                }
            }

            if !wired.is_empty() {
                return reconcile_with(id, signature, original, wired, None);
            }
        }

        return Err(ResolutionError::MissingParameter {
            id: id.to_string(),
            parameters: missing
                .iter()
                .map(|(position, parameter)| format!("{} (#{position})", parameter.name()))
                .collect(),
        });
    }

    for parameter in &fixed {
        let (Some(annotation), Some(Some(value))) =
            (parameter.annotation(), slots.get(parameter.name()))
        else {
            continue;
        };

        if !annotation.accepts(value) {
            return Err(ResolutionError::UnexpectedDefinitionType {
                id: id.to_string(),
                parameter: parameter.name().to_string(),
                expected: annotation.describe(),
                actual: match value {
                    Value::Service(instance) => instance.type_name().to_string(),
                    value => value.kind_name().to_string(),
                },
            });
        }
    }

    if slots.values().all(Option::is_some) {
        return Ok(Arguments {
            positional: slots
                .into_values()
                .flatten()
                .chain(positional_spill)
                .collect(),
            keyword: keyword_spill,
        });
    }

    if !positional_spill.is_empty() {
        debug!(
            id,
            discarded = positional_spill.len(),
            "Optional parameters partially defined - discarding overflowing positional values."
        );
    }

    let mut keyword: IndexMap<String, Value> = slots
        .into_iter()
        .filter_map(|(name, value)| value.map(|value| (name.to_string(), value)))
        .collect();
    keyword.extend(keyword_spill);

    Ok(Arguments {
        positional: vec![],
        keyword,
    })
}

#[cfg(test)]
mod tests {
    use crate::catalog::naming::{fully_qualified_type_name, type_name_only};
    use crate::catalog::signature::{Annotation, ParameterDescriptor, Signature};
    use crate::catalog::TypeDescriptor;
    use crate::controller::reconciliation::{reconcile, AutoWiring};
    use crate::error::ResolutionError;
    use crate::instance::ServiceInstance;
    use crate::transformer::MockServiceLocator;
    use crate::value::{Arguments, Value};

    struct Logger;

    fn signature() -> Signature {
        Signature::new()
            .with(ParameterDescriptor::required("host").annotated(Annotation::Str))
            .with(ParameterDescriptor::required("port").annotated(Annotation::Int))
            .with(ParameterDescriptor::optional("secure", false))
    }

    #[test]
    fn should_bind_keywords_before_positional_values() {
        let arguments = reconcile(
            "server",
            &signature(),
            Arguments::new()
                .with("localhost")
                .with(true)
                .with_keyword("port", 80),
            None,
        )
        .unwrap();

        assert_eq!(
            arguments.positional,
            vec![Value::from("localhost"), Value::Int(80), Value::Bool(true)]
        );
        assert!(arguments.keyword.is_empty());
    }

    #[test]
    fn should_pass_partial_definitions_as_keywords() {
        let arguments = reconcile(
            "server",
            &signature(),
            Arguments::new().with("localhost").with(80),
            None,
        )
        .unwrap();

        assert!(arguments.positional.is_empty());
        assert_eq!(arguments.keyword["host"], Value::from("localhost"));
        assert_eq!(arguments.keyword["port"], Value::Int(80));
        assert!(!arguments.keyword.contains_key("secure"));
    }

    #[test]
    fn should_spill_into_variadic_parameters() {
        let signature = Signature::new()
            .with(ParameterDescriptor::required("a"))
            .with(ParameterDescriptor::var_positional("args"))
            .with(ParameterDescriptor::var_keyword("kwargs"));

        let arguments = reconcile(
            "variadic",
            &signature,
            Arguments::new().with(1).with(2).with_keyword("b", 3),
            None,
        )
        .unwrap();

        assert_eq!(arguments.positional, vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(arguments.keyword["b"], Value::Int(3));
    }

    #[test]
    fn should_reject_unexpected_parameters() {
        assert!(matches!(
            reconcile(
                "server",
                &signature(),
                Arguments::new().with_keyword("timeout", 1),
                None
            ),
            Err(ResolutionError::UnexpectedParameter { parameter, .. }) if parameter == "timeout"
        ));
        assert!(matches!(
            reconcile(
                "server",
                &signature(),
                Arguments::new().with("a").with(1).with(true).with(2),
                None
            ),
            Err(ResolutionError::UnexpectedParameter { parameter, .. }) if parameter == "#3"
        ));
    }

    #[test]
    fn should_report_missing_parameters() {
        assert!(matches!(
            reconcile("server", &signature(), Arguments::new().with("localhost"), None),
            Err(ResolutionError::MissingParameter { id, parameters })
                if id == "server" && parameters == vec!["port (#1)".to_string()]
        ));
    }

    #[test]
    fn should_check_annotations() {
        assert!(matches!(
            reconcile(
                "server",
                &signature(),
                Arguments::new().with("localhost").with("80"),
                None
            ),
            Err(ResolutionError::UnexpectedDefinitionType { parameter, expected, actual, .. })
                if parameter == "port" && expected == "int" && actual == "str"
        ));
    }

    #[test]
    fn should_auto_wire_service_parameters() {
        let signature = Signature::new()
            .with(ParameterDescriptor::required("name"))
            .with(ParameterDescriptor::required("clock").annotated(Annotation::Any))
            .with(
                ParameterDescriptor::required("logger")
                    .annotated(Annotation::Service("app::Logger".to_string())),
            );

        let mut locator = MockServiceLocator::new();
        locator
            .expect_locate()
            .withf(|id, chain| id == "Logger" && chain == ["parent".to_string()])
            .times(1)
            .returning(|_, _| {
                let descriptor = TypeDescriptor::builder::<Logger>()
                    .named("app::Logger")
                    .build();
                Ok(ServiceInstance::new(Logger, descriptor)?.into())
            });

        let chain = vec!["parent".to_string()];
        let auto_wiring = AutoWiring {
            locator: &locator,
            naming: type_name_only,
            chain: &chain,
        };

        let arguments = reconcile(
            "service",
            &signature,
            Arguments::new().with("x").with_keyword("clock", 1),
            Some(&auto_wiring),
        )
        .unwrap();

        assert_eq!(arguments.positional.len(), 3);
        assert_eq!(arguments.positional[0], Value::from("x"));
        assert_eq!(arguments.positional[1], Value::Int(1));
        assert_eq!(
            arguments.positional[2].as_service().unwrap().type_name(),
            "app::Logger"
        );
    }

    #[test]
    fn should_treat_undefined_wiring_targets_as_missing() {
        let signature = Signature::new().with(
            ParameterDescriptor::required("logger")
                .annotated(Annotation::Service("app::Logger".to_string())),
        );

        let mut locator = MockServiceLocator::new();
        locator
            .expect_locate()
            .returning(|id, _| Err(ResolutionError::UndefinedContainerId(id.to_string())));

        let auto_wiring = AutoWiring {
            locator: &locator,
            naming: fully_qualified_type_name,
            chain: &[],
        };

        assert!(matches!(
            reconcile("service", &signature, Arguments::new(), Some(&auto_wiring)),
            Err(ResolutionError::MissingParameter { parameters, .. })
                if parameters == vec!["logger (#0)".to_string()]
        ));
    }

    #[test]
    fn should_propagate_errors_of_wired_services() {
        let signature = Signature::new().with(
            ParameterDescriptor::required("logger")
                .annotated(Annotation::Service("app::Logger".to_string())),
        );

        let mut locator = MockServiceLocator::new();
        locator
            .expect_locate()
            .withf(|id, _| id == "app::Logger")
            .returning(|_, _| Err(ResolutionError::UndefinedContainerId("sink".to_string())));

        let auto_wiring = AutoWiring {
            locator: &locator,
            naming: fully_qualified_type_name,
            chain: &[],
        };

        assert!(matches!(
            reconcile("service", &signature, Arguments::new(), Some(&auto_wiring)),
            Err(ResolutionError::UndefinedContainerId(id)) if id == "sink"
        ));
    }
}
