//! Declarative description of constructor and method parameters. A [ParameterDefinition] holds
//! raw (usually textual) data, which the [Transformer](crate::transformer::Transformer) turns into
//! a runtime [Value] when the owning service is activated.

use crate::error::DefinitionError;
use crate::value::Value;
use fxhash::FxHashSet;
use indexmap::IndexMap;

/// Raw parameter data, tagged with the kind of value it should become.
#[derive(Clone, Debug, PartialEq)]
pub enum Definition {
    /// Ready-made value, always returned unchanged.
    Value(Value),
    Str(String),
    Int(String),
    Float(String),
    Bool(String),
    /// Reference to another service by ID.
    Service(String),
    /// Reference to a type by fully-qualified name.
    Type(String),
    List(ParameterCollection),
    Tuple(ParameterCollection),
    Set(ParameterCollection),
    Dict(ParameterCollection),
}

impl Definition {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Definition::Value(value) => value.kind_name(),
            Definition::Str(_) => "str",
            Definition::Int(_) => "int",
            Definition::Float(_) => "float",
            Definition::Bool(_) => "bool",
            Definition::Service(_) => "entity",
            Definition::Type(_) => "class",
            Definition::List(_) => "list",
            Definition::Tuple(_) => "tuple",
            Definition::Set(_) => "set",
            Definition::Dict(_) => "dict",
        }
    }
}

/// A single parameter: raw data, an optional name (keyword parameter) and whether the data needs
/// transforming.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterDefinition {
    definition: Definition,
    name: Option<String>,
    transform: bool,
}

impl ParameterDefinition {
    pub fn new(definition: Definition, name: Option<&str>, transform: bool) -> Self {
        Self {
            definition,
            name: name.map(str::to_string),
            transform,
        }
    }

    /// Positional parameter requiring transformation.
    pub fn positional(definition: Definition) -> Self {
        Self::new(definition, None, true)
    }

    /// Keyword parameter requiring transformation.
    pub fn keyword(name: &str, definition: Definition) -> Self {
        Self::new(definition, Some(name), true)
    }

    /// Positional reference to another service.
    pub fn service(id: &str) -> Self {
        Self::positional(Definition::Service(id.to_string()))
    }

    /// Positional ready-made value.
    pub fn value<T: Into<Value>>(value: T) -> Self {
        Self::new(Definition::Value(value.into()), None, false)
    }

    #[inline]
    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn needs_transform(&self) -> bool {
        self.transform
    }

    /// The untransformed data as a value: text becomes a string, collections contain raw values
    /// of their members.
    pub fn raw(&self) -> Value {
        match &self.definition {
            Definition::Value(value) => value.clone(),
            Definition::Str(text)
            | Definition::Int(text)
            | Definition::Float(text)
            | Definition::Bool(text)
            | Definition::Service(text)
            | Definition::Type(text) => Value::Str(text.clone()),
            Definition::List(collection)
            | Definition::Tuple(collection)
            | Definition::Set(collection) => Value::List(
                collection
                    .sequence()
                    .iter()
                    .map(ParameterDefinition::raw)
                    .collect(),
            ),
            Definition::Dict(collection) => Value::Dict(
                collection
                    .items()
                    .iter()
                    .map(|(name, item)| (name.clone(), item.raw()))
                    .collect(),
            ),
        }
    }
}

/// Ordered positional parameters and named keyword parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterCollection {
    sequence: Vec<ParameterDefinition>,
    items: IndexMap<String, ParameterDefinition>,
}

impl ParameterCollection {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter - positional if unnamed, keyword otherwise. Keyword names cannot be
    /// reused.
    pub fn add(&mut self, parameter: ParameterDefinition) -> Result<(), DefinitionError> {
        match parameter.name() {
            None => self.sequence.push(parameter),
            Some(name) => {
                if self.items.contains_key(name) {
                    return Err(DefinitionError::DuplicateParameterName(name.to_string()));
                }

                self.items.insert(name.to_string(), parameter);
            }
        }

        Ok(())
    }

    /// Builder-style version of [ParameterCollection::add].
    pub fn with(mut self, parameter: ParameterDefinition) -> Result<Self, DefinitionError> {
        self.add(parameter)?;
        Ok(self)
    }

    #[inline]
    pub fn sequence(&self) -> &[ParameterDefinition] {
        &self.sequence
    }

    #[inline]
    pub fn items(&self) -> &IndexMap<String, ParameterDefinition> {
        &self.items
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sequence.len() + self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collects IDs of all services referenced by this collection, including nested ones.
    /// Untransformed parameters are passed raw, so they reference nothing.
    pub fn collect_dependencies(&self, dependencies: &mut FxHashSet<String>) {
        for parameter in self.sequence.iter().chain(self.items.values()) {
            if !parameter.needs_transform() {
                continue;
            }

            match &parameter.definition {
                Definition::Service(id) => {
                    dependencies.insert(id.clone());
                }
                Definition::List(collection)
                | Definition::Tuple(collection)
                | Definition::Set(collection)
                | Definition::Dict(collection) => collection.collect_dependencies(dependencies),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::DefinitionError;
    use crate::parameter::{Definition, ParameterCollection, ParameterDefinition};
    use crate::value::Value;
    use fxhash::FxHashSet;

    #[test]
    fn should_keep_positional_order() {
        let collection = ParameterCollection::new()
            .with(ParameterDefinition::value(1))
            .unwrap()
            .with(ParameterDefinition::keyword("a", Definition::Int("2".into())))
            .unwrap()
            .with(ParameterDefinition::value(3))
            .unwrap();

        assert_eq!(collection.len(), 3);
        assert_eq!(collection.sequence()[0].raw(), Value::Int(1));
        assert_eq!(collection.sequence()[1].raw(), Value::Int(3));
        assert_eq!(collection.items()["a"].raw(), Value::from("2"));
    }

    #[test]
    fn should_reject_duplicate_names() {
        let mut collection = ParameterCollection::new();
        collection
            .add(ParameterDefinition::keyword("a", Definition::Str("x".into())))
            .unwrap();

        assert_eq!(
            collection
                .add(ParameterDefinition::keyword("a", Definition::Str("y".into())))
                .unwrap_err(),
            DefinitionError::DuplicateParameterName("a".to_string())
        );
    }

    #[test]
    fn should_collect_nested_dependencies() {
        let nested = ParameterCollection::new()
            .with(ParameterDefinition::service("b"))
            .unwrap();
        let collection = ParameterCollection::new()
            .with(ParameterDefinition::service("a"))
            .unwrap()
            .with(ParameterDefinition::keyword("list", Definition::List(nested)))
            .unwrap()
            .with(ParameterDefinition::positional(Definition::Type("c".into())))
            .unwrap()
            .with(ParameterDefinition::new(
                Definition::Service("raw".into()),
                Some("raw"),
                false,
            ))
            .unwrap();

        let mut dependencies = FxHashSet::default();
        collection.collect_dependencies(&mut dependencies);

        assert_eq!(dependencies.len(), 2);
        assert!(dependencies.contains("a"));
        assert!(dependencies.contains("b"));
        assert!(!dependencies.contains("raw"));
    }
}
