//! Conversion of declarative [ParameterDefinition]s into runtime [Value]s.
//!
//! Textual values are interpolated with environment variables before being interpreted. The
//! supported patterns are:
//!
//! * `{ $NAME }` - value of `NAME`, which must exist
//! * `{ $NAME or "default" }` - value of `NAME` or the quoted default
//! * `{ $NAME or 123 }`, `{ $NAME or 1.25 }` - value of `NAME` or the numeric default
//!
//! Substituted values are inserted as they are, so patterns inside them stay untouched.

use crate::catalog::TypeResolverPtr;
use crate::error::{CastError, ResolutionError};
use crate::parameter::{Definition, ParameterCollection, ParameterDefinition};
use crate::value::{Arguments, Value};
use indexmap::IndexMap;
#[cfg(test)]
use mockall::automock;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::trace;

static INTERPOLATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\{\s*\$(?P<name>[A-Za-z_][A-Za-z0-9_]*)(?:\s+or\s+(?:"(?P<text>[^"]*)"|(?P<number>-?\d+(?:\.\d+)?)))?\s*\}"#,
    )
    .expect("interpolation pattern should be valid")
});

pub type EnvironmentPtr = Arc<dyn Environment + Send + Sync>;

/// Source of environment variables used for interpolation.
#[cfg_attr(test, automock)]
pub trait Environment {
    fn var(&self, name: &str) -> Option<String>;
}

/// [Environment] reading variables of the current process.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    #[inline]
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Provides services referenced by parameters. `chain` contains IDs of services currently being
/// activated, which is used for detecting circular dependencies.
#[cfg_attr(test, automock)]
pub trait ServiceLocator {
    fn locate(&self, id: &str, chain: &[String]) -> Result<Value, ResolutionError>;
}

/// Turns parameter definitions into values.
#[derive(Clone)]
pub struct Transformer {
    type_resolver: TypeResolverPtr,
    environment: EnvironmentPtr,
}

impl Transformer {
    pub fn new(type_resolver: TypeResolverPtr, environment: EnvironmentPtr) -> Self {
        Self {
            type_resolver,
            environment,
        }
    }

    #[inline]
    pub fn type_resolver(&self) -> &TypeResolverPtr {
        &self.type_resolver
    }

    /// Converts a single parameter, resolving referenced services via `locator`.
    pub fn cast(
        &self,
        parameter: &ParameterDefinition,
        locator: &dyn ServiceLocator,
        chain: &[String],
    ) -> Result<Value, ResolutionError> {
        if !parameter.needs_transform() {
            return Ok(parameter.raw());
        }

        trace!(kind = parameter.definition().kind_name(), "Casting parameter.");

        match parameter.definition() {
            Definition::Value(value) => Ok(value.clone()),
            Definition::Service(id) => locator.locate(id, chain),
            Definition::Type(name) => self
                .type_resolver
                .resolve_type(name)
                .map(Value::Type)
                .ok_or_else(|| ResolutionError::TypeResolution(name.clone())),
            Definition::Str(text) => Ok(Value::Str(self.interpolate(text)?)),
            Definition::Int(text) => {
                let text = self.interpolate(text)?;
                text.trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| format_error("int", text).into())
            }
            Definition::Float(text) => {
                let text = self.interpolate(text)?;
                text.trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| format_error("float", text).into())
            }
            Definition::Bool(text) => {
                let text = self.interpolate(text)?;
                match text.trim().to_lowercase().as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Err(format_error("bool", text).into()),
                }
            }
            Definition::List(collection) => self
                .cast_sequence(collection, locator, chain)
                .map(Value::List),
            Definition::Tuple(collection) => self
                .cast_sequence(collection, locator, chain)
                .map(Value::Tuple),
            Definition::Set(collection) => self
                .cast_sequence(collection, locator, chain)
                .map(Value::set),
            Definition::Dict(collection) => collection
                .items()
                .iter()
                .map(|(name, item)| Ok((name.clone(), self.cast(item, locator, chain)?)))
                .collect::<Result<IndexMap<_, _>, ResolutionError>>()
                .map(Value::Dict),
        }
    }

    /// Converts a whole collection into call arguments.
    pub fn cast_collection(
        &self,
        collection: &ParameterCollection,
        locator: &dyn ServiceLocator,
        chain: &[String],
    ) -> Result<Arguments, ResolutionError> {
        Ok(Arguments {
            positional: self.cast_sequence(collection, locator, chain)?,
            keyword: collection
                .items()
                .iter()
                .map(|(name, item)| Ok((name.clone(), self.cast(item, locator, chain)?)))
                .collect::<Result<IndexMap<_, _>, ResolutionError>>()?,
        })
    }

    /// Replaces environment variable patterns in given text. Substituted values are taken
    /// verbatim and never interpolated again.
    pub fn interpolate(&self, text: &str) -> Result<String, CastError> {
        let mut result = String::with_capacity(text.len());
        let mut last_end = 0;

        for captures in INTERPOLATION_PATTERN.captures_iter(text) {
            let Some(pattern) = captures.get(0) else {
                continue;
            };

            let name = &captures["name"];
            let replacement = self
                .environment
                .var(name)
                .or_else(|| {
                    captures
                        .name("text")
                        .or_else(|| captures.name("number"))
                        .map(|default| default.as_str().to_string())
                })
                .ok_or_else(|| CastError::UnknownEnvironmentVariable(name.to_string()))?;

            trace!(name, "Interpolated environment variable.");
            result.push_str(&text[last_end..pattern.start()]);
            result.push_str(&replacement);
            last_end = pattern.end();
        }

        result.push_str(&text[last_end..]);
        Ok(result)
    }

    fn cast_sequence(
        &self,
        collection: &ParameterCollection,
        locator: &dyn ServiceLocator,
        chain: &[String],
    ) -> Result<Vec<Value>, ResolutionError> {
        collection
            .sequence()
            .iter()
            .map(|item| self.cast(item, locator, chain))
            .collect()
    }
}

fn format_error(kind: &'static str, value: String) -> CastError {
    CastError::Format { kind, value }
}
