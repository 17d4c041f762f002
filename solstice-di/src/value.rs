//! Runtime values flowing through the container: constructor and method arguments, results of
//! calls and resolved services are all represented as a [Value].

use crate::catalog::{CallableDescriptorPtr, TypeDescriptorPtr};
use crate::error::ErrorPtr;
use crate::instance::ServiceInstance;
use crate::registry::CoreHandle;
use indexmap::IndexMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Dynamically-typed value.
///
/// Services, types, callables, core handles and errors compare by identity, everything else
/// structurally. Sets compare without regard to order.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    None,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Set(Vec<Value>),
    Dict(IndexMap<String, Value>),
    Type(TypeDescriptorPtr),
    Callable(CallableDescriptorPtr),
    Service(ServiceInstance),
    Core(CoreHandle),
    Error(ErrorPtr),
}

impl Value {
    /// Creates a set, dropping duplicated values.
    pub fn set(values: Vec<Value>) -> Self {
        let mut unique: Vec<Value> = Vec::with_capacity(values.len());
        for value in values {
            if !unique.contains(&value) {
                unique.push(value);
            }
        }

        Self::Set(unique)
    }

    /// Name of the kind of this value, as used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Str(_) => "str",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Set(_) => "set",
            Value::Dict(_) => "dict",
            Value::Type(_) => "type",
            Value::Callable(_) => "callable",
            Value::Service(_) => "service",
            Value::Core(_) => "core",
            Value::Error(_) => "error",
        }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns elements of any sequence-like value: list, tuple or set.
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::List(values) | Value::Tuple(values) | Value::Set(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Dict(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&TypeDescriptorPtr> {
        match self {
            Value::Type(descriptor) => Some(descriptor),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&CallableDescriptorPtr> {
        match self {
            Value::Callable(callable) => Some(callable),
            _ => None,
        }
    }

    pub fn as_service(&self) -> Option<&ServiceInstance> {
        match self {
            Value::Service(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn as_core(&self) -> Option<&CoreHandle> {
        match self {
            Value::Core(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorPtr> {
        match self {
            Value::Error(error) => Some(error),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => {
                a.len() == b.len() && a.iter().all(|value| b.contains(value))
            }
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => Arc::ptr_eq(a, b) || a.name() == b.name(),
            (Value::Callable(a), Value::Callable(b)) => Arc::ptr_eq(a, b),
            (Value::Service(a), Value::Service(b)) => a.ptr_eq(b),
            (Value::Core(a), Value::Core(b)) => a.ptr_eq(b),
            (Value::Error(a), Value::Error(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }
}

fn write_sequence(
    f: &mut Formatter<'_>,
    values: &[Value],
    open: &str,
    close: &str,
) -> std::fmt::Result {
    write!(f, "{open}")?;
    for (index, value) in values.iter().enumerate() {
        if index > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{value}")?;
    }
    write!(f, "{close}")
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Str(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::List(values) => write_sequence(f, values, "[", "]"),
            Value::Tuple(values) => write_sequence(f, values, "(", ")"),
            Value::Set(values) => write_sequence(f, values, "{", "}"),
            Value::Dict(values) => {
                write!(f, "{{")?;
                for (index, (key, value)) in values.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Value::Type(descriptor) => write!(f, "<type {}>", descriptor.name()),
            Value::Callable(callable) => write!(f, "<callable {}>", callable.name()),
            Value::Service(instance) => write!(f, "<{} instance>", instance.type_name()),
            Value::Core(_) => write!(f, "<core>"),
            Value::Error(error) => write!(f, "{error}"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<ServiceInstance> for Value {
    fn from(value: ServiceInstance) -> Self {
        Value::Service(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// Arguments for a call: positional values followed by keyword values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Arguments {
    pub positional: Vec<Value>,
    pub keyword: IndexMap<String, Value>,
}

impl Arguments {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn with<T: Into<Value>>(mut self, value: T) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Sets a keyword argument.
    pub fn with_keyword<T: Into<Value>>(mut self, name: &str, value: T) -> Self {
        self.keyword.insert(name.to_string(), value.into());
        self
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::value::{Arguments, Value};

    #[test]
    fn should_deduplicate_sets() {
        let set = Value::set(vec![1.into(), 2.into(), 1.into()]);
        assert_eq!(set.as_sequence().unwrap().len(), 2);
        assert_eq!(set, Value::Set(vec![2.into(), 1.into()]));
        assert_ne!(set, Value::List(vec![1.into(), 2.into()]));
    }

    #[test]
    fn should_display_nested_values() {
        let value = Value::List(vec![
            "a".into(),
            Value::Tuple(vec![1.into(), true.into()]),
            Value::None,
        ]);
        assert_eq!(value.to_string(), "[a, (1, true), None]");
    }

    #[test]
    fn should_build_arguments() {
        let arguments = Arguments::new().with(1).with_keyword("name", "x");
        assert_eq!(arguments.positional, vec![Value::Int(1)]);
        assert_eq!(arguments.keyword["name"], Value::from("x"));
        assert!(!arguments.is_empty());
    }
}
