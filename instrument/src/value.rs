//! Dynamic values exchanged between call sites, settings and history records

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// The semantic type a direct setting value must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueType {
    Bool,
    Int,
    Float,
    Str,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Str => write!(f, "str"),
        }
    }
}

/// A dynamically typed value: setting values, call arguments and return
/// values all travel as `Value`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<String>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(Arc::new(s.into()))
    }

    /// Falsy: `None`, `false`, `0`, `0.0` and the empty string.
    pub fn is_falsy(&self) -> bool {
        match self {
            Self::None => true,
            Self::Bool(b) => !b,
            Self::Int(i) => *i == 0,
            Self::Float(f) => *f == 0.0,
            Self::Str(s) => s.is_empty(),
        }
    }

    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Self::None => None,
            Self::Bool(_) => Some(ValueType::Bool),
            Self::Int(_) => Some(ValueType::Int),
            Self::Float(_) => Some(ValueType::Float),
            Self::Str(_) => Some(ValueType::Str),
        }
    }

    pub fn matches(&self, value_type: ValueType) -> bool {
        self.value_type() == Some(value_type)
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let Self::Bool(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        if let Self::Int(i) = self {
            Some(*i)
        } else {
            None
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        if let Self::Str(s) = self {
            Some(s.as_str())
        } else {
            None
        }
    }
}

impl fmt::Display for Value {
    /// Canonical textual representation, used by the delimited history view.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "'{s}'"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falsy_values() {
        assert!(Value::None.is_falsy());
        assert!(Value::Bool(false).is_falsy());
        assert!(Value::Int(0).is_falsy());
        assert!(Value::str("").is_falsy());
        assert!(!Value::Int(-1).is_falsy());
        assert!(!Value::str("0").is_falsy());
    }

    #[test]
    fn display_is_canonical() {
        assert_eq!(Value::str("abc").to_string(), "'abc'");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
        assert_eq!(Value::None.to_string(), "None");
    }
}
