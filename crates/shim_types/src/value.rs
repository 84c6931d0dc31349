//! Tagged field values
//!
//! Every configuration field holds exactly one of the variants below. The
//! variant doubles as the runtime type of the field, so accessors can check a
//! value against the declared [`TypeTag`] before storing it.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Type Tags
// ─────────────────────────────────────────────────────────────────────────────

/// Declared type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    Int32,
    Int64,
    Unsigned,
    Double,
    Bool,
    String,
    IntList,
    StringList,
}

impl TypeTag {
    /// Zero value of this type, used for optional fields without a declared default
    pub fn zero(&self) -> Value {
        match self {
            TypeTag::Int32 => Value::Int32(0),
            TypeTag::Int64 => Value::Int64(0),
            TypeTag::Unsigned => Value::Unsigned(0),
            TypeTag::Double => Value::Double(0.0),
            TypeTag::Bool => Value::Bool(false),
            TypeTag::String => Value::String(String::new()),
            TypeTag::IntList => Value::IntList(Vec::new()),
            TypeTag::StringList => Value::StringList(Vec::new()),
        }
    }

    /// Whether values of this type are sequences
    pub fn is_list(&self) -> bool {
        matches!(self, TypeTag::IntList | TypeTag::StringList)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Int32 => "int32",
            TypeTag::Int64 => "int64",
            TypeTag::Unsigned => "unsigned",
            TypeTag::Double => "double",
            TypeTag::Bool => "bool",
            TypeTag::String => "string",
            TypeTag::IntList => "list<int>",
            TypeTag::StringList => "list<string>",
        }
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Value
// ─────────────────────────────────────────────────────────────────────────────

/// A field value, one variant per supported scalar or list kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Int32(i32),
    Int64(i64),
    Unsigned(u32),
    Double(f64),
    Bool(bool),
    String(String),
    IntList(Vec<i32>),
    StringList(Vec<String>),
}

impl Value {
    /// Runtime type of this value
    pub fn tag(&self) -> TypeTag {
        match self {
            Value::Int32(_) => TypeTag::Int32,
            Value::Int64(_) => TypeTag::Int64,
            Value::Unsigned(_) => TypeTag::Unsigned,
            Value::Double(_) => TypeTag::Double,
            Value::Bool(_) => TypeTag::Bool,
            Value::String(_) => TypeTag::String,
            Value::IntList(_) => TypeTag::IntList,
            Value::StringList(_) => TypeTag::StringList,
        }
    }

    /// Fail with [`ValueError::TypeMismatch`] unless this value has the expected tag
    pub fn expect_tag(&self, expected: TypeTag) -> Result<(), ValueError> {
        let actual = self.tag();
        if actual == expected {
            Ok(())
        } else {
            Err(ValueError::TypeMismatch { expected, actual })
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view of any integer variant
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(i) => Some(i64::from(*i)),
            Value::Int64(i) => Some(*i),
            Value::Unsigned(u) => Some(i64::from(*u)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_int_list(&self) -> Option<&[i32]> {
        match self {
            Value::IntList(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_string_list(&self) -> Option<&[String]> {
        match self {
            Value::StringList(l) => Some(l),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int32(i) => write!(f, "{i}"),
            Value::Int64(i) => write!(f, "{i}"),
            Value::Unsigned(u) => write!(f, "{u}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::String(s) => f.write_str(s),
            Value::IntList(l) => {
                let items: Vec<String> = l.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Value::StringList(l) => write!(f, "[{}]", l.join(", ")),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// From Implementations
// ─────────────────────────────────────────────────────────────────────────────

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Unsigned(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<i32>> for Value {
    fn from(v: Vec<i32>) -> Self {
        Value::IntList(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::StringList(v)
    }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self {
        Value::StringList(v.into_iter().map(str::to_string).collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Error when a value does not fit the declared type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    #[error("expected {expected}, got {actual}")]
    TypeMismatch { expected: TypeTag, actual: TypeTag },

    #[error("{value} is out of range for {tag}")]
    OutOfRange { value: i64, tag: TypeTag },
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
