use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::convert::TryFrom;
use std::fmt;

/// Constant values that can appear in a working memory element
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// String value
    String(String),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// Boolean value
    Boolean(bool),
    /// Array of `Values`
    Array(Vec<Value>),
    /// UTC date/time value
    Date(DateTime<Utc>),
    /// Null value
    Null,
}

// -------------------------------------------------------------------------------------------------
// Conversions between `Value` and `serde_json::Value`, so callers loading facts from JSON
// do not need their own mapping layer.
// -------------------------------------------------------------------------------------------------

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Self::String(s),
            Value::Integer(i) => Self::Number(serde_json::Number::from(i)),
            Value::Float(f) => serde_json::Number::from_f64(f).map_or(Self::Null, Self::Number),
            Value::Boolean(b) => Self::Bool(b),
            Value::Array(arr) => Self::Array(arr.into_iter().map(Into::into).collect()),
            Value::Date(dt) => Self::String(dt.to_rfc3339()),
            Value::Null => Self::Null,
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        value.clone().into()
    }
}

impl TryFrom<&serde_json::Value> for Value {
    type Error = anyhow::Error;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        Ok(match value {
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    Self::Float(f)
                } else {
                    return Err(anyhow!("Unsupported number value: {}", n));
                }
            }
            serde_json::Value::Bool(b) => Self::Boolean(*b),
            serde_json::Value::Array(arr) => {
                Self::Array(arr.iter().map(Self::try_from).collect::<Result<Vec<_>, _>>()?)
            }
            serde_json::Value::Object(_) => {
                return Err(anyhow!("Objects cannot be stored as a single WME value"));
            }
            serde_json::Value::Null => Self::Null,
        })
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Self::String(s) => {
                0u8.hash(state);
                s.hash(state);
            }
            Self::Integer(i) => {
                1u8.hash(state);
                i.hash(state);
            }
            Self::Float(f) => {
                2u8.hash(state);
                float_bits(*f).hash(state);
            }
            Self::Boolean(b) => {
                3u8.hash(state);
                b.hash(state);
            }
            Self::Array(arr) => {
                4u8.hash(state);
                arr.hash(state);
            }
            Self::Date(dt) => {
                5u8.hash(state);
                dt.timestamp_nanos_opt().unwrap_or(0).hash(state);
            }
            Self::Null => {
                6u8.hash(state);
            }
        }
    }
}

/// Bit pattern used for float identity: every NaN is one value and `-0.0`
/// is `0.0`
fn float_bits(f: f64) -> u64 {
    if f.is_nan() {
        f64::NAN.to_bits()
    } else if f == 0.0 {
        0.0_f64.to_bits()
    } else {
        f.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => float_bits(*a) == float_bits(*b),
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Null, Self::Null) => true,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        use Value::{Boolean, Date, Float, Integer, Null, String};
        match (self, other) {
            (String(a), String(b)) => a.partial_cmp(b),
            (Integer(a), Integer(b)) => a.partial_cmp(b),
            (Float(a), Float(b)) if float_bits(*a) == float_bits(*b) => Some(std::cmp::Ordering::Equal),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Boolean(a), Boolean(b)) => a.partial_cmp(b),
            (Date(a), Date(b)) => a.partial_cmp(b),
            (Null, Null) => Some(std::cmp::Ordering::Equal),
            #[allow(clippy::cast_precision_loss)]
            (Integer(a), Float(b)) => (*a as f64).partial_cmp(b),
            #[allow(clippy::cast_precision_loss)]
            (Float(a), Integer(b)) => a.partial_cmp(&(*b as f64)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(fl) => write!(f, "{fl}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Array(arr) => {
                write!(f, "[")?;
                for (i, item) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Date(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.3fZ")),
            Self::Null => write!(f, "null"),
        }
    }
}

impl Value {
    /// Borrow the string content, if this is a string
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content, if this is an integer
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Convenience accessor returning an `f64` representation if this value is numeric.
    /// Returns `None` when the variant is not `Integer` or `Float`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::Array(value)
    }
}

/// A named variable appearing in a rule condition
///
/// Variables compare by name. `Var` borrows as `str`, so binding maps keyed by
/// `Var` can be indexed with plain string slices (`bindings["x"]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Var(String);

impl Var {
    /// Create a variable with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The variable name, without the `?` prefix used for display
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Var {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

impl From<&str> for Var {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Var {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&Var> for Var {
    fn from(value: &Var) -> Self {
        value.clone()
    }
}

/// One slot of a condition or fact: either a constant or a variable placeholder
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    /// A constant that must match exactly
    Const(Value),
    /// A variable that binds whatever value it meets
    Var(Var),
}

impl Term {
    /// Shorthand for a variable term
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(Var::new(name))
    }

    /// Whether this term is a variable placeholder
    #[must_use]
    pub const fn is_var(&self) -> bool {
        matches!(self, Self::Var(_))
    }

    /// The variable, if this term is one
    #[must_use]
    pub const fn as_var(&self) -> Option<&Var> {
        match self {
            Self::Var(v) => Some(v),
            Self::Const(_) => None,
        }
    }

    /// The constant, if this term is one
    #[must_use]
    pub const fn as_const(&self) -> Option<&Value> {
        match self {
            Self::Const(v) => Some(v),
            Self::Var(_) => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(v) => write!(f, "{v}"),
            Self::Var(v) => write!(f, "{v}"),
        }
    }
}

impl From<Value> for Term {
    fn from(value: Value) -> Self {
        Self::Const(value)
    }
}

impl From<Var> for Term {
    fn from(value: Var) -> Self {
        Self::Var(value)
    }
}

impl From<&Var> for Term {
    fn from(value: &Var) -> Self {
        Self::Var(value.clone())
    }
}

impl From<&str> for Term {
    fn from(value: &str) -> Self {
        Self::Const(value.into())
    }
}

impl From<String> for Term {
    fn from(value: String) -> Self {
        Self::Const(value.into())
    }
}

impl From<i64> for Term {
    fn from(value: i64) -> Self {
        Self::Const(value.into())
    }
}

impl From<i32> for Term {
    fn from(value: i32) -> Self {
        Self::Const(value.into())
    }
}

impl From<f64> for Term {
    fn from(value: f64) -> Self {
        Self::Const(value.into())
    }
}

impl From<bool> for Term {
    fn from(value: bool) -> Self {
        Self::Const(value.into())
    }
}

/// The three positions of a working memory element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    /// The object the fact is about
    Identifier,
    /// The property being stated
    Attribute,
    /// The property's value
    Value,
}

impl Field {
    /// All fields in triple order
    pub const ALL: [Self; 3] = [Self::Identifier, Self::Attribute, Self::Value];

    /// Lower-case field name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Identifier => "identifier",
            Self::Attribute => "attribute",
            Self::Value => "value",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
