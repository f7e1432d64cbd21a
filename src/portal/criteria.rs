//! Ordered, typed arguments passed to a handler, and the signatures handlers declare.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Ordered arguments for a dispatch.
///
/// Values are JSON so criteria stay serializable; handlers declare the
/// [`ParamKind`] of each position and the resolver only selects handlers whose
/// signature accepts every value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Criteria(Vec<Value>);

impl Criteria {
    /// No arguments.
    pub fn none() -> Self {
        Self(Vec::new())
    }

    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn single(value: impl Into<Value>) -> Self {
        Self(vec![value.into()])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn str(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(Value::as_str)
    }

    pub fn i64(&self, index: usize) -> Option<i64> {
        self.get(index).and_then(Value::as_i64)
    }

    pub fn bool(&self, index: usize) -> Option<bool> {
        self.get(index).and_then(Value::as_bool)
    }

    pub fn uuid(&self, index: usize) -> Option<Uuid> {
        self.str(index).and_then(|s| Uuid::parse_str(s).ok())
    }

    /// Deserialize the argument at `index` into a concrete type.
    pub fn parse<T: serde::de::DeserializeOwned>(&self, index: usize) -> Option<T> {
        self.get(index)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Human-readable shape of the criteria, e.g. `(string, integer)`.
    pub fn shape(&self) -> String {
        let kinds: Vec<&str> = self.0.iter().map(|v| ParamKind::of(v).as_str()).collect();
        format!("({})", kinds.join(", "))
    }
}

impl From<Vec<Value>> for Criteria {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

/// The kind of value a handler accepts at one argument position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Any,
    Null,
    Bool,
    Integer,
    Number,
    String,
    /// A string that parses as a UUID.
    Uuid,
    Array,
    Object,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Uuid => "uuid",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// The narrowest kind describing a value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            Value::Number(_) => Self::Number,
            Value::String(s) if Uuid::parse_str(s).is_ok() => Self::Uuid,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    /// How narrow the kind is. `Uuid` sits above `String` and `Integer` above
    /// `Number` because each accepts a subset of the other.
    pub fn rank(&self) -> usize {
        match self {
            Self::Any => 0,
            Self::Number | Self::String => 1,
            Self::Null | Self::Bool | Self::Integer | Self::Uuid | Self::Array | Self::Object => 2,
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::Null => value.is_null(),
            Self::Bool => value.is_boolean(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::String => value.is_string(),
            Self::Uuid => value
                .as_str()
                .is_some_and(|s| Uuid::parse_str(s).is_ok()),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

/// Parameter list a handler declares at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature(Vec<ParamKind>);

impl Signature {
    pub fn new(params: Vec<ParamKind>) -> Self {
        Self(params)
    }

    /// A handler taking no criteria.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn params(&self) -> &[ParamKind] {
        &self.0
    }

    pub fn matches(&self, criteria: &Criteria) -> bool {
        self.0.len() == criteria.len()
            && self
                .0
                .iter()
                .zip(criteria.values())
                .all(|(kind, value)| kind.accepts(value))
    }

    /// Sum of [`ParamKind::rank`] over all positions; higher wins between overloads.
    pub fn specificity(&self) -> usize {
        self.0.iter().map(ParamKind::rank).sum()
    }
}

impl From<Vec<ParamKind>> for Signature {
    fn from(params: Vec<ParamKind>) -> Self {
        Self(params)
    }
}

impl<const N: usize> From<[ParamKind; N]> for Signature {
    fn from(params: [ParamKind; N]) -> Self {
        Self(params.to_vec())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<&str> = self.0.iter().map(ParamKind::as_str).collect();
        write!(f, "({})", kinds.join(", "))
    }
}
