//! Cell values and value kinds

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Storage kind of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Bool,
    Int,
    Uint,
    Float,
    String,
    Bytes,
    Timestamp,
}

impl ValueKind {
    /// Kind able to hold values of both `self` and `other` without loss, if any.
    ///
    /// Uint widens to Int; values above `i64::MAX` are rejected when a row is
    /// converted rather than when the schemas are reconciled.
    pub fn widened_with(self, other: ValueKind) -> Option<ValueKind> {
        use ValueKind::*;
        if self == other {
            return Some(self);
        }
        match (self, other) {
            (Bool, Int) | (Int, Bool) => Some(Int),
            (Int, Float) | (Float, Int) => Some(Float),
            (Uint, Int) | (Int, Uint) => Some(Int),
            _ => None,
        }
    }

    /// Whether a value of this kind may be placed in a column of kind `dest`.
    pub fn converts_to(self, dest: ValueKind) -> bool {
        self.widened_with(dest) == Some(dest)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Uint => "uint",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::Bytes => "bytes",
            ValueKind::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cell value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ValueKind::Bool),
            Value::Int(_) => Some(ValueKind::Int),
            Value::Uint(_) => Some(ValueKind::Uint),
            Value::Float(_) => Some(ValueKind::Float),
            Value::String(_) => Some(ValueKind::String),
            Value::Bytes(_) => Some(ValueKind::Bytes),
            Value::Timestamp(_) => Some(ValueKind::Timestamp),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert into `dest`, returning `None` when the value cannot be represented.
    pub fn convert_to(&self, dest: ValueKind) -> Option<Value> {
        match (self, dest) {
            (Value::Null, _) => Some(Value::Null),
            (Value::Bool(b), ValueKind::Bool) => Some(Value::Bool(*b)),
            (Value::Bool(b), ValueKind::Int) => Some(Value::Int(i64::from(*b))),
            (Value::Int(i), ValueKind::Int) => Some(Value::Int(*i)),
            (Value::Int(i), ValueKind::Float) => Some(Value::Float(*i as f64)),
            (Value::Uint(u), ValueKind::Uint) => Some(Value::Uint(*u)),
            (Value::Uint(u), ValueKind::Int) => i64::try_from(*u).ok().map(Value::Int),
            (Value::Float(f), ValueKind::Float) => Some(Value::Float(*f)),
            (Value::String(s), ValueKind::String) => Some(Value::String(s.clone())),
            (Value::Bytes(b), ValueKind::Bytes) => Some(Value::Bytes(b.clone())),
            (Value::Timestamp(t), ValueKind::Timestamp) => Some(Value::Timestamp(*t)),
            _ => None,
        }
    }

    /// Parse a JSON value as a value of `kind`
    pub fn from_json(json: &serde_json::Value, kind: ValueKind) -> Option<Value> {
        use serde_json::Value as J;
        match (json, kind) {
            (J::Null, _) => Some(Value::Null),
            (J::Bool(b), ValueKind::Bool) => Some(Value::Bool(*b)),
            (J::Number(n), ValueKind::Int) => n.as_i64().map(Value::Int),
            (J::Number(n), ValueKind::Uint) => n.as_u64().map(Value::Uint),
            (J::Number(n), ValueKind::Float) => n.as_f64().map(Value::Float),
            (J::String(s), ValueKind::String) => Some(Value::String(s.clone())),
            (J::String(s), ValueKind::Bytes) => Some(Value::Bytes(s.as_bytes().to_vec())),
            (J::String(s), ValueKind::Timestamp) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| Value::Timestamp(dt.with_timezone(&Utc))),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Uint(_) => 3,
            Value::Float(_) => 4,
            Value::String(_) => 5,
            Value::Bytes(_) => 6,
            Value::Timestamp(_) => 7,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Uint(a), Value::Uint(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Uint(u) => write!(f, "{}", u),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => f.write_str(s),
            Value::Bytes(b) => {
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            Value::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S UTC")),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}
