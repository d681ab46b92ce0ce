//! Structural value model shared by the assertion engine and the mock engine.
//!
//! Comparisons are value-based for scalars and field-by-field for composite
//! values. Values of incompatible kinds never coerce; comparing them yields
//! an explicit [`KindMismatch`] so the caller can surface a failure instead
//! of silently succeeding.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// The absent value. Also what a void-returning capability member yields.
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    Record(BTreeMap<String, Value>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    Unit,
    Bool,
    Int,
    Float,
    Text,
    List,
    Record,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot compare {left} with {right}")]
pub struct KindMismatch {
    pub left: ValueKind,
    pub right: ValueKind,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Unit => ValueKind::Unit,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Text(_) => ValueKind::Text,
            Value::List(_) => ValueKind::List,
            Value::Record(_) => ValueKind::Record,
        }
    }

    /// Structural equality with explicit kind checking.
    ///
    /// Same-kind values compare by value (scalars) or element by element
    /// (lists, records). Differing kinds, at any nesting depth, are a
    /// [`KindMismatch`] rather than `false`.
    pub fn structural_eq(&self, other: &Value) -> Result<bool, KindMismatch> {
        match (self, other) {
            (Value::Unit, Value::Unit) => Ok(true),
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            (Value::Int(a), Value::Int(b)) => Ok(a == b),
            (Value::Float(a), Value::Float(b)) => Ok(a == b),
            (Value::Text(a), Value::Text(b)) => Ok(a == b),
            (Value::List(a), Value::List(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (lhs, rhs) in a.iter().zip(b) {
                    if !lhs.structural_eq(rhs)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Value::Record(a), Value::Record(b)) => {
                if a.len() != b.len() || a.keys().ne(b.keys()) {
                    return Ok(false);
                }
                for (field, lhs) in a {
                    if !lhs.structural_eq(&b[field])? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (lhs, rhs) => Err(KindMismatch {
                left: lhs.kind(),
                right: rhs.kind(),
            }),
        }
    }
}

impl ValueKind {
    /// The zero/empty/absent value of this kind, used for lenient mock
    /// defaults.
    pub fn default_value(&self) -> Value {
        match self {
            ValueKind::Unit => Value::Unit,
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Int => Value::Int(0),
            ValueKind::Float => Value::Float(0.0),
            ValueKind::Text => Value::Text(String::new()),
            ValueKind::List => Value::List(Vec::new()),
            ValueKind::Record => Value::Record(BTreeMap::new()),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Unit => "unit",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Text => "text",
            ValueKind::List => "list",
            ValueKind::Record => "record",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => f.write_str("()"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v:?}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Record(fields) => {
                f.write_str("{")?;
                for (idx, (name, value)) in fields.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Record(v)
    }
}
