//! Column data types and cell values.

use crate::ObjKey;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Column types supported by tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int,
    Bool,
    Float,
    Double,
    String,
    Binary,
    Timestamp,
    /// Single link to an object in another table
    Link,
    /// Ordered list of links to objects in another table
    LinkList,
}

impl DataType {
    /// Whether this is a link or link list column.
    pub fn is_link(&self) -> bool {
        matches!(self, DataType::Link | DataType::LinkList)
    }

    /// The value a fresh object gets in a column of this type.
    pub fn default_value(&self, nullable: bool) -> Value {
        match self {
            DataType::LinkList => Value::LinkList(Vec::new()),
            _ if nullable => Value::Null,
            DataType::Int => Value::Int(0),
            DataType::Bool => Value::Bool(false),
            DataType::Float => Value::Float(0.0),
            DataType::Double => Value::Double(0.0),
            DataType::String => Value::String(String::new()),
            DataType::Binary => Value::Binary(Vec::new()),
            DataType::Timestamp => Value::Timestamp(Timestamp::default()),
            DataType::Link => Value::Null,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Int => "Int",
            DataType::Bool => "Bool",
            DataType::Float => "Float",
            DataType::Double => "Double",
            DataType::String => "String",
            DataType::Binary => "Binary",
            DataType::Timestamp => "Timestamp",
            DataType::Link => "Link",
            DataType::LinkList => "LinkList",
        };
        f.write_str(name)
    }
}

/// A point in time with nanosecond precision.
///
/// Timestamps only support ordering comparisons, never arithmetic. A null
/// timestamp is represented by [`Value::Null`], not by a special instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanoseconds: i32,
}

impl Timestamp {
    pub fn new(seconds: i64, nanoseconds: i32) -> Self {
        Self {
            seconds,
            nanoseconds,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanoseconds)
    }
}

/// A single cell value.
///
/// `Value` has a total order so it can be sorted and deduplicated: values of
/// different types order by type rank, `Null` first; floats compare with
/// `total_cmp`, so `NaN` equals itself and `-0.0` sorts before `0.0`.
/// Searches and query conditions use [`Value::matches`] instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Null,
    Int(i64),
    Bool(bool),
    Float(f32),
    Double(f64),
    String(String),
    Binary(Vec<u8>),
    Timestamp(Timestamp),
    Link(ObjKey),
    LinkList(Vec<ObjKey>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The data type of a non-null value.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Int(_) => Some(DataType::Int),
            Value::Bool(_) => Some(DataType::Bool),
            Value::Float(_) => Some(DataType::Float),
            Value::Double(_) => Some(DataType::Double),
            Value::String(_) => Some(DataType::String),
            Value::Binary(_) => Some(DataType::Binary),
            Value::Timestamp(_) => Some(DataType::Timestamp),
            Value::Link(_) => Some(DataType::Link),
            Value::LinkList(_) => Some(DataType::LinkList),
        }
    }

    /// Equality as searches see it. Floats compare numerically, so `-0.0`
    /// matches `0.0` and `NaN` matches nothing. Null matches only null.
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            _ => self == other,
        }
    }

    pub(crate) fn type_name(&self) -> String {
        self.data_type()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "Null".to_string())
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Int(_) => 1,
            Value::Bool(_) => 2,
            Value::Float(_) => 3,
            Value::Double(_) => 4,
            Value::String(_) => 5,
            Value::Binary(_) => 6,
            Value::Timestamp(_) => 7,
            Value::Link(_) => 8,
            Value::LinkList(_) => 9,
        }
    }

    /// Render as plain JSON (no type tags), the way rows are dumped.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Int(v) => Json::from(*v),
            Value::Bool(v) => Json::from(*v),
            Value::Float(v) => Json::from(*v as f64),
            Value::Double(v) => Json::from(*v),
            Value::String(v) => Json::from(v.as_str()),
            Value::Binary(v) => {
                Json::from(v.iter().map(|b| format!("{b:02x}")).collect::<String>())
            }
            Value::Timestamp(ts) => Json::from(ts.to_string()),
            Value::Link(key) => Json::from(key.0),
            Value::LinkList(keys) => Json::from(keys.iter().map(|k| k.0).collect::<Vec<_>>()),
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
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Double(a), Value::Double(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Binary(a), Value::Binary(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Link(a), Value::Link(b)) => a.cmp(b),
            (Value::LinkList(a), Value::LinkList(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Binary(v) => write!(f, "<{} bytes>", v.len()),
            Value::Timestamp(ts) => write!(f, "{ts}"),
            Value::Link(key) => write!(f, "->{}", key.0),
            Value::LinkList(keys) => write!(f, "[{} links]", keys.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
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

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Self {
        Value::Timestamp(v)
    }
}

impl From<ObjKey> for Value {
    fn from(v: ObjKey) -> Self {
        Value::Link(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
