//! Objects (rows) stored in a table.

use crate::{ColKey, ObjKey, Value};
use serde::{Deserialize, Serialize};

/// A row in a table: its key plus one value per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Object {
    /// Stable identifier within the owning table
    pub key: ObjKey,
    /// Values in column order
    values: Vec<Value>,
}

impl Object {
    /// Create an object from a full row of values.
    pub fn new(key: ObjKey, values: Vec<Value>) -> Self {
        Self { key, values }
    }

    pub fn key(&self) -> ObjKey {
        self.key
    }

    /// Get the value of a column. Out-of-range columns read as null.
    pub fn get(&self, col: ColKey) -> &Value {
        static NULL: Value = Value::Null;
        self.values.get(col.0).unwrap_or(&NULL)
    }

    pub fn is_null(&self, col: ColKey) -> bool {
        self.get(col).is_null()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Replace a column value, returning the previous one.
    pub(crate) fn set(&mut self, col: ColKey, value: Value) -> Value {
        match self.values.get_mut(col.0) {
            Some(slot) => std::mem::replace(slot, value),
            None => Value::Null,
        }
    }

    pub(crate) fn value_mut(&mut self, col: ColKey) -> Option<&mut Value> {
        self.values.get_mut(col.0)
    }
}
