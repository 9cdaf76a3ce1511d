//! Table schemas and value validation.
//!
//! A schema is the column metadata a table exposes to views: names, types,
//! nullability, search indexes and link targets.

use crate::{error::Result, ColKey, DataType, Error, TableKey, Value};
use serde::{Deserialize, Serialize};

/// Definition of a column in a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    /// Column name
    pub name: String,
    /// Column type
    pub data_type: DataType,
    /// Whether the column accepts null
    pub nullable: bool,
    /// Whether a search index is maintained for the column
    pub indexed: bool,
    /// Target table for link and link list columns
    pub link_target: Option<TableKey>,
}

impl ColumnSpec {
    /// Create a non-nullable column.
    pub fn required(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: false,
            indexed: false,
            link_target: None,
        }
    }

    /// Create a nullable column.
    pub fn nullable(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            nullable: true,
            ..Self::required(name, data_type)
        }
    }

    /// Create a single-link column. Links are always nullable.
    pub fn link(name: impl Into<String>, target: TableKey) -> Self {
        Self {
            nullable: true,
            link_target: Some(target),
            ..Self::required(name, DataType::Link)
        }
    }

    /// Create a link list column.
    pub fn link_list(name: impl Into<String>, target: TableKey) -> Self {
        Self {
            link_target: Some(target),
            ..Self::required(name, DataType::LinkList)
        }
    }

    /// Builder-style method to request a search index.
    pub fn with_index(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Validate a value against this column definition.
    pub fn validate(&self, value: &Value) -> Result<()> {
        match value {
            Value::Null if self.nullable => Ok(()),
            Value::Null => Err(Error::NullNotAllowed(self.name.clone())),
            v if v.data_type() == Some(self.data_type) => Ok(()),
            v => Err(Error::type_mismatch(&self.name, self.data_type, v.type_name())),
        }
    }
}

/// Schema for a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    /// Table name
    pub name: String,
    /// Column definitions; a column's position is its [`ColKey`]
    pub columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// Create a new table schema.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Builder-style method to add a column.
    pub fn with_column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get a column definition by key.
    pub fn column(&self, col: ColKey) -> Option<&ColumnSpec> {
        self.columns.get(col.0)
    }

    /// Get a column definition by key, failing if it does not exist.
    pub fn require_column(&self, col: ColKey) -> Result<&ColumnSpec> {
        self.column(col)
            .ok_or_else(|| Error::ColumnNotFound(format!("{} in table '{}'", col, self.name)))
    }

    /// Map a column name to its key.
    pub fn column_key(&self, name: &str) -> Option<ColKey> {
        self.columns.iter().position(|c| c.name == name).map(ColKey)
    }

    /// Validate a full row of values in column order.
    pub fn validate_row(&self, values: &[Value]) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(Error::InvalidDescriptor(format!(
                "table '{}' has {} columns, row has {} values",
                self.name,
                self.columns.len(),
                values.len()
            )));
        }
        for (spec, value) in self.columns.iter().zip(values) {
            spec.validate(value)?;
        }
        Ok(())
    }

    /// Columns that link to other tables, with their targets.
    pub fn link_columns(&self) -> impl Iterator<Item = (ColKey, TableKey)> + '_ {
        self.columns
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.link_target.map(|t| (ColKey(i), t)))
    }
}
