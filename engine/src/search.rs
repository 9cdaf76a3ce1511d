//! Typed search over a view's rows.
//!
//! `find_first_*` scans the view in order, skipping detached entries.
//! `find_all_*` runs an equality query restricted to a copy of the view, so the
//! result keeps the view's order and can itself be resynced.

use crate::{
    error::Result, ColKey, DataType, Error, Group, ObjKey, Query, Table, Timestamp, Value, View,
};

/// Column access resolved once per call.
///
/// Looks the column up and checks its type up front, then reads cells by key
/// without repeating either step.
pub(crate) struct ColumnReader<'g> {
    table: &'g Table,
    column: ColKey,
}

impl<'g> ColumnReader<'g> {
    pub(crate) fn new(table: &'g Table, column: ColKey, expected: DataType) -> Result<Self> {
        let spec = table.column_spec(column)?;
        if spec.data_type != expected {
            return Err(Error::type_mismatch(&spec.name, expected, spec.data_type));
        }
        Ok(Self { table, column })
    }

    /// The cell of `key`, or `None` when the object is gone.
    pub(crate) fn read(&self, key: ObjKey) -> Option<&'g Value> {
        self.table.object(key).map(|o| o.get(self.column))
    }
}

impl View {
    pub(crate) fn column_reader<'g>(
        &self,
        group: &'g Group,
        column: ColKey,
        expected: DataType,
    ) -> Result<ColumnReader<'g>> {
        let table = group.table(self.table).ok_or(Error::ViewDetached(self.table))?;
        ColumnReader::new(table, column, expected)
    }

    fn find_first_value(
        &self,
        group: &Group,
        column: ColKey,
        expected: DataType,
        target: Value,
    ) -> Result<Option<usize>> {
        let reader = self.column_reader(group, column, expected)?;
        Ok(self
            .keys()
            .iter()
            .position(|key| reader.read(*key).is_some_and(|v| v.matches(&target))))
    }

    fn find_all_value(
        &self,
        group: &Group,
        column: ColKey,
        expected: DataType,
        target: Value,
    ) -> Result<View> {
        self.column_reader(group, column, expected)?;
        Query::new(self.table)
            .equal(column, target)
            .restrict_to_view(self.clone())?
            .find_all(group)
    }

    pub fn find_first_int(
        &self,
        group: &Group,
        column: ColKey,
        value: i64,
    ) -> Result<Option<usize>> {
        self.find_first_value(group, column, DataType::Int, Value::Int(value))
    }

    pub fn find_first_bool(
        &self,
        group: &Group,
        column: ColKey,
        value: bool,
    ) -> Result<Option<usize>> {
        self.find_first_value(group, column, DataType::Bool, Value::Bool(value))
    }

    pub fn find_first_float(
        &self,
        group: &Group,
        column: ColKey,
        value: f32,
    ) -> Result<Option<usize>> {
        self.find_first_value(group, column, DataType::Float, Value::Float(value))
    }

    pub fn find_first_double(
        &self,
        group: &Group,
        column: ColKey,
        value: f64,
    ) -> Result<Option<usize>> {
        self.find_first_value(group, column, DataType::Double, Value::Double(value))
    }

    pub fn find_first_string(
        &self,
        group: &Group,
        column: ColKey,
        value: &str,
    ) -> Result<Option<usize>> {
        self.find_first_value(group, column, DataType::String, Value::from(value))
    }

    pub fn find_first_binary(
        &self,
        group: &Group,
        column: ColKey,
        value: &[u8],
    ) -> Result<Option<usize>> {
        self.find_first_value(group, column, DataType::Binary, Value::Binary(value.to_vec()))
    }

    /// `None` searches for a null timestamp.
    pub fn find_first_timestamp(
        &self,
        group: &Group,
        column: ColKey,
        value: Option<Timestamp>,
    ) -> Result<Option<usize>> {
        self.find_first_value(group, column, DataType::Timestamp, Value::from(value))
    }

    pub fn find_all_int(&self, group: &Group, column: ColKey, value: i64) -> Result<View> {
        self.find_all_value(group, column, DataType::Int, Value::Int(value))
    }

    pub fn find_all_bool(&self, group: &Group, column: ColKey, value: bool) -> Result<View> {
        self.find_all_value(group, column, DataType::Bool, Value::Bool(value))
    }

    pub fn find_all_float(&self, group: &Group, column: ColKey, value: f32) -> Result<View> {
        self.find_all_value(group, column, DataType::Float, Value::Float(value))
    }

    pub fn find_all_double(&self, group: &Group, column: ColKey, value: f64) -> Result<View> {
        self.find_all_value(group, column, DataType::Double, Value::Double(value))
    }

    pub fn find_all_string(&self, group: &Group, column: ColKey, value: &str) -> Result<View> {
        self.find_all_value(group, column, DataType::String, Value::from(value))
    }

    pub fn find_all_timestamp(
        &self,
        group: &Group,
        column: ColKey,
        value: Option<Timestamp>,
    ) -> Result<View> {
        self.find_all_value(group, column, DataType::Timestamp, Value::from(value))
    }
}
