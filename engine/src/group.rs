//! Group - one transaction context over a set of tables.
//!
//! A group is what a single thread holds while it works on its snapshot of the
//! database. Cloning a group yields an independent snapshot of the same logical
//! database: table and object keys stay valid across the clone, which is what
//! lets a handover patch produced in one group be imported into another.
//!
//! Every mutation ticks the group's [`VersionClock`] and stamps the tables it
//! touched. Link changes stamp the target table too, because the target's
//! backlinks changed.

use crate::table::BacklinkColumn;
use crate::{
    error::Result, ColKey, DataType, Error, ObjKey, Table, TableKey, TableSchema, Value, Version,
    VersionClock,
};
use std::collections::BTreeMap;
use tracing::trace;

/// A transaction context holding all tables.
#[derive(Debug, Clone, Default)]
pub struct Group {
    tables: BTreeMap<TableKey, Table>,
    next_table_key: u32,
    clock: VersionClock,
}

impl Group {
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent version issued in this group.
    pub fn version(&self) -> Version {
        self.clock.current()
    }

    /// Add a table. Link columns must target existing tables (or the new table itself).
    pub fn add_table(&mut self, schema: TableSchema) -> Result<TableKey> {
        if self.table_key(&schema.name).is_some() {
            return Err(Error::TableAlreadyExists(schema.name));
        }

        let key = TableKey(self.next_table_key);
        for (_, target) in schema.link_columns() {
            if target != key && !self.tables.contains_key(&target) {
                return Err(Error::TableNotFound(target));
            }
        }

        let links: Vec<_> = schema.link_columns().collect();
        let version = self.clock.tick();
        self.next_table_key += 1;
        self.tables.insert(key, Table::new(key, schema, version));

        for (col, target) in links {
            if let Some(target_table) = self.tables.get_mut(&target) {
                target_table.register_backlink_column(key, col);
                target_table.set_version(version);
            }
        }

        trace!(table = %key, version, "added table");
        Ok(key)
    }

    /// Remove a table. Fails while other tables still link to it.
    pub fn remove_table(&mut self, key: TableKey) -> Result<()> {
        let table = self.get_table(key)?;
        if table.backlink_columns().any(|c| c.origin_table != key) {
            return Err(Error::TableIsLinkTarget(key));
        }

        self.tables.remove(&key);
        let version = self.clock.tick();
        for table in self.tables.values_mut() {
            if table.backlink_columns().any(|c| c.origin_table == key) {
                table.unregister_backlinks_from(key);
                table.set_version(version);
            }
        }

        trace!(table = %key, version, "removed table");
        Ok(())
    }

    pub fn table(&self, key: TableKey) -> Option<&Table> {
        self.tables.get(&key)
    }

    /// Get a table, failing if it does not exist in this group.
    pub fn get_table(&self, key: TableKey) -> Result<&Table> {
        self.tables.get(&key).ok_or(Error::TableNotFound(key))
    }

    pub fn table_key(&self, name: &str) -> Option<TableKey> {
        self.tables
            .values()
            .find(|t| t.name() == name)
            .map(|t| t.key())
    }

    pub fn table_by_name(&self, name: &str) -> Result<&Table> {
        self.table_key(name)
            .and_then(|k| self.tables.get(&k))
            .ok_or_else(|| Error::TableNameNotFound(name.to_string()))
    }

    pub fn table_keys(&self) -> impl Iterator<Item = TableKey> + '_ {
        self.tables.keys().copied()
    }

    /// Create an object with every column at its default value.
    pub fn create_object(&mut self, table: TableKey) -> Result<ObjKey> {
        let values = self
            .get_table(table)?
            .schema()
            .columns
            .iter()
            .map(|c| c.data_type.default_value(c.nullable))
            .collect();
        self.create_object_with(table, values)
    }

    /// Create an object from a full row of values in column order.
    pub fn create_object_with(&mut self, table: TableKey, values: Vec<Value>) -> Result<ObjKey> {
        let schema = self.get_table(table)?.schema().clone();
        schema.validate_row(&values)?;
        for (col, target) in schema.link_columns() {
            self.check_link_targets(target, &values[col.0])?;
        }

        let key = self.table_mut(table)?.insert(values.clone());

        let mut touched = vec![table];
        for (col, target) in schema.link_columns() {
            let column = BacklinkColumn {
                origin_table: table,
                origin_column: col,
            };
            for link in link_keys(&values[col.0]) {
                self.table_mut(target)?.add_backlink(column, link, key);
            }
            touched.push(target);
        }

        let version = self.stamp(&touched);
        trace!(table = %table, key = %key, version, "created object");
        Ok(key)
    }

    /// Set one column of one object.
    pub fn set(
        &mut self,
        table: TableKey,
        key: ObjKey,
        col: ColKey,
        value: impl Into<Value>,
    ) -> Result<()> {
        let value = value.into();
        let spec = self.get_table(table)?.column_spec(col)?.clone();
        spec.validate(&value)?;
        if let Some(target) = spec.link_target {
            self.check_link_targets(target, &value)?;
        }

        let old = self.table_mut(table)?.set_value(key, col, value.clone())?;

        let mut touched = vec![table];
        if let Some(target) = spec.link_target {
            let column = BacklinkColumn {
                origin_table: table,
                origin_column: col,
            };
            let target_table = self.table_mut(target)?;
            for link in link_keys(&old) {
                target_table.remove_backlink(column, link, key);
            }
            for link in link_keys(&value) {
                target_table.add_backlink(column, link, key);
            }
            touched.push(target);
        }

        let version = self.stamp(&touched);
        trace!(table = %table, key = %key, column = %col, version, "set value");
        Ok(())
    }

    /// Append a link to a link list column.
    pub fn add_link(
        &mut self,
        table: TableKey,
        key: ObjKey,
        col: ColKey,
        target: ObjKey,
    ) -> Result<()> {
        let spec = self.get_table(table)?.column_spec(col)?;
        if spec.data_type != DataType::LinkList {
            return Err(Error::type_mismatch(&spec.name, DataType::LinkList, spec.data_type));
        }
        let mut links = match self.get_table(table)?.get(key, col)? {
            Value::LinkList(links) => links.clone(),
            _ => Vec::new(),
        };
        links.push(target);
        self.set(table, key, col, Value::LinkList(links))
    }

    /// Delete an object.
    ///
    /// Links pointing at it are nullified (removed from link lists), so no
    /// table ever holds a dangling link.
    pub fn remove_object(&mut self, table: TableKey, key: ObjKey) -> Result<()> {
        self.get_table(table)?.get_object(key)?;
        let incoming = self.get_table(table)?.all_backlinks(key);

        let mut touched = vec![table];
        for (column, origin) in incoming {
            if column.origin_table == table && origin == key {
                continue;
            }
            let origin_table = self.table_mut(column.origin_table)?;
            if let Some(object) = origin_table.object_mut(origin) {
                if let Some(slot) = object.value_mut(column.origin_column) {
                    let nullify = match slot {
                        Value::Link(k) => *k == key,
                        Value::LinkList(links) => {
                            links.retain(|k| *k != key);
                            false
                        }
                        _ => false,
                    };
                    if nullify {
                        *slot = Value::Null;
                    }
                }
            }
            touched.push(column.origin_table);
        }

        let schema = self.get_table(table)?.schema().clone();
        let removed = self
            .table_mut(table)?
            .remove(key)
            .ok_or(Error::ObjectNotFound { table, key })?;

        for (col, target) in schema.link_columns() {
            let column = BacklinkColumn {
                origin_table: table,
                origin_column: col,
            };
            if let Ok(target_table) = self.table_mut(target) {
                for link in link_keys(removed.get(col)) {
                    target_table.remove_backlink(column, link, key);
                }
                touched.push(target);
            }
        }

        let version = self.stamp(&touched);
        trace!(table = %table, key = %key, version, "removed object");
        Ok(())
    }

    fn table_mut(&mut self, key: TableKey) -> Result<&mut Table> {
        self.tables.get_mut(&key).ok_or(Error::TableNotFound(key))
    }

    /// Links must point at live objects.
    fn check_link_targets(&self, target: TableKey, value: &Value) -> Result<()> {
        let target_table = self.get_table(target)?;
        for link in link_keys(value) {
            if !target_table.is_valid(link) {
                return Err(Error::DanglingLink { table: target, key: link });
            }
        }
        Ok(())
    }

    fn stamp(&mut self, tables: &[TableKey]) -> Version {
        let version = self.clock.tick();
        for key in tables {
            if let Some(table) = self.tables.get_mut(key) {
                table.set_version(version);
            }
        }
        version
    }
}

fn link_keys(value: &Value) -> Vec<ObjKey> {
    match value {
        Value::Link(key) => vec![*key],
        Value::LinkList(keys) => keys.clone(),
        _ => Vec::new(),
    }
}
