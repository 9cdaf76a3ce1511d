//! Table - the row store a view is built over.
//!
//! A table keeps its objects in key order (its storage order), a content
//! version stamped by the owning [`Group`](crate::Group) on every change,
//! optional per-column search indexes and the backlink columns other tables
//! registered against it. All mutation goes through the group so that links,
//! backlinks and versions stay consistent across tables.

use crate::{
    error::Result, ColKey, ColumnSpec, DataType, Error, ObjKey, Object, TableKey, TableSchema,
    Value, Version,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Backlink metadata: the origin side of a link column pointing at this table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BacklinkColumn {
    pub origin_table: TableKey,
    pub origin_column: ColKey,
}

/// A table of objects.
#[derive(Debug, Clone)]
pub struct Table {
    key: TableKey,
    schema: TableSchema,
    objects: BTreeMap<ObjKey, Object>,
    next_key: i64,
    content_version: Version,
    /// value -> keys holding it, for indexed columns
    indexes: HashMap<ColKey, BTreeMap<Value, BTreeSet<ObjKey>>>,
    /// target key -> origin keys, in link order, per registered origin column
    backlinks: HashMap<BacklinkColumn, BTreeMap<ObjKey, Vec<ObjKey>>>,
}

impl Table {
    pub(crate) fn new(key: TableKey, schema: TableSchema, version: Version) -> Self {
        let indexes = schema
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.indexed)
            .map(|(i, _)| (ColKey(i), BTreeMap::new()))
            .collect();

        Self {
            key,
            schema,
            objects: BTreeMap::new(),
            next_key: 0,
            content_version: version,
            indexes,
            backlinks: HashMap::new(),
        }
    }

    pub fn key(&self) -> TableKey {
        self.key
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Version stamped by the last change to this table.
    pub fn content_version(&self) -> Version {
        self.content_version
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    // Column metadata

    pub fn column_count(&self) -> usize {
        self.schema.column_count()
    }

    pub fn column_key(&self, name: &str) -> Option<ColKey> {
        self.schema.column_key(name)
    }

    pub fn column_spec(&self, col: ColKey) -> Result<&ColumnSpec> {
        self.schema.require_column(col)
    }

    pub fn column_name(&self, col: ColKey) -> Result<&str> {
        Ok(&self.column_spec(col)?.name)
    }

    pub fn column_type(&self, col: ColKey) -> Result<DataType> {
        Ok(self.column_spec(col)?.data_type)
    }

    pub fn is_nullable(&self, col: ColKey) -> Result<bool> {
        Ok(self.column_spec(col)?.nullable)
    }

    pub fn has_search_index(&self, col: ColKey) -> bool {
        self.indexes.contains_key(&col)
    }

    // Object access

    /// Whether `key` names a live object.
    pub fn is_valid(&self, key: ObjKey) -> bool {
        self.objects.contains_key(&key)
    }

    pub fn object(&self, key: ObjKey) -> Option<&Object> {
        self.objects.get(&key)
    }

    /// Get an object, failing if it does not exist.
    pub fn get_object(&self, key: ObjKey) -> Result<&Object> {
        self.objects.get(&key).ok_or(Error::ObjectNotFound {
            table: self.key,
            key,
        })
    }

    /// Read one column of one object.
    pub fn get(&self, key: ObjKey, col: ColKey) -> Result<&Value> {
        self.column_spec(col)?;
        Ok(self.get_object(key)?.get(col))
    }

    pub fn is_null(&self, key: ObjKey, col: ColKey) -> Result<bool> {
        Ok(self.get(key, col)?.is_null())
    }

    /// All object keys in storage order.
    pub fn keys(&self) -> impl Iterator<Item = ObjKey> + '_ {
        self.objects.keys().copied()
    }

    /// All objects in storage order.
    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    /// One key per distinct value of an indexed column, in value order.
    ///
    /// The smallest key holding each value represents it.
    pub fn distinct_keys(&self, col: ColKey) -> Result<Vec<ObjKey>> {
        self.column_spec(col)?;
        let index = self.indexes.get(&col).ok_or(Error::MissingSearchIndex(col))?;
        Ok(index
            .values()
            .filter_map(|keys| keys.iter().next().copied())
            .collect())
    }

    /// Whether backlink metadata exists for links from `origin_table.origin_column`.
    pub fn has_backlink_column(&self, origin_table: TableKey, origin_column: ColKey) -> bool {
        self.backlinks.contains_key(&BacklinkColumn {
            origin_table,
            origin_column,
        })
    }

    /// Keys of the origin objects linking to `target` through the given column.
    ///
    /// Returns `None` when no such backlink column is registered.
    pub fn backlinks(
        &self,
        origin_table: TableKey,
        origin_column: ColKey,
        target: ObjKey,
    ) -> Option<Vec<ObjKey>> {
        let column = self.backlinks.get(&BacklinkColumn {
            origin_table,
            origin_column,
        })?;
        Some(column.get(&target).cloned().unwrap_or_default())
    }

    /// Every (origin column, origin key) linking to `target`.
    pub(crate) fn all_backlinks(&self, target: ObjKey) -> Vec<(BacklinkColumn, ObjKey)> {
        let mut result = Vec::new();
        for (column, entries) in &self.backlinks {
            if let Some(origins) = entries.get(&target) {
                result.extend(origins.iter().map(|origin| (*column, *origin)));
            }
        }
        result.sort_by_key(|(c, k)| (c.origin_table, c.origin_column, *k));
        result.dedup();
        result
    }

    pub(crate) fn backlink_columns(&self) -> impl Iterator<Item = &BacklinkColumn> {
        self.backlinks.keys()
    }

    // Rendering, used by view dumps

    /// Render one object as a JSON object keyed by column name.
    pub fn row_to_json(&self, key: ObjKey) -> Result<serde_json::Value> {
        let object = self.get_object(key)?;
        let mut map = serde_json::Map::new();
        map.insert("_key".to_string(), serde_json::Value::from(key.0));
        for (spec, value) in self.schema.columns.iter().zip(object.values()) {
            map.insert(spec.name.clone(), value.to_json());
        }
        Ok(serde_json::Value::Object(map))
    }

    /// Render one object's cells as display strings, in column order.
    pub fn row_cells(&self, key: ObjKey) -> Result<Vec<String>> {
        Ok(self
            .get_object(key)?
            .values()
            .iter()
            .map(|v| v.to_string())
            .collect())
    }

    // Mutation, driven by the group

    pub(crate) fn set_version(&mut self, version: Version) {
        self.content_version = version;
    }

    pub(crate) fn insert(&mut self, values: Vec<Value>) -> ObjKey {
        let key = ObjKey(self.next_key);
        self.next_key += 1;
        for (col, index) in self.indexes.iter_mut() {
            let value = values.get(col.0).cloned().unwrap_or(Value::Null);
            index.entry(value).or_default().insert(key);
        }
        self.objects.insert(key, Object::new(key, values));
        key
    }

    pub(crate) fn remove(&mut self, key: ObjKey) -> Option<Object> {
        let object = self.objects.remove(&key)?;
        for (col, index) in self.indexes.iter_mut() {
            index_remove(index, object.get(*col), key);
        }
        for column in self.backlinks.values_mut() {
            column.remove(&key);
        }
        Some(object)
    }

    /// Overwrite a value, keeping the search index current. Returns the old value.
    pub(crate) fn set_value(&mut self, key: ObjKey, col: ColKey, value: Value) -> Result<Value> {
        let table = self.key;
        let object = self
            .objects
            .get_mut(&key)
            .ok_or(Error::ObjectNotFound { table, key })?;
        if let Some(index) = self.indexes.get_mut(&col) {
            index_remove(index, object.get(col), key);
            index.entry(value.clone()).or_default().insert(key);
        }
        Ok(object.set(col, value))
    }

    pub(crate) fn object_mut(&mut self, key: ObjKey) -> Option<&mut Object> {
        self.objects.get_mut(&key)
    }

    pub(crate) fn register_backlink_column(
        &mut self,
        origin_table: TableKey,
        origin_column: ColKey,
    ) {
        self.backlinks
            .entry(BacklinkColumn {
                origin_table,
                origin_column,
            })
            .or_default();
    }

    pub(crate) fn unregister_backlinks_from(&mut self, origin_table: TableKey) {
        self.backlinks.retain(|c, _| c.origin_table != origin_table);
    }

    pub(crate) fn add_backlink(&mut self, column: BacklinkColumn, target: ObjKey, origin: ObjKey) {
        self.backlinks
            .entry(column)
            .or_default()
            .entry(target)
            .or_default()
            .push(origin);
    }

    /// Remove one occurrence of `origin` from `target`'s backlinks.
    pub(crate) fn remove_backlink(
        &mut self,
        column: BacklinkColumn,
        target: ObjKey,
        origin: ObjKey,
    ) {
        if let Some(entries) = self.backlinks.get_mut(&column) {
            if let Some(origins) = entries.get_mut(&target) {
                if let Some(pos) = origins.iter().position(|k| *k == origin) {
                    origins.remove(pos);
                }
                if origins.is_empty() {
                    entries.remove(&target);
                }
            }
        }
    }
}

fn index_remove(index: &mut BTreeMap<Value, BTreeSet<ObjKey>>, value: &Value, key: ObjKey) {
    if let Some(keys) = index.get_mut(value) {
        keys.remove(&key);
        if keys.is_empty() {
            index.remove(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Table {
        Table::new(
            TableKey(0),
            TableSchema::new(
                "people",
                vec![
                    ColumnSpec::required("name", DataType::String).with_index(),
                    ColumnSpec::nullable("age", DataType::Int),
                ],
            ),
            0,
        )
    }

    #[test]
    fn insert_assigns_increasing_keys() {
        let mut table = people();
        let a = table.insert(vec![Value::from("Ann"), Value::Int(30)]);
        let b = table.insert(vec![Value::from("Bob"), Value::Null]);

        assert!(a < b);
        assert_eq!(table.len(), 2);
        assert_eq!(table.keys().collect::<Vec<_>>(), vec![a, b]);
        assert!(table.is_null(b, ColKey(1)).unwrap());
    }

    #[test]
    fn keys_are_not_reused() {
        let mut table = people();
        let a = table.insert(vec![Value::from("Ann"), Value::Null]);
        table.remove(a);
        let b = table.insert(vec![Value::from("Bob"), Value::Null]);
        assert_ne!(a, b);
        assert!(!table.is_valid(a));
    }

    #[test]
    fn distinct_keys_follow_index() {
        let mut table = people();
        let ann = table.insert(vec![Value::from("Ann"), Value::Null]);
        let bob = table.insert(vec![Value::from("Bob"), Value::Null]);
        let _ann2 = table.insert(vec![Value::from("Ann"), Value::Null]);

        assert_eq!(table.distinct_keys(ColKey(0)).unwrap(), vec![ann, bob]);

        table.set_value(ann, ColKey(0), Value::from("Cid")).unwrap();
        assert_eq!(table.distinct_keys(ColKey(0)).unwrap().len(), 3);
    }

    #[test]
    fn distinct_requires_index() {
        let table = people();
        assert!(matches!(
            table.distinct_keys(ColKey(1)),
            Err(Error::MissingSearchIndex(ColKey(1)))
        ));
    }

    #[test]
    fn backlink_bookkeeping() {
        let mut table = people();
        let target = table.insert(vec![Value::from("Ann"), Value::Null]);
        let column = BacklinkColumn {
            origin_table: TableKey(1),
            origin_column: ColKey(2),
        };

        assert_eq!(table.backlinks(TableKey(1), ColKey(2), target), None);

        table.register_backlink_column(TableKey(1), ColKey(2));
        assert_eq!(table.backlinks(TableKey(1), ColKey(2), target), Some(vec![]));

        table.add_backlink(column, target, ObjKey(7));
        table.add_backlink(column, target, ObjKey(3));
        assert_eq!(
            table.backlinks(TableKey(1), ColKey(2), target),
            Some(vec![ObjKey(7), ObjKey(3)])
        );

        table.remove_backlink(column, target, ObjKey(7));
        assert_eq!(
            table.backlinks(TableKey(1), ColKey(2), target),
            Some(vec![ObjKey(3)])
        );
    }

    #[test]
    fn row_to_json_uses_column_names() {
        let mut table = people();
        let key = table.insert(vec![Value::from("Ann"), Value::Int(30)]);
        let json = table.row_to_json(key).unwrap();
        assert_eq!(json, serde_json::json!({"_key": 0, "name": "Ann", "age": 30}));
    }
}
