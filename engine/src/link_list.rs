//! Link lists as view sources.
//!
//! A [`LinkList`] names one link list column of one object. It resolves its
//! current elements against a group on demand, so a view built from it can be
//! resynced after the list changes and can be handed over to another group.

use crate::{error::Result, ColKey, DataType, Error, Group, ObjKey, TableKey, Value, Version};
use serde::{Deserialize, Serialize};

/// Handle to the link list stored in `origin_table[origin_key].column`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkList {
    origin_table: TableKey,
    origin_key: ObjKey,
    column: ColKey,
    target_table: TableKey,
}

/// Context-free form of a [`LinkList`] carried inside a handover patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkListPatch {
    pub origin_table: TableKey,
    pub origin_key: ObjKey,
    pub column: ColKey,
}

impl LinkList {
    /// Resolve a link list column of an existing object.
    pub fn new(group: &Group, table: TableKey, key: ObjKey, column: ColKey) -> Result<Self> {
        let origin = group.get_table(table)?;
        origin.get_object(key)?;
        Self::resolve(group, table, key, column)
    }

    fn resolve(group: &Group, table: TableKey, key: ObjKey, column: ColKey) -> Result<Self> {
        let spec = group.get_table(table)?.column_spec(column)?;
        if spec.data_type != DataType::LinkList {
            return Err(Error::type_mismatch(&spec.name, DataType::LinkList, spec.data_type));
        }
        let target_table = spec
            .link_target
            .ok_or_else(|| Error::ColumnNotFound(format!("link target of '{}'", spec.name)))?;
        Ok(Self {
            origin_table: table,
            origin_key: key,
            column,
            target_table,
        })
    }

    pub fn origin_table(&self) -> TableKey {
        self.origin_table
    }

    pub fn origin_key(&self) -> ObjKey {
        self.origin_key
    }

    pub fn column(&self) -> ColKey {
        self.column
    }

    /// Table the links point into; a view over this list lives there.
    pub fn target_table(&self) -> TableKey {
        self.target_table
    }

    /// A list is valid while its owning object exists.
    pub fn is_valid(&self, group: &Group) -> bool {
        group
            .table(self.origin_table)
            .is_some_and(|t| t.is_valid(self.origin_key))
    }

    /// Version of the table owning the list, or `None` if the list is gone.
    pub fn content_version(&self, group: &Group) -> Option<Version> {
        if !self.is_valid(group) {
            return None;
        }
        group.table(self.origin_table).map(|t| t.content_version())
    }

    /// Current elements of the list; empty if the list is gone.
    pub fn keys(&self, group: &Group) -> Vec<ObjKey> {
        let value = group
            .table(self.origin_table)
            .and_then(|t| t.object(self.origin_key))
            .map(|o| o.get(self.column));
        match value {
            Some(Value::LinkList(keys)) => keys.clone(),
            _ => Vec::new(),
        }
    }

    pub fn len(&self, group: &Group) -> usize {
        self.keys(group).len()
    }

    pub fn is_empty(&self, group: &Group) -> bool {
        self.len(group) == 0
    }

    pub fn generate_patch(&self) -> LinkListPatch {
        LinkListPatch {
            origin_table: self.origin_table,
            origin_key: self.origin_key,
            column: self.column,
        }
    }

    /// Rebuild a handle in another group.
    ///
    /// The owning table and column must exist there; the owning object may
    /// already be gone, in which case the handle is simply invalid.
    pub fn from_patch(patch: LinkListPatch, group: &Group) -> Result<Self> {
        Self::resolve(group, patch.origin_table, patch.origin_key, patch.column).map_err(|e| {
            Error::HandoverResolution(format!(
                "link list {}.{}: {}",
                patch.origin_table, patch.column, e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColumnSpec, TableSchema};

    fn setup() -> (Group, TableKey, TableKey, ObjKey, Vec<ObjKey>) {
        let mut group = Group::new();
        let items = group
            .add_table(TableSchema::new(
                "items",
                vec![ColumnSpec::required("n", DataType::Int)],
            ))
            .unwrap();
        let lists = group
            .add_table(TableSchema::new(
                "lists",
                vec![ColumnSpec::link_list("items", items)],
            ))
            .unwrap();
        let keys: Vec<_> = (0..3)
            .map(|n| group.create_object_with(items, vec![Value::Int(n)]).unwrap())
            .collect();
        let list = group
            .create_object_with(lists, vec![Value::LinkList(vec![keys[2], keys[0]])])
            .unwrap();
        (group, items, lists, list, keys)
    }

    #[test]
    fn enumerates_current_elements() {
        let (mut group, items, lists, list, keys) = setup();
        let ll = LinkList::new(&group, lists, list, ColKey(0)).unwrap();

        assert_eq!(ll.target_table(), items);
        assert_eq!(ll.keys(&group), vec![keys[2], keys[0]]);

        group.add_link(lists, list, ColKey(0), keys[1]).unwrap();
        assert_eq!(ll.keys(&group), vec![keys[2], keys[0], keys[1]]);
        assert_eq!(ll.len(&group), 3);
    }

    #[test]
    fn invalid_after_owner_deleted() {
        let (mut group, _, lists, list, _) = setup();
        let ll = LinkList::new(&group, lists, list, ColKey(0)).unwrap();
        assert!(ll.content_version(&group).is_some());

        group.remove_object(lists, list).unwrap();
        assert!(!ll.is_valid(&group));
        assert!(ll.is_empty(&group));
        assert_eq!(ll.content_version(&group), None);
    }

    #[test]
    fn rejects_non_list_column() {
        let (group, items, _, _, keys) = setup();
        let result = LinkList::new(&group, items, keys[0], ColKey(0));
        assert!(matches!(result, Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn patch_resolution() {
        let (group, _, lists, list, _) = setup();
        let ll = LinkList::new(&group, lists, list, ColKey(0)).unwrap();

        let rebuilt = LinkList::from_patch(ll.generate_patch(), &group.clone()).unwrap();
        assert_eq!(rebuilt, ll);

        let bad = LinkListPatch {
            origin_table: TableKey(40),
            origin_key: list,
            column: ColKey(0),
        };
        assert!(matches!(
            LinkList::from_patch(bad, &group),
            Err(Error::HandoverResolution(_))
        ));
    }
}
