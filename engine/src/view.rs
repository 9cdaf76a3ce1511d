//! Views - derived, re-syncable row sets.
//!
//! A [`View`] is an ordered list of object keys in one table plus a record of
//! where those keys came from (its [`Provenance`]) and the sort/distinct steps
//! applied on top. It never holds references into a [`Group`]: every operation
//! takes the group it should be resolved against.
//!
//! Staleness is tracked with a version watermark. A view remembers the
//! version of whatever it depends on at its last rebuild and compares it with
//! [`View::outside_version`] to decide whether a rebuild is due. Deleting an
//! object the view lists does not renumber anything: the entry stays, detached,
//! until the next rebuild.

use crate::{
    error::Result, ColKey, DataType, DescriptorOrdering, DistinctDescriptor, Error, Group,
    LinkList, ObjKey, Object, Query, Restriction, SortDescriptor, Table, TableKey, Version,
    DELETED_DEPENDENCY,
};
use std::collections::BTreeSet;
use tracing::debug;

/// Where a view's raw rows come from.
#[derive(Debug, Clone, PartialEq)]
pub enum Provenance {
    /// Matches of a query, limited to candidate positions `start..end` and to
    /// at most `limit` rows.
    Query {
        query: Query,
        start: usize,
        end: Option<usize>,
        limit: Option<usize>,
    },
    /// The elements of a link list.
    LinkListSnapshot { link_list: LinkList },
    /// One row per distinct value of an indexed column.
    DistinctColumnScan { column: ColKey },
    /// The objects whose `source_column` links to `linked_object`.
    BacklinkScan {
        source_column: ColKey,
        linked_table: TableKey,
        linked_object: ObjKey,
    },
}

impl Provenance {
    /// Short name used in errors and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Provenance::Query { .. } => "query",
            Provenance::LinkListSnapshot { .. } => "link list",
            Provenance::DistinctColumnScan { .. } => "distinct",
            Provenance::BacklinkScan { .. } => "backlink",
        }
    }
}

/// Row storage of a view.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RowSet {
    Ready(Vec<ObjKey>),
    /// Rows were moved out by a handover; the next sync rebuilds them.
    Placeholder,
}

impl RowSet {
    fn as_slice(&self) -> &[ObjKey] {
        match self {
            RowSet::Ready(keys) => keys,
            RowSet::Placeholder => &[],
        }
    }
}

/// An ordered, re-syncable set of rows from one table.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub(crate) table: TableKey,
    pub(crate) rows: RowSet,
    pub(crate) provenance: Provenance,
    pub(crate) ordering: DescriptorOrdering,
    pub(crate) last_seen_version: Option<Version>,
}

fn attached_table(group: &Group, table: TableKey) -> Result<&Table> {
    group.table(table).ok_or(Error::ViewDetached(table))
}

impl View {
    pub(crate) fn build(table: TableKey, provenance: Provenance) -> Self {
        Self {
            table,
            rows: RowSet::Placeholder,
            provenance,
            ordering: DescriptorOrdering::new(),
            last_seen_version: None,
        }
    }

    // Construction

    /// Rows of `query` within candidate positions `start..end`, at most `limit` of them.
    pub fn from_query(
        group: &Group,
        query: Query,
        start: usize,
        end: Option<usize>,
        limit: Option<usize>,
    ) -> Result<Self> {
        let table = query.table();
        group.get_table(table)?;
        let mut view = Self::build(
            table,
            Provenance::Query {
                query,
                start,
                end,
                limit,
            },
        );
        view.do_sync(group)?;
        Ok(view)
    }

    /// Every row of a table, in storage order.
    pub fn from_table(group: &Group, table: TableKey) -> Result<Self> {
        Self::from_query(group, Query::new(table), 0, None, None)
    }

    /// The elements of a link list, in list order.
    pub fn from_link_list(group: &Group, link_list: LinkList) -> Result<Self> {
        let mut view = Self::build(
            link_list.target_table(),
            Provenance::LinkListSnapshot { link_list },
        );
        view.do_sync(group)?;
        Ok(view)
    }

    /// One row per distinct value of an indexed column.
    pub fn distinct_view(group: &Group, table: TableKey, column: ColKey) -> Result<Self> {
        let mut view = Self::build(table, Provenance::DistinctColumnScan { column });
        view.do_sync(group)?;
        Ok(view)
    }

    /// Rows of `origin_table` whose `source_column` links to `linked_object`.
    pub fn backlink_view(
        group: &Group,
        origin_table: TableKey,
        source_column: ColKey,
        linked_object: ObjKey,
    ) -> Result<Self> {
        let spec = group.get_table(origin_table)?.column_spec(source_column)?;
        let linked_table = spec
            .link_target
            .ok_or_else(|| Error::type_mismatch(&spec.name, DataType::Link, spec.data_type))?;
        group.get_table(linked_table)?.get_object(linked_object)?;

        let mut view = Self::build(
            origin_table,
            Provenance::BacklinkScan {
                source_column,
                linked_table,
                linked_object,
            },
        );
        view.do_sync(group)?;
        Ok(view)
    }

    // Accessors

    pub fn table_key(&self) -> TableKey {
        self.table
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn descriptor_ordering(&self) -> &DescriptorOrdering {
        &self.ordering
    }

    /// Watermark recorded at the last rebuild.
    pub fn last_seen_version(&self) -> Option<Version> {
        self.last_seen_version
    }

    /// The query this view was built from.
    pub fn query(&self) -> Result<&Query> {
        match &self.provenance {
            Provenance::Query { query, .. } => Ok(query),
            other => Err(Error::UnsupportedProvenance {
                operation: "query",
                provenance: other.kind(),
            }),
        }
    }

    /// The link list this view was built from.
    pub fn link_list(&self) -> Result<&LinkList> {
        match &self.provenance {
            Provenance::LinkListSnapshot { link_list } => Ok(link_list),
            other => Err(Error::UnsupportedProvenance {
                operation: "link_list",
                provenance: other.kind(),
            }),
        }
    }

    // Row access

    /// Number of entries, detached ones included.
    pub fn size(&self) -> usize {
        self.rows.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Whether the view's table still exists in `group`.
    pub fn is_attached(&self, group: &Group) -> bool {
        group.table(self.table).is_some()
    }

    pub fn keys(&self) -> &[ObjKey] {
        self.rows.as_slice()
    }

    pub fn key(&self, index: usize) -> Result<ObjKey> {
        self.keys()
            .get(index)
            .copied()
            .ok_or(Error::IndexOutOfRange {
                index,
                size: self.size(),
            })
    }

    /// Position of the first entry referring to `key`.
    pub fn find_by_source_key(&self, key: ObjKey) -> Option<usize> {
        self.keys().iter().position(|k| *k == key)
    }

    /// Whether entry `index` still refers to a live object.
    pub fn is_row_attached(&self, group: &Group, index: usize) -> Result<bool> {
        let key = self.key(index)?;
        Ok(group.table(self.table).is_some_and(|t| t.is_valid(key)))
    }

    pub fn num_attached_rows(&self, group: &Group) -> usize {
        match group.table(self.table) {
            Some(table) => self.keys().iter().filter(|k| table.is_valid(**k)).count(),
            None => 0,
        }
    }

    pub fn num_detached_rows(&self, group: &Group) -> usize {
        self.size() - self.num_attached_rows(group)
    }

    /// The object behind entry `index`.
    pub fn get<'g>(&self, group: &'g Group, index: usize) -> Result<&'g Object> {
        let table = attached_table(group, self.table)?;
        let key = self.key(index)?;
        table
            .object(key)
            .ok_or(Error::RowDetached { index, key })
    }

    pub fn front<'g>(&self, group: &'g Group) -> Result<&'g Object> {
        self.get(group, 0)
    }

    pub fn back<'g>(&self, group: &'g Group) -> Result<&'g Object> {
        self.get(group, self.size().saturating_sub(1))
    }

    // Removal

    /// Delete the object behind entry `index` and drop the entry.
    ///
    /// A detached entry is dropped without touching the table.
    pub fn remove(&mut self, group: &mut Group, index: usize) -> Result<()> {
        attached_table(group, self.table)?;
        let key = self.key(index)?;
        let sync_to_keep = self.is_in_sync(group);

        if group.get_table(self.table)?.is_valid(key) {
            group.remove_object(self.table, key)?;
        }
        if let RowSet::Ready(keys) = &mut self.rows {
            keys.remove(index);
        }

        if sync_to_keep {
            self.mark_synced(group);
        }
        Ok(())
    }

    /// Remove the last entry, if any.
    pub fn remove_last(&mut self, group: &mut Group) -> Result<()> {
        match self.size() {
            0 => Ok(()),
            n => self.remove(group, n - 1),
        }
    }

    /// Delete every object the view refers to and empty it.
    pub fn clear(&mut self, group: &mut Group) -> Result<()> {
        attached_table(group, self.table)?;
        let sync_to_keep = self.is_in_sync(group);

        let mut seen = BTreeSet::new();
        let keys: Vec<ObjKey> = self
            .keys()
            .iter()
            .copied()
            .filter(|k| seen.insert(*k))
            .collect();
        for key in keys {
            if group.get_table(self.table)?.is_valid(key) {
                group.remove_object(self.table, key)?;
            }
        }
        self.rows = RowSet::Ready(Vec::new());

        if sync_to_keep {
            self.mark_synced(group);
        }
        Ok(())
    }

    /// Advance the watermark of this view and its restricting views without
    /// rebuilding. Only valid when the rows were current before our own change.
    fn mark_synced(&mut self, group: &Group) {
        if let Provenance::Query { query, .. } = &mut self.provenance {
            if let Some(view) = query.restricting_view_mut() {
                view.mark_synced(group);
            }
        }
        self.last_seen_version = Some(self.outside_version(group));
    }

    // Ordering

    /// Sort by one column, on top of any ordering already applied.
    pub fn sort(&mut self, group: &Group, column: ColKey, ascending: bool) -> Result<()> {
        self.sort_by(group, SortDescriptor::by(column, ascending))
    }

    pub fn sort_by(&mut self, group: &Group, sort: SortDescriptor) -> Result<()> {
        let mut ordering = self.ordering.clone();
        ordering.append_sort(sort);
        self.apply_descriptor_ordering(group, ordering)
    }

    /// Drop rows duplicating the value of `column` in a later row.
    pub fn distinct(&mut self, group: &Group, column: ColKey) -> Result<()> {
        self.distinct_by(group, DistinctDescriptor::by(column))
    }

    pub fn distinct_by(&mut self, group: &Group, distinct: DistinctDescriptor) -> Result<()> {
        let mut ordering = self.ordering.clone();
        ordering.append_distinct(distinct);
        self.apply_descriptor_ordering(group, ordering)
    }

    /// Replace the whole ordering and rebuild.
    pub fn apply_descriptor_ordering(
        &mut self,
        group: &Group,
        ordering: DescriptorOrdering,
    ) -> Result<()> {
        ordering.validate(attached_table(group, self.table)?)?;
        self.ordering = ordering;
        self.do_sync(group)?;
        Ok(())
    }

    /// True when rows are guaranteed to come in table storage order.
    pub fn is_in_table_order(&self) -> bool {
        match &self.provenance {
            Provenance::Query { query, .. } => {
                query.produces_results_in_table_order() && !self.ordering.will_apply_sort()
            }
            // index order is value order
            Provenance::DistinctColumnScan { .. } => false,
            Provenance::LinkListSnapshot { .. } | Provenance::BacklinkScan { .. } => false,
        }
    }

    // Synchronization

    /// Version of whatever this view depends on, or [`DELETED_DEPENDENCY`]
    /// when that is gone.
    pub fn outside_version(&self, group: &Group) -> Version {
        match &self.provenance {
            Provenance::LinkListSnapshot { link_list } => link_list_version(group, link_list),
            Provenance::BacklinkScan {
                linked_table,
                linked_object,
                ..
            } => match group.table(*linked_table) {
                Some(table) if table.is_valid(*linked_object) => table.content_version(),
                _ => DELETED_DEPENDENCY,
            },
            Provenance::Query { query, .. } => match query.restriction() {
                Some(Restriction::LinkList(list)) => link_list_version(group, list),
                Some(Restriction::View(view)) => view.outside_version(group),
                None => self.table_version(group),
            },
            Provenance::DistinctColumnScan { .. } => self.table_version(group),
        }
    }

    fn table_version(&self, group: &Group) -> Version {
        group
            .table(self.table)
            .map(|t| t.content_version())
            .unwrap_or(DELETED_DEPENDENCY)
    }

    /// Whether the rows reflect the current state of `group`.
    pub fn is_in_sync(&self, group: &Group) -> bool {
        if !self.is_attached(group) || self.last_seen_version != Some(self.outside_version(group))
        {
            return false;
        }
        match &self.provenance {
            Provenance::Query { query, .. } => match query.restriction() {
                Some(Restriction::View(view)) => view.is_in_sync(group),
                _ => true,
            },
            _ => true,
        }
    }

    /// Whether something this view depends on was deleted.
    pub fn depends_on_deleted_object(&self, group: &Group) -> bool {
        self.outside_version(group) == DELETED_DEPENDENCY
    }

    /// Rebuild if stale. Returns the watermark.
    pub fn sync_if_needed(&mut self, group: &Group) -> Result<Version> {
        match self.last_seen_version {
            Some(version) if self.is_in_sync(group) => Ok(version),
            _ => self.do_sync(group),
        }
    }

    pub(crate) fn do_sync(&mut self, group: &Group) -> Result<Version> {
        let table = attached_table(group, self.table)?;

        let mut keys = match &mut self.provenance {
            Provenance::LinkListSnapshot { link_list } => link_list.keys(group),
            Provenance::DistinctColumnScan { column } => table.distinct_keys(*column)?,
            Provenance::BacklinkScan {
                source_column,
                linked_table,
                linked_object,
            } => match group.table(*linked_table) {
                Some(linked) if linked.is_valid(*linked_object) => linked
                    .backlinks(self.table, *source_column, *linked_object)
                    .unwrap_or_default(),
                _ => Vec::new(),
            },
            Provenance::Query {
                query,
                start,
                end,
                limit,
            } => {
                if let Some(view) = query.restricting_view_mut() {
                    view.sync_if_needed(group)?;
                }
                query.populate(group, *start, *end, *limit)?
            }
        };

        self.ordering.apply(table, &mut keys)?;

        let version = self.outside_version(group);
        debug!(
            table = %self.table,
            provenance = self.provenance.kind(),
            rows = keys.len(),
            version,
            "synced view"
        );
        self.rows = RowSet::Ready(keys);
        self.last_seen_version = Some(version);
        Ok(version)
    }
}

fn link_list_version(group: &Group, list: &LinkList) -> Version {
    list.content_version(group).unwrap_or(DELETED_DEPENDENCY)
}
