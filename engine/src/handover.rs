//! Handover of views between groups.
//!
//! A view cannot leave its group as-is: its provenance refers to tables,
//! objects and link lists by key, and those keys only mean something relative
//! to a group. Export turns a view into a [`HandoverPatch`], a plain serde
//! value holding identities only, and import resolves that patch against
//! another group (typically a snapshot of the same database in another
//! thread).
//!
//! Three export modes exist:
//!
//! - [`PayloadMode::Copy`] transfers the rows and leaves the source untouched;
//! - [`PayloadMode::Stay`] transfers no rows, the importer rebuilds on first sync;
//! - [`View::move_for_handover`] takes the rows out of the source, which is
//!   left empty and out of sync until its next sync.
//!
//! A patch is consumed by import and cannot be imported twice.

use crate::descriptor::DescriptorOrderingPatch;
use crate::view::{Provenance, RowSet};
use crate::{
    error::Result, ColKey, DescriptorOrdering, Error, Group, LinkList, LinkListPatch, ObjKey,
    Query, QueryPatch, TableKey, View, DELETED_DEPENDENCY,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Version of the patch format for future compatibility.
pub const PATCH_FORMAT_VERSION: u32 = 1;

/// How much of a view's state an export carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PayloadMode {
    /// Send the rows; the source keeps its own.
    Copy,
    /// Send no rows; the imported view starts out of sync.
    Stay,
}

/// Context-free form of a view's [`Provenance`].
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SourcePatch {
    Query {
        query: QueryPatch,
        start: usize,
        end: Option<usize>,
        limit: Option<usize>,
    },
    LinkList {
        link_list: LinkListPatch,
    },
    DistinctColumn {
        column: ColKey,
    },
    Backlink {
        source_column: ColKey,
        linked_table: TableKey,
        linked_object: ObjKey,
    },
}

/// A view reduced to identities, ready to be imported into another group.
///
/// Not `Clone`: a patch is imported at most once.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoverPatch {
    /// Patch format version
    pub format_version: u32,
    /// Table the view's rows live in
    pub table: TableKey,
    /// Where the rows come from
    pub source: SourcePatch,
    /// Sort and distinct steps
    pub descriptors: DescriptorOrderingPatch,
    /// Transferred rows; `None` when exported with [`PayloadMode::Stay`]
    pub rows: Option<Vec<ObjKey>>,
    /// Whether the rows were current at export
    pub was_in_sync: bool,
}

impl HandoverPatch {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidPatch(e.to_string()))
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidPatch(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let patch: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidPatch(e.to_string()))?;
        patch.check_format()?;
        Ok(patch)
    }

    fn check_format(&self) -> Result<()> {
        if self.format_version > PATCH_FORMAT_VERSION {
            return Err(Error::InvalidPatch(format!(
                "unsupported patch format version: {} (max supported: {})",
                self.format_version, PATCH_FORMAT_VERSION
            )));
        }
        Ok(())
    }
}

impl View {
    /// Export without disturbing this view.
    pub fn export_for_handover(&self, group: &Group, mode: PayloadMode) -> Result<HandoverPatch> {
        let source = self.source_patch(group, mode)?;
        let (rows, was_in_sync) = match mode {
            PayloadMode::Copy => (Some(self.keys().to_vec()), self.is_in_sync(group)),
            PayloadMode::Stay => (None, false),
        };

        debug!(
            table = %self.table,
            provenance = self.provenance.kind(),
            ?mode,
            rows = rows.as_ref().map(Vec::len),
            was_in_sync,
            "exported view"
        );
        Ok(HandoverPatch {
            format_version: PATCH_FORMAT_VERSION,
            table: self.table,
            source,
            descriptors: self.ordering.generate_patch(),
            rows,
            was_in_sync,
        })
    }

    /// Export, taking the rows with the patch.
    ///
    /// This view is left empty with no watermark; it rebuilds on its next sync.
    /// A restricting view inside its query is copied, not moved.
    pub fn move_for_handover(&mut self, group: &Group) -> Result<HandoverPatch> {
        let source = self.source_patch(group, PayloadMode::Copy)?;
        let was_in_sync = self.is_in_sync(group);
        let rows = match std::mem::replace(&mut self.rows, RowSet::Placeholder) {
            RowSet::Ready(keys) => keys,
            RowSet::Placeholder => Vec::new(),
        };
        self.last_seen_version = None;

        debug!(
            table = %self.table,
            provenance = self.provenance.kind(),
            rows = rows.len(),
            was_in_sync,
            "moved view"
        );
        Ok(HandoverPatch {
            format_version: PATCH_FORMAT_VERSION,
            table: self.table,
            source,
            descriptors: self.ordering.generate_patch(),
            rows: Some(rows),
            was_in_sync,
        })
    }

    fn source_patch(&self, group: &Group, mode: PayloadMode) -> Result<SourcePatch> {
        Ok(match &self.provenance {
            Provenance::Query {
                query,
                start,
                end,
                limit,
            } => SourcePatch::Query {
                query: query.generate_patch(group, mode)?,
                start: *start,
                end: *end,
                limit: *limit,
            },
            Provenance::LinkListSnapshot { link_list } => SourcePatch::LinkList {
                link_list: link_list.generate_patch(),
            },
            Provenance::DistinctColumnScan { column } => {
                SourcePatch::DistinctColumn { column: *column }
            }
            Provenance::BacklinkScan {
                source_column,
                linked_table,
                linked_object,
            } => SourcePatch::Backlink {
                source_column: *source_column,
                linked_table: *linked_table,
                linked_object: *linked_object,
            },
        })
    }

    /// Rebuild a view from `patch` in `group`.
    ///
    /// Rows carried by the patch are taken as they are. If they were current at
    /// export, the view starts in sync with `group`; otherwise it rebuilds on
    /// its first sync.
    pub fn import_patch(patch: HandoverPatch, group: &Group) -> Result<View> {
        let table = patch.table;
        let result = Self::resolve_patch(patch, group);
        if let Err(e) = &result {
            warn!(table = %table, error = %e, "view handover failed");
        }
        result
    }

    /// Import the patch held in `slot`, leaving the slot empty.
    pub fn apply_and_consume_patch(
        slot: &mut Option<HandoverPatch>,
        group: &Group,
    ) -> Result<View> {
        let patch = slot.take().ok_or(Error::PatchConsumed)?;
        Self::import_patch(patch, group)
    }

    fn resolve_patch(patch: HandoverPatch, group: &Group) -> Result<View> {
        patch.check_format()?;
        let resolution =
            |what: String| move |e: Error| Error::HandoverResolution(format!("{what}: {e}"));

        let table = group
            .get_table(patch.table)
            .map_err(resolution(format!("view table {}", patch.table)))?;

        let provenance = match patch.source {
            SourcePatch::Query {
                query,
                start,
                end,
                limit,
            } => Provenance::Query {
                query: Query::from_patch(query, group)?,
                start,
                end,
                limit,
            },
            SourcePatch::LinkList { link_list } => Provenance::LinkListSnapshot {
                link_list: LinkList::from_patch(link_list, group)?,
            },
            SourcePatch::DistinctColumn { column } => {
                table
                    .column_spec(column)
                    .map_err(resolution(format!("distinct column of '{}'", table.name())))?;
                Provenance::DistinctColumnScan { column }
            }
            SourcePatch::Backlink {
                source_column,
                linked_table,
                linked_object,
            } => {
                table
                    .column_spec(source_column)
                    .map_err(resolution(format!("backlink column of '{}'", table.name())))?;
                group
                    .get_table(linked_table)
                    .map_err(resolution("linked table".to_string()))?;
                Provenance::BacklinkScan {
                    source_column,
                    linked_table,
                    linked_object,
                }
            }
        };

        let mut view = View::build(patch.table, provenance);
        view.ordering = DescriptorOrdering::from_patch(patch.descriptors, table)?;
        if let Some(rows) = patch.rows {
            view.rows = RowSet::Ready(rows);
            // a dependency missing in the importer makes the rows stale
            let version = view.outside_version(group);
            if patch.was_in_sync && version != DELETED_DEPENDENCY {
                view.last_seen_version = Some(version);
            }
        }

        debug!(
            table = %view.table,
            provenance = view.provenance.kind(),
            rows = view.size(),
            in_sync = view.last_seen_version.is_some(),
            "imported view"
        );
        Ok(view)
    }
}
