//! # Vista Engine
//!
//! Consistent, re-syncable views over an embedded object store, and handover
//! of those views between transaction contexts.
//!
//! This crate provides the view layer of an in-memory object database: row
//! sets derived from queries, link lists, search indexes and backlinks, kept
//! in step with the tables they were derived from, sorted and deduplicated on
//! demand, and transferable from one snapshot of the database to another.
//!
//! ## Design Principles
//!
//! - **No IO**: Engine has no knowledge of files, network, or platform
//! - **No live references**: Views hold keys; every operation takes the [`Group`] it runs against
//! - **Explicit staleness**: A view knows when it is out of date and rebuilds only then
//! - **Deterministic**: Sorting and distinct are pure functions of the rows and table data
//!
//! ## Core Concepts
//!
//! ### Groups and Tables
//!
//! A [`Group`] is one transaction context: a set of [`Table`]s plus a version
//! clock. Every mutation stamps the tables it touched with a fresh version.
//! Cloning a group yields an independent snapshot of the same database.
//!
//! ### Views
//!
//! A [`View`] is an ordered list of object keys in one table, built from one of
//! four sources (its [`Provenance`]):
//! - a [`Query`], optionally restricted to another view or a link list
//! - a [`LinkList`]
//! - the search index of a column (one row per distinct value)
//! - the backlinks of one object
//!
//! Deleting an object detaches the entries referring to it without renumbering
//! the rest. [`View::sync_if_needed`] rebuilds a stale view.
//!
//! ### Ordering
//!
//! [`DescriptorOrdering`] stacks stable sorts and last-occurrence-wins distinct
//! steps, applied in the order they were added.
//!
//! ### Handover
//!
//! [`View::export_for_handover`] and [`View::move_for_handover`] reduce a view
//! to a [`HandoverPatch`] holding identities only. [`View::import_patch`]
//! resolves it against another group.
//!
//! ## Quick Start
//!
//! ```rust
//! use vista_engine::{ColKey, ColumnSpec, DataType, Group, PayloadMode, TableSchema, Value, View};
//!
//! // 1. Define a table
//! let mut group = Group::new();
//! let people = group
//!     .add_table(TableSchema::new(
//!         "people",
//!         vec![
//!             ColumnSpec::required("name", DataType::String),
//!             ColumnSpec::nullable("age", DataType::Int),
//!         ],
//!     ))
//!     .unwrap();
//!
//! // 2. Add objects
//! for (name, age) in [("Ann", Some(31i64)), ("Bob", None), ("Cid", Some(27))] {
//!     group
//!         .create_object_with(people, vec![Value::from(name), Value::from(age)])
//!         .unwrap();
//! }
//!
//! // 3. Build a sorted view
//! let mut view = View::from_table(&group, people).unwrap();
//! view.sort(&group, ColKey(1), false).unwrap();
//! assert_eq!(view.size(), 3);
//! assert_eq!(view.average_int(&group, ColKey(1)).unwrap().value, 29.0);
//!
//! // 4. Hand it over to another snapshot
//! let snapshot = group.clone();
//! let patch = view.export_for_handover(&group, PayloadMode::Copy).unwrap();
//! let imported = View::import_patch(patch, &snapshot).unwrap();
//! assert!(imported.is_in_sync(&snapshot));
//! ```
//!
//! ## Logging
//!
//! The engine emits `tracing` events (view rebuilds, handover, group
//! mutations) and never installs a subscriber.

pub mod aggregate;
pub mod descriptor;
pub mod dump;
pub mod error;
pub mod group;
pub mod handover;
pub mod keys;
pub mod link_list;
pub mod object;
pub mod query;
pub mod schema;
pub mod search;
pub mod table;
pub mod value;
pub mod version;
pub mod view;

// Re-export main types at crate root
pub use aggregate::{Aggregatable, Average, Earlier, Fold, Later, TimestampOrder};
pub use descriptor::{
    Descriptor, DescriptorOrdering, DescriptorOrderingPatch, DistinctDescriptor, SortDescriptor,
};
pub use dump::DEFAULT_TEXT_ROW_LIMIT;
pub use error::Error;
pub use group::Group;
pub use handover::{HandoverPatch, PayloadMode, SourcePatch, PATCH_FORMAT_VERSION};
pub use keys::{ColKey, ObjKey, TableKey};
pub use link_list::{LinkList, LinkListPatch};
pub use object::Object;
pub use query::{Condition, Operator, Query, QueryPatch, Restriction, RestrictionPatch};
pub use schema::{ColumnSpec, TableSchema};
pub use table::{BacklinkColumn, Table};
pub use value::{DataType, Timestamp, Value};
pub use version::{Version, VersionClock, DELETED_DEPENDENCY};
pub use view::{Provenance, View};
