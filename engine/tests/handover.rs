//! Handover tests for vista-engine
//!
//! Views exported in one group and imported into another, including across
//! threads and through the JSON form of a patch.

use std::sync::mpsc;
use std::thread;
use vista_engine::{
    ColKey, ColumnSpec, DataType, Error, Group, HandoverPatch, LinkList, ObjKey, PayloadMode,
    Query, TableKey, TableSchema, Value, View,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

struct Library {
    group: Group,
    books: TableKey,
    shelves: TableKey,
    shelf: ObjKey,
    books_by_year: Vec<ObjKey>,
}

// books(title indexed, year), shelves(books -> [books])
fn create_library() -> Library {
    let mut group = Group::new();
    let books = group
        .add_table(TableSchema::new(
            "books",
            vec![
                ColumnSpec::required("title", DataType::String).with_index(),
                ColumnSpec::nullable("year", DataType::Int),
            ],
        ))
        .unwrap();
    let shelves = group
        .add_table(TableSchema::new(
            "shelves",
            vec![ColumnSpec::link_list("books", books)],
        ))
        .unwrap();

    let mut keys = Vec::new();
    for (title, year) in [("Dune", 1965), ("Emma", 1815), ("Ubik", 1969), ("Kim", 1901)] {
        keys.push(
            group
                .create_object_with(books, vec![Value::from(title), Value::Int(year)])
                .unwrap(),
        );
    }
    let shelf = group
        .create_object_with(shelves, vec![Value::LinkList(vec![keys[2], keys[0], keys[3]])])
        .unwrap();

    let books_by_year = vec![keys[1], keys[3], keys[0], keys[2]];
    Library {
        group,
        books,
        shelves,
        shelf,
        books_by_year,
    }
}

fn sorted_by_year(lib: &Library) -> View {
    let mut view = View::from_table(&lib.group, lib.books).unwrap();
    view.sort(&lib.group, ColKey(1), true).unwrap();
    view
}

// ============================================================================
// Copy / Move / Stay
// ============================================================================

#[test]
fn copy_round_trip_matches_source() {
    init_tracing();
    let lib = create_library();
    let view = sorted_by_year(&lib);
    let other = lib.group.clone();

    let patch = view
        .export_for_handover(&lib.group, PayloadMode::Copy)
        .unwrap();
    let imported = View::import_patch(patch, &other).unwrap();

    assert_eq!(imported.keys(), lib.books_by_year.as_slice());
    assert_eq!(imported.is_in_sync(&other), view.is_in_sync(&lib.group));
    assert_eq!(view.keys(), lib.books_by_year.as_slice());
}

#[test]
fn move_leaves_usable_source() {
    let lib = create_library();
    let mut view = sorted_by_year(&lib);

    let patch = view.move_for_handover(&lib.group).unwrap();
    assert_eq!(view.size(), 0);
    assert_eq!(view.num_detached_rows(&lib.group), 0);
    assert!(!view.is_in_sync(&lib.group));

    let imported = View::import_patch(patch, &lib.group).unwrap();
    assert_eq!(imported.keys(), lib.books_by_year.as_slice());
    assert!(imported.is_in_sync(&lib.group));

    // the moved-from view resyncs from its query
    view.sync_if_needed(&lib.group).unwrap();
    assert_eq!(view.keys(), lib.books_by_year.as_slice());

    // moving twice hands over an empty, stale payload
    let mut twice = sorted_by_year(&lib);
    twice.move_for_handover(&lib.group).unwrap();
    let patch = twice.move_for_handover(&lib.group).unwrap();
    assert_eq!(patch.rows.as_deref(), Some(&[][..]));
    assert!(!patch.was_in_sync);
}

#[test]
fn stay_rebuilds_in_importer() {
    let mut lib = create_library();
    let view = sorted_by_year(&lib);
    let patch = view
        .export_for_handover(&lib.group, PayloadMode::Stay)
        .unwrap();

    // importer is ahead of the exporter
    let emma = lib.books_by_year[0];
    lib.group.remove_object(lib.books, emma).unwrap();

    let mut imported = View::import_patch(patch, &lib.group).unwrap();
    assert!(!imported.is_in_sync(&lib.group));
    imported.sync_if_needed(&lib.group).unwrap();
    assert_eq!(imported.keys(), &lib.books_by_year[1..]);
}

// ============================================================================
// Provenance kinds
// ============================================================================

#[test]
fn link_list_view_handover() {
    let lib = create_library();
    let list = LinkList::new(&lib.group, lib.shelves, lib.shelf, ColKey(0)).unwrap();
    let mut view = View::from_link_list(&lib.group, list).unwrap();
    view.sort(&lib.group, ColKey(0), true).unwrap();

    let mut other = lib.group.clone();
    let patch = view
        .export_for_handover(&lib.group, PayloadMode::Copy)
        .unwrap();
    let mut imported = View::import_patch(patch, &other).unwrap();
    assert_eq!(imported.keys(), view.keys());
    assert_eq!(imported.link_list().unwrap(), view.link_list().unwrap());

    other.remove_object(lib.shelves, lib.shelf).unwrap();
    assert!(imported.depends_on_deleted_object(&other));
    assert!(!view.depends_on_deleted_object(&lib.group));
    imported.sync_if_needed(&other).unwrap();
    assert!(imported.is_empty());
}

#[test]
fn restricted_query_handover() {
    let lib = create_library();
    let list = LinkList::new(&lib.group, lib.shelves, lib.shelf, ColKey(0)).unwrap();
    let query = Query::new(lib.books)
        .greater(ColKey(1), 1950i64)
        .restrict_to_link_list(list)
        .unwrap();
    let view = View::from_query(&lib.group, query, 0, None, None).unwrap();
    let inner = view.find_all_string(&lib.group, ColKey(0), "Ubik").unwrap();

    let patch = inner
        .export_for_handover(&lib.group, PayloadMode::Copy)
        .unwrap();
    let json = patch.to_json().unwrap();
    let imported =
        View::import_patch(HandoverPatch::from_json(&json).unwrap(), &lib.group).unwrap();

    assert_eq!(imported.keys(), inner.keys());
    assert!(imported.is_in_sync(&lib.group));
    assert_eq!(imported.size(), 1);
}

#[test]
fn resolution_failures_yield_no_view() {
    let lib = create_library();
    let view = View::distinct_view(&lib.group, lib.books, ColKey(0)).unwrap();

    let patch = view
        .export_for_handover(&lib.group, PayloadMode::Copy)
        .unwrap();
    let json = patch.to_json_pretty().unwrap();
    let result = View::import_patch(HandoverPatch::from_json(&json).unwrap(), &Group::new());
    assert!(matches!(result, Err(Error::HandoverResolution(_))));

    // same table key and column, but no search index
    let mut other = Group::new();
    other
        .add_table(TableSchema::new(
            "books",
            vec![ColumnSpec::required("title", DataType::String)],
        ))
        .unwrap();
    let patch = view
        .export_for_handover(&lib.group, PayloadMode::Stay)
        .unwrap();
    let mut imported = View::import_patch(patch, &other).unwrap();
    assert_eq!(
        imported.sync_if_needed(&other),
        Err(Error::MissingSearchIndex(ColKey(0)))
    );

    let list = LinkList::new(&lib.group, lib.shelves, lib.shelf, ColKey(0)).unwrap();
    let patch = View::from_link_list(&lib.group, list)
        .unwrap()
        .export_for_handover(&lib.group, PayloadMode::Copy)
        .unwrap();
    assert!(matches!(
        View::import_patch(patch, &other),
        Err(Error::HandoverResolution(_))
    ));
}

// ============================================================================
// Threads
// ============================================================================

#[test]
fn handover_across_threads() {
    init_tracing();
    let lib = create_library();
    let view = sorted_by_year(&lib);
    let expected = view.keys().to_vec();

    let (patch_tx, patch_rx) = mpsc::channel::<Option<HandoverPatch>>();
    let snapshot = lib.group.clone();

    let worker = thread::spawn(move || {
        let mut slot = patch_rx.recv().unwrap();
        let view = View::apply_and_consume_patch(&mut slot, &snapshot).unwrap();
        let reused = View::apply_and_consume_patch(&mut slot, &snapshot);
        (view.keys().to_vec(), view.is_in_sync(&snapshot), reused)
    });

    patch_tx
        .send(Some(
            view.export_for_handover(&lib.group, PayloadMode::Copy)
                .unwrap(),
        ))
        .unwrap();

    let (keys, in_sync, reused) = worker.join().unwrap();
    assert_eq!(keys, expected);
    assert!(in_sync);
    assert_eq!(reused.unwrap_err(), Error::PatchConsumed);
}

#[test]
fn group_moves_between_threads() {
    let lib = create_library();
    let books = lib.books;
    let mut view = sorted_by_year(&lib);
    let mut group = lib.group;

    let group = thread::spawn(move || {
        let kim = group
            .table(books)
            .and_then(|t| t.keys().nth(3))
            .unwrap();
        group.remove_object(books, kim).unwrap();
        group
    })
    .join()
    .unwrap();

    assert!(!view.is_in_sync(&group));
    view.sync_if_needed(&group).unwrap();
    assert_eq!(view.size(), 3);
}
