//! Fixtures and a conformance suite shared by the relational store adapters.
//!
//! An adapter seeds its store with [`conformance_rows`] and then runs
//! [`assert_relational_reader_conformance`]; every backend must agree with the in-memory
//! store on filter, sort, and cap.

use lftsync_core::{
    checksum, ChildRow, IndexTarget, Lft, MemoryRelationalStore, NodeId, OrderedChildReader,
    RepairSource, SyncConfig,
};

pub const PARENT: NodeId = NodeId(450);
pub const OTHER_PARENT: NodeId = NodeId(300);
pub const WIDE_PARENT: NodeId = NodeId(900);
pub const WIDE_CHILDREN: i64 = 12;

/// The three children of parent 450 used throughout the tests.
pub fn parent_rows() -> Vec<ChildRow> {
    vec![
        ChildRow::new(451, 5),
        ChildRow::new(452, 6),
        ChildRow::new(453, 8),
    ]
}

/// Every row an adapter must hold before the conformance suite runs, as `(parent, row)`.
///
/// Rows are deliberately not inserted in lft order.
pub fn conformance_rows() -> Vec<(NodeId, ChildRow)> {
    let mut rows = vec![
        (PARENT, ChildRow::new(453, 8)),
        (PARENT, ChildRow::new(451, 5)),
        (PARENT, ChildRow::new(452, 6)),
        (OTHER_PARENT, ChildRow::new(301, 1)),
        (OTHER_PARENT, ChildRow::new(302, 99)),
    ];
    for i in 0..WIDE_CHILDREN {
        // lft 100, 90, ..., reversed relative to id.
        rows.push((WIDE_PARENT, ChildRow::new(1000 + i, 100 - i * 10)));
    }
    rows
}

pub fn memory_reference() -> MemoryRelationalStore {
    let mut store = MemoryRelationalStore::new();
    for (parent, row) in conformance_rows() {
        store.insert(parent, row);
    }
    store
}

pub fn config(parent: NodeId, limit: u32) -> SyncConfig {
    SyncConfig::new(parent)
        .with_limit(limit)
        .with_target(IndexTarget::default())
}

fn sorted_rows(mut rows: Vec<ChildRow>) -> Vec<ChildRow> {
    rows.sort_by_key(|r| (r.lft, r.id));
    rows
}

pub fn assert_relational_reader_conformance<R>(reader: &R)
where
    R: OrderedChildReader + RepairSource,
{
    let reference = memory_reference();

    for (parent, limit) in [
        (PARENT, 10_000),
        (PARENT, 2),
        (OTHER_PARENT, 10_000),
        (WIDE_PARENT, 10_000),
        (WIDE_PARENT, 5),
        (WIDE_PARENT, 1),
        (NodeId(12345), 10_000),
    ] {
        let config = config(parent, limit);
        let query = config.child_query();

        let got = reader.read_ordered_children(&query).unwrap();
        let want = reference.read_ordered_children(&query).unwrap();
        assert_eq!(got, want, "ordered children of {parent} (limit {limit})");
        assert_eq!(checksum(&got), checksum(&want));
        assert!(got.windows(2).all(|w| w[0] <= w[1]), "lft ascending");
        assert!(got.len() <= limit as usize);

        let repair = sorted_rows(reader.read_children_for_repair(&query).unwrap());
        let want_repair = sorted_rows(reference.read_children_for_repair(&query).unwrap());
        assert_eq!(repair, want_repair, "repair rows of {parent} (limit {limit})");
    }

    let query_config = config(PARENT, 10_000);
    assert_eq!(
        reader.read_ordered_children(&query_config.child_query()).unwrap(),
        vec![Lft(5), Lft(6), Lft(8)]
    );
}
