use std::time::Duration;

use serde_json::json;

use lftsync_core::{
    checksum, ChildRow, Error, IndexTarget, Lft, LftSyncer, MemoryRelationalStore,
    MemorySearchIndex, NodeId, ParentLeases, RecordingSleeper, RetryPolicy, SyncConfig,
    SyncOutcome,
};

const PARENT: NodeId = NodeId(450);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn relational_fixture() -> MemoryRelationalStore {
    MemoryRelationalStore::with_children(
        PARENT,
        &[
            ChildRow::new(451, 5),
            ChildRow::new(452, 6),
            ChildRow::new(453, 8),
        ],
    )
}

fn put(index: &MemorySearchIndex, id: i64, parent: serde_json::Value, lft: serde_json::Value) {
    index
        .put_document(
            &IndexTarget::default(),
            NodeId(id),
            json!({"slug": "child", "parentId": parent, "levelOfDescriptionId": "242", "lft": lft}),
        )
        .unwrap();
}

fn in_sync_index() -> MemorySearchIndex {
    let index = MemorySearchIndex::new();
    put(&index, 451, json!(450), json!(5));
    put(&index, 452, json!(450), json!(6));
    put(&index, 453, json!(450), json!(8));
    index
}

fn stale_index() -> MemorySearchIndex {
    let index = MemorySearchIndex::new();
    put(&index, 451, json!("450"), json!("99"));
    put(&index, 452, json!("450"), json!("6"));
    put(&index, 453, json!("450"), json!("7"));
    put(&index, 460, json!("300"), json!("99"));
    index
}

fn config() -> SyncConfig {
    SyncConfig::new(PARENT)
}

#[test]
fn matching_stores_never_touch_the_bulk_writer() {
    init_tracing();
    let db = relational_fixture();
    let index = in_sync_index();
    let mut syncer = LftSyncer::new(config(), &db, index.clone(), index.clone())
        .unwrap()
        .with_sleeper(RecordingSleeper::default());

    let outcome = syncer.sync().unwrap();
    assert_eq!(outcome, SyncOutcome::AlreadySynchronized);
    assert!(outcome.is_synchronized());
    assert!(!outcome.repaired());
    assert_eq!(index.bulk_calls(), 0);
    assert!(syncer.sleeper().pauses.is_empty());
}

#[test]
fn repair_sends_one_batch_with_one_update_per_row() {
    init_tracing();
    let db = relational_fixture();
    let index = stale_index();
    let mut syncer = LftSyncer::new(config(), &db, index.clone(), index.clone()).unwrap();

    assert_ne!(
        syncer.relational_checksum().unwrap(),
        syncer.index_checksum().unwrap()
    );

    let report = syncer.repair_index().unwrap();
    assert_eq!(report.updates, 3);
    assert_eq!(index.bulk_calls(), 1);

    let batch = &index.batches()[0];
    assert_eq!(batch.target, IndexTarget::default());
    let mut updates: Vec<(NodeId, String, Lft)> = batch
        .updates
        .iter()
        .map(|u| (u.id, u.field.clone(), u.value))
        .collect();
    updates.sort();
    assert_eq!(
        updates,
        vec![
            (NodeId(451), "lft".to_string(), Lft(5)),
            (NodeId(452), "lft".to_string(), Lft(6)),
            (NodeId(453), "lft".to_string(), Lft(8)),
        ]
    );

    assert_eq!(
        syncer.index_checksum().unwrap(),
        syncer.relational_checksum().unwrap()
    );
    // The document under another parent keeps its own value.
    let other = index.document(&IndexTarget::default(), NodeId(460)).unwrap();
    assert_eq!(other["lft"], json!("99"));
}

#[test]
fn repairing_twice_matches_repairing_once() {
    let db = relational_fixture();
    let index = stale_index();
    let mut syncer = LftSyncer::new(config(), &db, index.clone(), index.clone()).unwrap();

    syncer.repair_index().unwrap();
    let once = syncer.index_checksum().unwrap();
    let docs_once: Vec<_> = [451, 452, 453]
        .iter()
        .map(|id| index.document(&IndexTarget::default(), NodeId(*id)))
        .collect();

    syncer.repair_index().unwrap();
    let twice = syncer.index_checksum().unwrap();
    let docs_twice: Vec<_> = [451, 452, 453]
        .iter()
        .map(|id| index.document(&IndexTarget::default(), NodeId(*id)))
        .collect();

    assert_eq!(once, twice);
    assert_eq!(docs_once, docs_twice);
    assert_eq!(once, syncer.relational_checksum().unwrap());
}

#[test]
fn sync_repairs_a_stale_index() {
    init_tracing();
    let db = relational_fixture();
    let index = stale_index();
    let mut syncer = LftSyncer::new(config(), &db, index.clone(), index.clone())
        .unwrap()
        .with_sleeper(RecordingSleeper::default());

    let outcome = syncer.sync().unwrap();
    assert_eq!(outcome, SyncOutcome::Repaired { attempts: 1 });
    assert!(outcome.is_synchronized());
    assert!(syncer.sleeper().pauses.is_empty());
    assert!(syncer.check().unwrap().matches());
}

#[test]
fn sync_waits_out_index_propagation_delay() {
    let db = relational_fixture();
    let index = stale_index();
    index.set_stale_reads_after_write(2);
    let mut syncer = LftSyncer::new(config(), &db, index.clone(), index.clone())
        .unwrap()
        .with_sleeper(RecordingSleeper::default());

    let outcome = syncer.sync().unwrap();
    assert_eq!(outcome, SyncOutcome::Repaired { attempts: 3 });
    assert_eq!(syncer.sleeper().pauses, vec![Duration::from_secs(1); 2]);
}

#[test]
fn gives_up_after_four_post_repair_reads() {
    init_tracing();
    let db = relational_fixture();
    let index = stale_index();
    index.drop_writes(true);
    let mut syncer = LftSyncer::new(config(), &db, index.clone(), index.clone())
        .unwrap()
        .with_sleeper(RecordingSleeper::default());

    let outcome = syncer.sync().unwrap();
    assert_eq!(outcome, SyncOutcome::Diverged { attempts: 4 });
    assert!(!outcome.is_synchronized());
    // One read for the initial check plus four after the repair.
    assert_eq!(index.reads(), 5);
    assert_eq!(index.bulk_calls(), 1);
    assert_eq!(syncer.sleeper().pauses, vec![Duration::from_secs(1); 3]);
}

#[test]
fn immediate_retry_policy_skips_the_pauses() {
    let db = relational_fixture();
    let index = stale_index();
    index.drop_writes(true);
    let mut syncer = LftSyncer::new(
        config().with_retry(RetryPolicy::immediate()),
        &db,
        index.clone(),
        index.clone(),
    )
    .unwrap()
    .with_sleeper(RecordingSleeper::default());

    assert_eq!(syncer.sync().unwrap(), SyncOutcome::Diverged { attempts: 4 });
    assert!(syncer.sleeper().pauses.is_empty());
    assert_eq!(index.reads(), 5);
}

#[test]
fn same_values_in_another_order_are_a_mismatch() {
    let db = relational_fixture();
    let index = MemorySearchIndex::new();
    let target = IndexTarget::new("atom", "QubitInformationObject");
    index
        .put_document(&target, NodeId(451), json!({"parentId": 450, "lft": 5}))
        .unwrap();
    let syncer = LftSyncer::new(config(), &db, index.clone(), index.clone()).unwrap();

    assert_eq!(syncer.relational_checksum().unwrap(), checksum(&[Lft(5), Lft(6), Lft(8)]));
    assert_ne!(
        checksum(&[Lft(5), Lft(6), Lft(8)]),
        checksum(&[Lft(6), Lft(5), Lft(8)])
    );
    assert!(!syncer.check().unwrap().matches());
}

#[test]
fn limit_truncates_both_sides_identically() {
    let mut db = MemoryRelationalStore::new();
    let index = MemorySearchIndex::new();
    for (i, lft) in [40, 10, 30, 20, 50].iter().enumerate() {
        let id = 500 + i as i64;
        db.insert(PARENT, ChildRow::new(id, *lft));
        put(&index, id, json!(450), json!(*lft));
    }
    // Only the three lowest values take part; the index disagrees above them.
    db.set_lft(NodeId(504), Lft(55)).unwrap();

    let syncer = LftSyncer::new(config().with_limit(3), &db, index.clone(), index.clone()).unwrap();
    assert_eq!(syncer.relational_checksum().unwrap(), checksum(&[Lft(10), Lft(20), Lft(30)]));
    assert_eq!(syncer.index_checksum().unwrap(), checksum(&[Lft(10), Lft(20), Lft(30)]));
    assert!(syncer.check().unwrap().matches());

    let unlimited = LftSyncer::new(config(), &db, index.clone(), index.clone()).unwrap();
    assert!(!unlimited.check().unwrap().matches());
}

#[test]
fn relational_read_failures_propagate() {
    let mut db = relational_fixture();
    db.fail_reads(true);
    let index = in_sync_index();
    let mut syncer = LftSyncer::new(config(), &db, index.clone(), index.clone()).unwrap();

    let err = syncer.sync().unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    assert_eq!(index.bulk_calls(), 0);
}

#[test]
fn bulk_write_failures_propagate() {
    let db = relational_fixture();
    let index = stale_index();
    index.fail_writes(true);
    let mut syncer = LftSyncer::new(config(), &db, index.clone(), index.clone())
        .unwrap()
        .with_sleeper(RecordingSleeper::default());

    let err = syncer.sync().unwrap_err();
    assert!(matches!(err, Error::Index(_)));
}

#[test]
fn malformed_index_values_propagate() {
    let db = relational_fixture();
    let index = MemorySearchIndex::new();
    put(&index, 451, json!(450), json!("not-a-number"));
    let mut syncer = LftSyncer::new(config(), &db, index.clone(), index.clone()).unwrap();

    let err = syncer.sync().unwrap_err();
    assert!(matches!(err, Error::InvalidValue(_)));
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let db = relational_fixture();
    let index = in_sync_index();
    let result = LftSyncer::new(config().with_limit(0), &db, index.clone(), index.clone());
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[test]
fn sync_exclusive_refuses_a_held_parent() {
    let db = relational_fixture();
    let index = stale_index();
    let leases = ParentLeases::new();
    let mut syncer = LftSyncer::new(config(), &db, index.clone(), index.clone())
        .unwrap()
        .with_sleeper(RecordingSleeper::default());

    let held = leases.try_acquire(PARENT).unwrap();
    let err = syncer.sync_exclusive(&leases).unwrap_err();
    assert!(matches!(err, Error::Busy(NodeId(450))));
    assert_eq!(index.bulk_calls(), 0);

    drop(held);
    let outcome = syncer.sync_exclusive(&leases).unwrap();
    assert!(outcome.is_synchronized());
    assert!(!leases.is_held(PARENT));
}

#[test]
fn empty_parent_sends_no_batch() {
    let db = MemoryRelationalStore::new();
    let index = MemorySearchIndex::new();
    put(&index, 451, json!(450), json!(5));
    let mut syncer = LftSyncer::new(config(), &db, index.clone(), index.clone())
        .unwrap()
        .with_sleeper(RecordingSleeper::default());

    let outcome = syncer.sync().unwrap();
    assert_eq!(outcome, SyncOutcome::Diverged { attempts: 4 });
    assert_eq!(index.bulk_calls(), 0);
}
