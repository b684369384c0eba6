#![forbid(unsafe_code)]
//! Core of the lft syncer: detects and repairs drift between the authoritative relational
//! record of nested-set `lft` values and the copy held by a search index, one parent at a time.
//! This crate stays independent of concrete stores so adapters for Postgres, SQLite, or
//! Elasticsearch only need to satisfy the traits defined here.

pub mod checksum;
pub mod config;
pub mod error;
pub mod ids;
pub mod lease;
pub mod memory;
pub mod repair;
pub mod syncer;
pub mod traits;

pub use checksum::{checksum, Checksum};
pub use config::{ChildQuery, IndexTarget, RetryPolicy, SyncConfig, DEFAULT_LIMIT};
pub use error::{Error, Result};
pub use ids::{ChildRow, Lft, NodeId};
pub use lease::{ParentLease, ParentLeases};
pub use memory::{MemoryRelationalStore, MemorySearchIndex};
pub use repair::{DocumentUpdate, RepairBatch, RepairReport};
pub use syncer::{LftSyncer, SyncOutcome, SyncStatus};
pub use traits::{
    BulkFieldUpdater, NoopSleeper, OrderedChildReader, RecordingSleeper, RepairSource, Sleeper,
    ThreadSleeper,
};
