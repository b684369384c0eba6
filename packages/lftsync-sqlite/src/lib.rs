#![forbid(unsafe_code)]
//! SQLite adapter: reads the `information_object` nested-set table for the lft syncer.
//! Mostly useful for tests and local tooling; production deployments use the Postgres adapter.

mod storage;

pub use storage::SqliteRelationalStore;
