#![forbid(unsafe_code)]
//! Postgres-backed relational reader for `lftsync-core`.
//!
//! Reads the authoritative `information_object` nested-set table. All sync semantics stay in
//! `lftsync-core`; this crate only knows how to ask Postgres for a parent's children.

mod reader;
mod schema;

pub use reader::PgRelationalReader;
pub use schema::{ensure_schema, insert_children, reset_parent_for_tests};
