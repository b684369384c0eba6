#![forbid(unsafe_code)]
//! Elasticsearch bridge for `lftsync-core`.
//!
//! [`ElasticIndex`] reads a parent's children with a bool/must term query sorted on the order
//! field and writes repairs through the `_bulk` API. The payload builders are public so the
//! wire shapes can be inspected without a running cluster.

mod bulk;
mod client;
mod config;
mod query;

pub use bulk::{bulk_update_body, failed_bulk_items, BulkItemFailure};
pub use client::ElasticIndex;
pub use config::ElasticConfig;
pub use query::{children_query, parse_children_hits, search_path};
