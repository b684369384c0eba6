use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::{debug, warn};

use lftsync_core::{
    BulkFieldUpdater, ChildQuery, Error, Lft, OrderedChildReader, RepairBatch, Result,
};

use crate::bulk::{bulk_update_body, failed_bulk_items};
use crate::config::ElasticConfig;
use crate::query::{children_query, parse_children_hits, search_path};

fn index_err(e: reqwest::Error) -> Error {
    Error::Index(e.to_string())
}

/// Blocking Elasticsearch client that serves as both index reader and bulk writer.
///
/// Clones share the underlying connection pool.
#[derive(Clone, Debug)]
pub struct ElasticIndex {
    http: Client,
    config: ElasticConfig,
}

impl ElasticIndex {
    pub fn new(config: ElasticConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(index_err)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ElasticConfig {
        &self.config
    }

    fn json_response(response: Response, what: &str) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(Error::Index(format!("{what} returned {status}: {text}")));
        }
        response.json::<Value>().map_err(index_err)
    }
}

impl OrderedChildReader for ElasticIndex {
    fn read_ordered_children(&self, query: &ChildQuery<'_>) -> Result<Vec<Lft>> {
        let url = self.config.endpoint(&search_path(query.target));
        let response = self
            .http
            .post(url)
            .json(&children_query(query))
            .send()
            .map_err(index_err)?;
        let body = Self::json_response(response, "search")?;
        let lfts = parse_children_hits(&body, query.order_field)?;
        debug!(parent_id = %query.parent, hits = lfts.len(), "read ordered children from index");
        Ok(lfts)
    }
}

impl BulkFieldUpdater for ElasticIndex {
    fn apply_field_updates(&mut self, batch: &RepairBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let url = self.config.endpoint("/_bulk");
        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(bulk_update_body(batch)?)
            .send()
            .map_err(index_err)?;
        let body = Self::json_response(response, "bulk")?;

        // Rejected items are left for the post-repair read to notice.
        let failures = failed_bulk_items(&body);
        for failure in &failures {
            warn!(
                id = %failure.id,
                status = failure.status,
                reason = %failure.reason,
                "bulk update item rejected"
            );
        }
        debug!(
            updates = batch.len(),
            failed = failures.len(),
            index = %batch.target.index,
            "bulk update sent"
        );
        Ok(())
    }
}
