use serde::Serialize;
use serde_json::{Map, Value};

use lftsync_core::{Error, RepairBatch, Result};

#[derive(Serialize)]
struct UpdateAction<'a> {
    update: ActionMeta<'a>,
}

#[derive(Serialize)]
struct ActionMeta<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_type")]
    document_type: &'a str,
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Serialize)]
struct PartialDoc {
    doc: Map<String, Value>,
}

/// NDJSON body for `POST /_bulk`: an `update` action line and a partial `doc` line per update.
pub fn bulk_update_body(batch: &RepairBatch) -> Result<String> {
    let mut body = String::new();
    for update in &batch.updates {
        let action = UpdateAction {
            update: ActionMeta {
                index: &batch.target.index,
                document_type: &batch.target.document_type,
                id: update.id.to_string(),
            },
        };
        let mut doc = Map::new();
        doc.insert(update.field.clone(), update.value.to_json());

        body.push_str(&serde_json::to_string(&action).map_err(|e| Error::Index(e.to_string()))?);
        body.push('\n');
        body.push_str(
            &serde_json::to_string(&PartialDoc { doc }).map_err(|e| Error::Index(e.to_string()))?,
        );
        body.push('\n');
    }
    Ok(body)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BulkItemFailure {
    pub id: String,
    pub status: u64,
    pub reason: String,
}

/// Items of a `_bulk` response that the index rejected.
pub fn failed_bulk_items(response: &Value) -> Vec<BulkItemFailure> {
    if !response.get("errors").and_then(Value::as_bool).unwrap_or(false) {
        return Vec::new();
    }
    let Some(items) = response.get("items").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| item.as_object()?.values().next())
        .filter(|result| result.get("error").is_some())
        .map(|result| BulkItemFailure {
            id: result
                .get("_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            status: result.get("status").and_then(Value::as_u64).unwrap_or_default(),
            reason: result
                .pointer("/error/reason")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| result["error"].to_string()),
        })
        .collect()
}
