use serde_json::{json, Map, Value};

use lftsync_core::{ChildQuery, Error, IndexTarget, Lft, Result};

pub fn search_path(target: &IndexTarget) -> String {
    format!("/{}/{}/_search", target.index, target.document_type)
}

fn single(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

/// Search body for the children of `query.parent`: one must-term on the parent field, sorted
/// ascending on the order field, at most `query.limit` hits.
pub fn children_query(query: &ChildQuery<'_>) -> Value {
    json!({
        "size": query.limit,
        "_source": [query.order_field],
        "query": {
            "bool": {
                "must": [
                    { "term": single(query.parent_field, json!(query.parent.0)) }
                ]
            }
        },
        "sort": [single(query.order_field, json!("asc"))]
    })
}

/// Pull the order field out of each hit, keeping the order the index returned them in.
pub fn parse_children_hits(body: &Value, order_field: &str) -> Result<Vec<Lft>> {
    let hits = body
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Index("search response has no hits.hits array".into()))?;

    let mut out = Vec::with_capacity(hits.len());
    for hit in hits {
        let id = hit.get("_id").and_then(Value::as_str).unwrap_or("?");
        let raw = hit
            .get("_source")
            .and_then(|source| source.get(order_field))
            .ok_or_else(|| {
                Error::InvalidValue(format!("document {id} has no {order_field} field"))
            })?;
        let lft = Lft::from_json(raw)
            .map_err(|e| Error::InvalidValue(format!("document {id}: {e}")))?;
        out.push(lft);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use lftsync_core::{NodeId, SyncConfig};

    use super::*;

    #[test]
    fn query_filters_sorts_and_caps() {
        let config = SyncConfig::new(NodeId(450)).with_limit(25);
        let body = children_query(&config.child_query());
        assert_eq!(
            body,
            json!({
                "size": 25,
                "_source": ["lft"],
                "query": {"bool": {"must": [{"term": {"parentId": 450}}]}},
                "sort": [{"lft": "asc"}]
            })
        );
        assert_eq!(search_path(&config.target), "/atom/QubitInformationObject/_search");
    }

    #[test]
    fn custom_field_names_flow_into_the_query() {
        let config = SyncConfig::new(NodeId(7)).with_fields("parent", "position");
        let body = children_query(&config.child_query());
        assert_eq!(body["query"]["bool"]["must"][0]["term"]["parent"], json!(7));
        assert_eq!(body["sort"][0]["position"], json!("asc"));
        assert_eq!(body["size"], json!(10_000));
    }

    #[test]
    fn hits_keep_index_order_and_normalize() {
        let body = json!({
            "hits": {
                "total": 3,
                "hits": [
                    {"_id": "452", "_source": {"lft": 6}},
                    {"_id": "451", "_source": {"lft": "5"}},
                    {"_id": "453", "_source": {"lft": 8.0}}
                ]
            }
        });
        assert_eq!(
            parse_children_hits(&body, "lft").unwrap(),
            vec![Lft(6), Lft(5), Lft(8)]
        );
    }

    #[test]
    fn missing_fields_are_errors() {
        let body = json!({"hits": {"hits": [{"_id": "451", "_source": {}}]}});
        assert!(matches!(
            parse_children_hits(&body, "lft"),
            Err(Error::InvalidValue(_))
        ));
        assert!(matches!(
            parse_children_hits(&json!({"error": "boom"}), "lft"),
            Err(Error::Index(_))
        ));
    }
}
