use std::fmt;

use serde_json::Value;

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable identifier of a record in the relational store.
///
/// The search index keys documents by the decimal rendering of this value.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeId(pub i64);

impl NodeId {
    /// Parse an identifier as it appears in document ids or text columns.
    pub fn parse(raw: &str) -> Result<Self> {
        raw.trim()
            .parse::<i64>()
            .map(NodeId)
            .map_err(|_| Error::InvalidValue(format!("node id {raw:?} is not an integer")))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for NodeId {
    fn from(value: i64) -> Self {
        NodeId(value)
    }
}

/// Nested-set left value in its canonical representation.
///
/// Stores disagree on how they hand these back (text columns, JSON numbers, JSON strings);
/// every reader converts into `Lft` before a sequence is fingerprinted.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Lft(pub i64);

impl Lft {
    pub fn parse(raw: &str) -> Result<Self> {
        raw.trim()
            .parse::<i64>()
            .map(Lft)
            .map_err(|_| Error::InvalidValue(format!("lft {raw:?} is not an integer")))
    }

    /// Normalize a JSON field value. Accepts integers, integral floats, and numeric strings.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    return Ok(Lft(v));
                }
                if n.as_u64().is_some() {
                    return Err(Error::InvalidValue(format!("lft {n} overflows i64")));
                }
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                        Ok(Lft(f as i64))
                    }
                    _ => Err(Error::InvalidValue(format!("lft {n} is not integral"))),
                }
            }
            Value::String(s) => Lft::parse(s),
            other => Err(Error::InvalidValue(format!("lft has unsupported type: {other}"))),
        }
    }

    pub fn to_json(self) -> Value {
        Value::from(self.0)
    }
}

impl fmt::Display for Lft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Lft {
    fn from(value: i64) -> Self {
        Lft(value)
    }
}

/// One child record as the repair step reads it: authoritative id and lft.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChildRow {
    pub id: NodeId,
    pub lft: Lft,
}

impl ChildRow {
    pub fn new(id: i64, lft: i64) -> Self {
        Self {
            id: NodeId(id),
            lft: Lft(lft),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_numbers_and_strings_normalize_to_the_same_value() {
        assert_eq!(Lft::from_json(&json!(5)).unwrap(), Lft(5));
        assert_eq!(Lft::from_json(&json!("5")).unwrap(), Lft(5));
        assert_eq!(Lft::from_json(&json!(" 5 ")).unwrap(), Lft(5));
        assert_eq!(Lft::from_json(&json!(5.0)).unwrap(), Lft(5));
    }

    #[test]
    fn rejects_values_that_cannot_be_ordered() {
        assert!(Lft::from_json(&json!(null)).is_err());
        assert!(Lft::from_json(&json!(5.5)).is_err());
        assert!(Lft::from_json(&json!("five")).is_err());
        assert!(Lft::from_json(&json!([5])).is_err());
        assert!(Lft::from_json(&json!(u64::MAX)).is_err());
    }

    #[test]
    fn node_ids_parse_from_document_ids() {
        assert_eq!(NodeId::parse("451").unwrap(), NodeId(451));
        assert_eq!(NodeId(451).to_string(), "451");
        assert!(NodeId::parse("abc").is_err());
    }
}
