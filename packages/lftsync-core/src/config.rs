use std::time::Duration;

use crate::error::{Error, Result};
use crate::ids::NodeId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Children beyond this many (in ascending lft order) are left out of every comparison.
pub const DEFAULT_LIMIT: u32 = 10_000;
pub const DEFAULT_INDEX: &str = "atom";
pub const DEFAULT_DOCUMENT_TYPE: &str = "QubitInformationObject";
pub const DEFAULT_PARENT_FIELD: &str = "parentId";
pub const DEFAULT_ORDER_FIELD: &str = "lft";

/// Index name and mapping type that hold the mirrored documents.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexTarget {
    pub index: String,
    pub document_type: String,
}

impl IndexTarget {
    pub fn new(index: impl Into<String>, document_type: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            document_type: document_type.into(),
        }
    }
}

impl Default for IndexTarget {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX, DEFAULT_DOCUMENT_TYPE)
    }
}

/// How long the controller keeps polling the index after a repair.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RetryPolicy {
    /// Re-reads after the first post-repair check.
    pub max_attempts: u32,
    #[cfg_attr(feature = "serde", serde(rename = "interval_ms", with = "duration_ms"))]
    pub interval: Duration,
    /// When false the attempts still run but nothing sleeps between them.
    pub wait: bool,
}

impl RetryPolicy {
    pub fn immediate() -> Self {
        Self {
            wait: false,
            ..Self::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            interval: Duration::from_secs(1),
            wait: true,
        }
    }
}

/// Children of `parent`, ascending by lft, at most `limit` of them.
///
/// Relational readers only look at `parent` and `limit`; index readers also need to know
/// where the documents live and what their fields are called.
#[derive(Clone, Copy, Debug)]
pub struct ChildQuery<'a> {
    pub parent: NodeId,
    pub limit: u32,
    pub target: &'a IndexTarget,
    pub parent_field: &'a str,
    pub order_field: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SyncConfig {
    pub parent_id: NodeId,
    #[cfg_attr(feature = "serde", serde(default = "default_limit"))]
    pub limit: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub target: IndexTarget,
    #[cfg_attr(feature = "serde", serde(default = "default_parent_field"))]
    pub parent_field: String,
    #[cfg_attr(feature = "serde", serde(default = "default_order_field"))]
    pub order_field: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub retry: RetryPolicy,
}

#[cfg(feature = "serde")]
fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

#[cfg(feature = "serde")]
fn default_parent_field() -> String {
    DEFAULT_PARENT_FIELD.to_string()
}

#[cfg(feature = "serde")]
fn default_order_field() -> String {
    DEFAULT_ORDER_FIELD.to_string()
}

impl SyncConfig {
    pub fn new(parent_id: NodeId) -> Self {
        Self {
            parent_id,
            limit: DEFAULT_LIMIT,
            target: IndexTarget::default(),
            parent_field: DEFAULT_PARENT_FIELD.to_string(),
            order_field: DEFAULT_ORDER_FIELD.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_target(mut self, target: IndexTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_fields(
        mut self,
        parent_field: impl Into<String>,
        order_field: impl Into<String>,
    ) -> Self {
        self.parent_field = parent_field.into();
        self.order_field = order_field.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The filter, sort, and cap every reader must apply for this config.
    pub fn child_query(&self) -> ChildQuery<'_> {
        ChildQuery {
            parent: self.parent_id,
            limit: self.limit,
            target: &self.target,
            parent_field: &self.parent_field,
            order_field: &self.order_field,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(Error::InvalidConfig("limit must be at least 1".into()));
        }
        if self.target.index.is_empty() {
            return Err(Error::InvalidConfig("index name must not be empty".into()));
        }
        if self.target.document_type.is_empty() {
            return Err(Error::InvalidConfig("document type must not be empty".into()));
        }
        if self.parent_field.is_empty() || self.order_field.is_empty() {
            return Err(Error::InvalidConfig("index field names must not be empty".into()));
        }
        Ok(())
    }

    #[cfg(feature = "serde")]
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: SyncConfig =
            serde_json::from_str(raw).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(feature = "serde")]
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
