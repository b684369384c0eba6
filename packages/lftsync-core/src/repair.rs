use crate::config::IndexTarget;
use crate::ids::{ChildRow, Lft, NodeId};

/// Set one field of one index document to the authoritative value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentUpdate {
    pub id: NodeId,
    pub field: String,
    pub value: Lft,
}

/// Corrective writes for one repair attempt, sent as a single bulk request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepairBatch {
    pub target: IndexTarget,
    pub updates: Vec<DocumentUpdate>,
}

impl RepairBatch {
    /// One update per relational row, keyed by id.
    pub fn from_rows(target: &IndexTarget, field: &str, rows: &[ChildRow]) -> Self {
        let updates = rows
            .iter()
            .map(|row| DocumentUpdate {
                id: row.id,
                field: field.to_string(),
                value: row.lft,
            })
            .collect();
        Self {
            target: target.clone(),
            updates,
        }
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// What `repair_index` submitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub updates: usize,
}
