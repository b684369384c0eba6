//! In-memory stand-ins for the relational store and the search index.
//!
//! The index double reproduces the behavior the controller has to cope with: writes that
//! only become visible after a few reads, writes that never land, and documents that store
//! their lft as text.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::config::{ChildQuery, IndexTarget};
use crate::error::{Error, Result};
use crate::ids::{ChildRow, Lft, NodeId};
use crate::repair::RepairBatch;
use crate::traits::{BulkFieldUpdater, OrderedChildReader, RepairSource};

#[derive(Clone, Debug)]
struct StoredRow {
    id: NodeId,
    parent: NodeId,
    lft: Lft,
}

/// Vector-backed relational table of `(id, parent_id, lft)` rows.
#[derive(Clone, Debug, Default)]
pub struct MemoryRelationalStore {
    rows: Vec<StoredRow>,
    fail_reads: bool,
}

impl MemoryRelationalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_children(parent: NodeId, rows: &[ChildRow]) -> Self {
        let mut store = Self::new();
        for row in rows {
            store.insert(parent, *row);
        }
        store
    }

    pub fn insert(&mut self, parent: NodeId, row: ChildRow) {
        self.rows.retain(|r| r.id != row.id);
        self.rows.push(StoredRow {
            id: row.id,
            parent,
            lft: row.lft,
        });
    }

    pub fn set_lft(&mut self, id: NodeId, lft: Lft) -> Result<()> {
        let row = self
            .rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::Storage(format!("no row with id {id}")))?;
        row.lft = lft;
        Ok(())
    }

    /// Make every subsequent read fail, as an unreachable database would.
    pub fn fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    fn children_sorted(&self, query: &ChildQuery<'_>) -> Result<Vec<&StoredRow>> {
        if self.fail_reads {
            return Err(Error::Storage("relational store unavailable".into()));
        }
        let mut children: Vec<&StoredRow> =
            self.rows.iter().filter(|r| r.parent == query.parent).collect();
        children.sort_by_key(|r| (r.lft, r.id));
        children.truncate(query.limit as usize);
        Ok(children)
    }
}

impl OrderedChildReader for MemoryRelationalStore {
    fn read_ordered_children(&self, query: &ChildQuery<'_>) -> Result<Vec<Lft>> {
        Ok(self.children_sorted(query)?.into_iter().map(|r| r.lft).collect())
    }
}

impl RepairSource for MemoryRelationalStore {
    fn read_children_for_repair(&self, query: &ChildQuery<'_>) -> Result<Vec<ChildRow>> {
        Ok(self
            .children_sorted(query)?
            .into_iter()
            .map(|r| ChildRow { id: r.id, lft: r.lft })
            .collect())
    }
}

#[derive(Clone, Debug)]
struct PendingBatch {
    stale_reads: u32,
    batch: RepairBatch,
}

#[derive(Debug, Default)]
struct IndexState {
    documents: HashMap<IndexTarget, Vec<(NodeId, Map<String, Value>)>>,
    pending: Vec<PendingBatch>,
    stale_reads_after_write: u32,
    drop_writes: bool,
    fail_writes: bool,
    fail_reads: bool,
    reads: usize,
    bulk_calls: usize,
    failed_items: usize,
    batches: Vec<RepairBatch>,
}

impl IndexState {
    fn settle_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for mut p in pending {
            if p.stale_reads == 0 {
                self.apply(&p.batch);
            } else {
                p.stale_reads -= 1;
                self.pending.push(p);
            }
        }
    }

    fn apply(&mut self, batch: &RepairBatch) {
        let docs = self.documents.entry(batch.target.clone()).or_default();
        for update in &batch.updates {
            match docs.iter_mut().find(|(id, _)| *id == update.id) {
                Some((_, source)) => {
                    source.insert(update.field.clone(), update.value.to_json());
                }
                // Partial updates of unknown documents fail per item, like `document_missing`.
                None => self.failed_items += 1,
            }
        }
    }
}

/// Cloneable handle to a shared in-memory search index.
///
/// Every clone observes the same documents, so one clone can be handed to the controller as
/// reader and another as bulk writer while the test keeps a third for assertions.
#[derive(Clone, Debug, Default)]
pub struct MemorySearchIndex {
    state: Rc<RefCell<IndexState>>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index or replace a document. `source` must be a JSON object.
    pub fn put_document(&self, target: &IndexTarget, id: NodeId, source: Value) -> Result<()> {
        let Value::Object(source) = source else {
            return Err(Error::InvalidValue(format!("document {id} source is not an object")));
        };
        let mut state = self.state.borrow_mut();
        let docs = state.documents.entry(target.clone()).or_default();
        match docs.iter_mut().find(|(doc_id, _)| *doc_id == id) {
            Some((_, existing)) => *existing = source,
            None => docs.push((id, source)),
        }
        Ok(())
    }

    pub fn document(&self, target: &IndexTarget, id: NodeId) -> Option<Value> {
        let state = self.state.borrow();
        state
            .documents
            .get(target)?
            .iter()
            .find(|(doc_id, _)| *doc_id == id)
            .map(|(_, source)| Value::Object(source.clone()))
    }

    /// Accepted batches stay invisible to this many reads before they apply.
    pub fn set_stale_reads_after_write(&self, reads: u32) {
        self.state.borrow_mut().stale_reads_after_write = reads;
    }

    /// Accept batches without ever applying them.
    pub fn drop_writes(&self, drop: bool) {
        self.state.borrow_mut().drop_writes = drop;
    }

    /// Reject whole batches with a transport error.
    pub fn fail_writes(&self, fail: bool) {
        self.state.borrow_mut().fail_writes = fail;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.borrow_mut().fail_reads = fail;
    }

    /// Number of `read_ordered_children` calls served so far.
    pub fn reads(&self) -> usize {
        self.state.borrow().reads
    }

    pub fn bulk_calls(&self) -> usize {
        self.state.borrow().bulk_calls
    }

    /// Updates that targeted documents the index does not hold.
    pub fn failed_items(&self) -> usize {
        self.state.borrow().failed_items
    }

    pub fn batches(&self) -> Vec<RepairBatch> {
        self.state.borrow().batches.clone()
    }
}

fn json_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl OrderedChildReader for MemorySearchIndex {
    fn read_ordered_children(&self, query: &ChildQuery<'_>) -> Result<Vec<Lft>> {
        let mut state = self.state.borrow_mut();
        if state.fail_reads {
            return Err(Error::Index("search index unavailable".into()));
        }
        state.reads += 1;
        state.settle_pending();

        let Some(docs) = state.documents.get(query.target) else {
            return Ok(Vec::new());
        };

        let mut hits = Vec::new();
        for (id, source) in docs {
            let matches = source
                .get(query.parent_field)
                .and_then(json_as_i64)
                .is_some_and(|p| p == query.parent.0);
            if !matches {
                continue;
            }
            let raw = source.get(query.order_field).ok_or_else(|| {
                Error::InvalidValue(format!("document {id} has no {} field", query.order_field))
            })?;
            hits.push(Lft::from_json(raw)?);
        }
        hits.sort();
        hits.truncate(query.limit as usize);
        Ok(hits)
    }
}

impl BulkFieldUpdater for MemorySearchIndex {
    fn apply_field_updates(&mut self, batch: &RepairBatch) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            return Err(Error::Index("bulk request rejected".into()));
        }
        state.bulk_calls += 1;
        state.batches.push(batch.clone());
        if state.drop_writes {
            return Ok(());
        }
        let stale_reads = state.stale_reads_after_write;
        if stale_reads == 0 {
            state.apply(batch);
        } else {
            state.pending.push(PendingBatch {
                stale_reads,
                batch: batch.clone(),
            });
        }
        Ok(())
    }
}
