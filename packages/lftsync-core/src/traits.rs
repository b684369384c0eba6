use std::time::Duration;

use crate::config::ChildQuery;
use crate::error::Result;
use crate::ids::{ChildRow, Lft};
use crate::repair::RepairBatch;

/// Reads the lft values of a parent's children, ascending, capped at `query.limit`.
///
/// Both the relational store and the search index implement this; their results are only
/// comparable if they apply exactly the same filter, sort, and cap.
pub trait OrderedChildReader {
    fn read_ordered_children(&self, query: &ChildQuery<'_>) -> Result<Vec<Lft>>;
}

/// Authoritative `(id, lft)` pairs for a parent's children. Order is not significant.
pub trait RepairSource {
    fn read_children_for_repair(&self, query: &ChildQuery<'_>) -> Result<Vec<ChildRow>>;
}

/// Applies a batch of partial document updates to the search index in one call.
///
/// `Ok` only means the batch was accepted. Whether the index reflects it is decided by
/// reading it back.
pub trait BulkFieldUpdater {
    fn apply_field_updates(&mut self, batch: &RepairBatch) -> Result<()>;
}

/// Blocking pause between post-repair reads.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

impl<T: OrderedChildReader + ?Sized> OrderedChildReader for &T {
    fn read_ordered_children(&self, query: &ChildQuery<'_>) -> Result<Vec<Lft>> {
        (**self).read_ordered_children(query)
    }
}

impl<T: RepairSource + ?Sized> RepairSource for &T {
    fn read_children_for_repair(&self, query: &ChildQuery<'_>) -> Result<Vec<ChildRow>> {
        (**self).read_children_for_repair(query)
    }
}

impl<T: BulkFieldUpdater + ?Sized> BulkFieldUpdater for &mut T {
    fn apply_field_updates(&mut self, batch: &RepairBatch) -> Result<()> {
        (**self).apply_field_updates(batch)
    }
}

/// Sleeps the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Returns immediately.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSleeper;

impl Sleeper for NoopSleeper {
    fn sleep(&mut self, _duration: Duration) {}
}

/// Remembers every requested pause without blocking; handy for tests.
#[derive(Clone, Debug, Default)]
pub struct RecordingSleeper {
    pub pauses: Vec<Duration>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.pauses.push(duration);
    }
}

impl<T: Sleeper + ?Sized> Sleeper for &mut T {
    fn sleep(&mut self, duration: Duration) {
        (**self).sleep(duration)
    }
}
