use tracing::{debug, info, info_span, warn};

use crate::checksum::{checksum, Checksum};
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::lease::ParentLeases;
use crate::repair::{RepairBatch, RepairReport};
use crate::traits::{
    BulkFieldUpdater, OrderedChildReader, RepairSource, Sleeper, ThreadSleeper,
};

/// How a `sync` call ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The first comparison matched; nothing was written.
    AlreadySynchronized,
    /// A repair was sent and the index matched after `attempts` post-repair reads.
    Repaired { attempts: u32 },
    /// A repair was sent but the index still differed after `attempts` post-repair reads.
    Diverged { attempts: u32 },
}

impl SyncOutcome {
    pub fn is_synchronized(&self) -> bool {
        !matches!(self, SyncOutcome::Diverged { .. })
    }

    pub fn repaired(&self) -> bool {
        !matches!(self, SyncOutcome::AlreadySynchronized)
    }
}

/// Both fingerprints for one parent, as read right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncStatus {
    pub relational: Checksum,
    pub index: Checksum,
}

impl SyncStatus {
    pub fn matches(&self) -> bool {
        self.relational == self.index
    }
}

/// Reconciles the index's copy of the lft values of one parent's children with the
/// relational store.
///
/// `D` is the authoritative store, `I` reads the index, `W` writes to it, and `S` provides
/// the pause between post-repair reads. Only one reconciliation per parent should run at a
/// time; see [`ParentLeases`].
pub struct LftSyncer<D, I, W, S = ThreadSleeper>
where
    D: OrderedChildReader + RepairSource,
    I: OrderedChildReader,
    W: BulkFieldUpdater,
    S: Sleeper,
{
    config: SyncConfig,
    relational: D,
    index: I,
    writer: W,
    sleeper: S,
}

impl<D, I, W> LftSyncer<D, I, W, ThreadSleeper>
where
    D: OrderedChildReader + RepairSource,
    I: OrderedChildReader,
    W: BulkFieldUpdater,
{
    pub fn new(config: SyncConfig, relational: D, index: I, writer: W) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            relational,
            index,
            writer,
            sleeper: ThreadSleeper,
        })
    }
}

impl<D, I, W, S> LftSyncer<D, I, W, S>
where
    D: OrderedChildReader + RepairSource,
    I: OrderedChildReader,
    W: BulkFieldUpdater,
    S: Sleeper,
{
    pub fn with_sleeper<S2: Sleeper>(self, sleeper: S2) -> LftSyncer<D, I, W, S2> {
        LftSyncer {
            config: self.config,
            relational: self.relational,
            index: self.index,
            writer: self.writer,
            sleeper,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    pub fn relational_checksum(&self) -> Result<Checksum> {
        let lfts = self.relational.read_ordered_children(&self.config.child_query())?;
        Ok(checksum(&lfts))
    }

    pub fn index_checksum(&self) -> Result<Checksum> {
        let lfts = self.index.read_ordered_children(&self.config.child_query())?;
        Ok(checksum(&lfts))
    }

    /// Read both fingerprints without repairing anything.
    pub fn check(&self) -> Result<SyncStatus> {
        Ok(SyncStatus {
            relational: self.relational_checksum()?,
            index: self.index_checksum()?,
        })
    }

    /// Overwrite the index's lft of every child with the relational value, in one batch.
    pub fn repair_index(&mut self) -> Result<RepairReport> {
        let query = self.config.child_query();
        let rows = self.relational.read_children_for_repair(&query)?;
        let batch = RepairBatch::from_rows(query.target, query.order_field, &rows);
        if batch.is_empty() {
            warn!(parent_id = %self.config.parent_id, "no relational children to repair from");
            return Ok(RepairReport::default());
        }
        self.writer.apply_field_updates(&batch)?;
        info!(
            parent_id = %self.config.parent_id,
            updates = batch.len(),
            index = %batch.target.index,
            "sent lft repair batch"
        );
        Ok(RepairReport {
            updates: batch.len(),
        })
    }

    /// Check, repair on mismatch, then poll the index until it agrees or patience runs out.
    pub fn sync(&mut self) -> Result<SyncOutcome> {
        let span = info_span!("lft_sync", parent_id = %self.config.parent_id);
        let _entered = span.enter();

        let relational = self.relational_checksum()?;
        let mut index = self.index_checksum()?;
        debug!(%relational, %index, "initial checksums");
        if relational == index {
            debug!("index already in sync");
            return Ok(SyncOutcome::AlreadySynchronized);
        }

        self.repair_index()?;

        index = self.index_checksum()?;
        let mut attempts = 1;
        let retry = self.config.retry.clone();
        let mut waited = 0;
        while index != relational && waited < retry.max_attempts {
            if retry.wait {
                self.sleeper.sleep(retry.interval);
            }
            waited += 1;
            attempts += 1;
            index = self.index_checksum()?;
            debug!(attempt = attempts, %index, "re-read index checksum");
        }

        if index == relational {
            info!(attempts, "index repaired");
            Ok(SyncOutcome::Repaired { attempts })
        } else {
            warn!(attempts, %relational, %index, "index did not converge after repair");
            Ok(SyncOutcome::Diverged { attempts })
        }
    }

    /// `sync`, but only if no other holder of `leases` is reconciling the same parent.
    pub fn sync_exclusive(&mut self, leases: &ParentLeases) -> Result<SyncOutcome> {
        let parent = self.config.parent_id;
        let Some(_lease) = leases.try_acquire(parent) else {
            return Err(Error::Busy(parent));
        };
        self.sync()
    }
}
