use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::ids::NodeId;

/// Registry of parents currently being reconciled.
///
/// Nothing in the controller consults this on its own; callers that may run reconciliations
/// for the same parent concurrently share one registry and go through
/// [`LftSyncer::sync_exclusive`](crate::LftSyncer::sync_exclusive).
#[derive(Clone, Debug, Default)]
pub struct ParentLeases {
    held: Arc<Mutex<HashSet<NodeId>>>,
}

impl ParentLeases {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<NodeId>> {
        // A panic while holding the lock cannot leave the set half-updated.
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim `parent`, or `None` if another holder has it.
    pub fn try_acquire(&self, parent: NodeId) -> Option<ParentLease> {
        if !self.lock().insert(parent) {
            return None;
        }
        Some(ParentLease {
            parent,
            leases: self.clone(),
        })
    }

    pub fn is_held(&self, parent: NodeId) -> bool {
        self.lock().contains(&parent)
    }
}

/// Released on drop.
#[derive(Debug)]
pub struct ParentLease {
    parent: NodeId,
    leases: ParentLeases,
}

impl ParentLease {
    pub fn parent(&self) -> NodeId {
        self.parent
    }
}

impl Drop for ParentLease {
    fn drop(&mut self) {
        self.leases.lock().remove(&self.parent);
    }
}
