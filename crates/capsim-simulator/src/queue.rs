//! The admission queue.

use std::collections::{HashSet, VecDeque};

use capsim_core::Workload;
use tracing::warn;

/// Candidate workloads in admission order.
///
/// The queue is filled once at construction and only drains. Duplicate UIDs
/// are dropped so no workload can be admitted twice.
#[derive(Debug, Default)]
pub struct AdmissionQueue {
    pending: VecDeque<Workload>,
    popped: usize,
}

impl AdmissionQueue {
    /// Create a queue over `workloads`, keeping the first of each UID.
    #[must_use]
    pub fn new(workloads: Vec<Workload>) -> Self {
        let mut seen = HashSet::with_capacity(workloads.len());
        let pending = workloads
            .into_iter()
            .filter(|workload| {
                let fresh = seen.insert(workload.uid.clone());
                if !fresh {
                    warn!(uid = %workload.uid, workload = %workload.key(), "Dropping duplicate workload");
                }
                fresh
            })
            .collect();
        Self { pending, popped: 0 }
    }

    /// Take the next workload, or `None` once the queue is drained.
    pub fn pop(&mut self) -> Option<Workload> {
        let workload = self.pending.pop_front()?;
        self.popped += 1;
        Some(workload)
    }

    /// Number of workloads still queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the queue is drained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of workloads taken so far.
    #[must_use]
    pub const fn popped(&self) -> usize {
        self.popped
    }
}
