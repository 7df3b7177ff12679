//! Accumulated outcome of a simulation run.

use capsim_core::{Workload, WorkloadUid};
use serde::{Deserialize, Serialize};

/// Stop reason when every candidate workload has been decided.
pub const STOP_NO_WORKLOADS_REMAIN: &str = "no workloads remain";

/// Outcome of a run: which workloads were placed, which were not, and why it stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationStatus {
    /// Candidate workloads that were bound, in decision order.
    pub successful: Vec<Workload>,
    /// Candidate workloads that were rejected.
    pub failed: Vec<Workload>,
    /// Workloads already running when the simulation started.
    pub pre_existing: Vec<Workload>,
    /// Why the run ended. Set once.
    pub stop_reason: Option<String>,
}

impl SimulationStatus {
    fn is_decided(&self, uid: &WorkloadUid) -> bool {
        self.successful
            .iter()
            .chain(&self.failed)
            .any(|w| &w.uid == uid)
    }

    /// Record a bound workload. Returns `false` if its UID was already decided.
    pub fn record_success(&mut self, workload: Workload) -> bool {
        if self.is_decided(&workload.uid) {
            return false;
        }
        self.successful.push(workload);
        true
    }

    /// Record a rejected workload. Returns `false` if its UID was already decided.
    pub fn record_failure(&mut self, workload: Workload) -> bool {
        if self.is_decided(&workload.uid) {
            return false;
        }
        self.failed.push(workload);
        true
    }

    /// Set the stop reason unless one is already set. Returns whether it took effect.
    pub fn set_stop_reason(&mut self, reason: impl Into<String>) -> bool {
        if self.stop_reason.is_some() {
            return false;
        }
        self.stop_reason = Some(reason.into());
        true
    }

    /// Number of candidate workloads decided so far.
    #[must_use]
    pub fn decided(&self) -> usize {
        self.successful.len() + self.failed.len()
    }
}
