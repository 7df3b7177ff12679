//! Error types for the simulation controller.

use capsim_core::WorkloadKey;
use thiserror::Error;

/// A result type using `SimulationError`.
pub type Result<T> = std::result::Result<T, SimulationError>;

/// Errors that end or prevent a simulation run.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// A bound workload names a node the cluster does not have.
    #[error("node {node:?} of workload {workload} is not part of the cluster")]
    UnknownNode {
        /// The workload being accounted.
        workload: WorkloadKey,
        /// The node it claims to run on.
        node: String,
    },

    /// A workload was accounted without a host.
    #[error("workload {0} has no node assigned")]
    MissingHost(WorkloadKey),

    /// A placement asks for more than the node has left.
    #[error("workload {workload} requests more {resources:?} than node {node} has left")]
    InsufficientHeadroom {
        /// The workload being accounted.
        workload: WorkloadKey,
        /// The node it was placed on.
        node: String,
        /// Resources whose remaining headroom is too small.
        resources: Vec<String>,
    },

    /// No decision arrived in time for the admitted workload.
    #[error("no scheduling decision for workload {workload} within {seconds}s")]
    DecisionTimeout {
        /// The admitted workload.
        workload: WorkloadKey,
        /// The configured timeout.
        seconds: u64,
    },

    /// `run` was called more than once.
    #[error("simulation has already been started")]
    AlreadyStarted,

    /// A workload was admitted while another still awaits its decision.
    #[error("cannot admit workload {admitted}: {outstanding} is still awaiting a decision")]
    Outstanding {
        /// The workload being admitted.
        admitted: WorkloadKey,
        /// The workload awaiting a decision.
        outstanding: WorkloadKey,
    },

    /// A callback named a workload that is not awaiting a decision.
    #[error("workload {0} is not awaiting a decision")]
    NotPending(WorkloadKey),

    /// A callback named a workload the store does not hold.
    #[error("workload {0} not found")]
    WorkloadNotFound(WorkloadKey),

    /// Storage layer error.
    #[error("store error: {0}")]
    Store(#[from] capsim_store::StoreError),

    /// Scheduling algorithm error.
    #[error("scheduler error: {0}")]
    Scheduler(#[from] capsim_scheduler::SchedulerError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SimulationError {
    /// Whether this error means the tracked cluster state can no longer be trusted.
    #[must_use]
    pub const fn is_accounting_failure(&self) -> bool {
        matches!(
            self,
            Self::UnknownNode { .. } | Self::MissingHost(_) | Self::InsufficientHeadroom { .. }
        )
    }
}
