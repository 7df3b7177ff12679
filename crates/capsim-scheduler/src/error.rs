//! Error types for the scheduler crate.

use std::collections::BTreeMap;
use std::fmt;

use capsim_core::WorkloadKey;
use thiserror::Error;

/// Prefix of every fit error message.
pub const NO_NODE_AVAILABLE: &str = "nodes are available";

/// No node passed the fit predicates for a workload.
///
/// Formats as `0/{n} nodes are available: {count} {reason}, ... .` with the
/// `count reason` entries sorted, so the leading clause up to the first colon
/// is a stable failure type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FitError {
    /// The workload that could not be placed.
    pub workload: WorkloadKey,
    /// Number of nodes considered.
    pub num_all_nodes: usize,
    /// Failure reasons per node.
    pub failed_predicates: BTreeMap<String, Vec<String>>,
}

impl FitError {
    /// Number of nodes reporting each reason.
    #[must_use]
    pub fn reason_histogram(&self) -> BTreeMap<&str, usize> {
        let mut histogram = BTreeMap::new();
        for reasons in self.failed_predicates.values() {
            for reason in reasons {
                *histogram.entry(reason.as_str()).or_insert(0) += 1;
            }
        }
        histogram
    }
}

impl fmt::Display for FitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut reasons: Vec<String> = self
            .reason_histogram()
            .into_iter()
            .map(|(reason, count)| format!("{count} {reason}"))
            .collect();
        reasons.sort();
        write!(
            f,
            "0/{} {NO_NODE_AVAILABLE}: {}.",
            self.num_all_nodes,
            reasons.join(", ")
        )
    }
}

impl std::error::Error for FitError {}

/// Errors that can occur during scheduling operations.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// No node fits the workload.
    #[error(transparent)]
    Fit(#[from] FitError),

    /// The cache holds no nodes at all.
    #[error("no nodes available to schedule pods")]
    NoNodesAvailable,

    /// An algorithm name failed validation.
    #[error("algorithm name {0:?} does not match the name validation regexp")]
    InvalidAlgorithmName(String),

    /// A predicate, priority or provider is not registered.
    #[error("{kind} {name:?} has not been registered")]
    UnknownAlgorithm {
        /// What was looked up: `predicate`, `priority` or `provider`.
        kind: &'static str,
        /// The name that was looked up.
        name: String,
    },

    /// The simulation rejected a bind or condition update.
    #[error("callback failed: {0}")]
    Callback(String),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] capsim_store::StoreError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The scheduler stopped before the operation completed.
    #[error("scheduler stopped")]
    Stopped,
}

impl SchedulerError {
    /// Whether this error means the workload cannot be placed on any node.
    ///
    /// Such errors are reported to the simulation as `Unschedulable`; every
    /// other error is reported as a transient condition and retried.
    #[must_use]
    pub const fn is_unschedulable(&self) -> bool {
        matches!(self, Self::Fit(_) | Self::NoNodesAvailable)
    }

    /// Check if this error is retriable.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Callback(_) | Self::Store(_))
    }
}

/// A specialized Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_error_message_is_sorted_histogram() {
        let mut failed = BTreeMap::new();
        failed.insert("n1".to_string(), vec!["Insufficient memory".to_string()]);
        failed.insert(
            "n2".to_string(),
            vec![
                "Insufficient cpu".to_string(),
                "Insufficient memory".to_string(),
            ],
        );
        failed.insert(
            "n3".to_string(),
            vec!["node(s) didn't match node selector".to_string()],
        );

        let err = FitError {
            workload: WorkloadKey::new("default", "w"),
            num_all_nodes: 3,
            failed_predicates: failed,
        };

        assert_eq!(
            err.to_string(),
            "0/3 nodes are available: 1 Insufficient cpu, 1 node(s) didn't match node selector, 2 Insufficient memory."
        );
    }

    #[test]
    fn error_classification() {
        let fit = SchedulerError::Fit(FitError {
            workload: WorkloadKey::new("default", "w"),
            num_all_nodes: 0,
            failed_predicates: BTreeMap::new(),
        });
        assert!(fit.is_unschedulable());
        assert!(!fit.is_retriable());
        assert!(SchedulerError::NoNodesAvailable.is_unschedulable());
        assert!(SchedulerError::Callback("x".into()).is_retriable());
        assert!(!SchedulerError::Callback("x".into()).is_unschedulable());
    }
}
