//! The generic scheduling algorithm.
//!
//! Scheduling runs in two phases: every predicate filters the known nodes,
//! then every weighted priority scores the feasible ones. The highest total
//! wins; ties go to the node whose name sorts first so runs are reproducible.

use std::collections::BTreeMap;
use std::sync::Arc;

use capsim_core::Workload;
use tracing::{debug, trace};

use crate::cache::NodeInfo;
use crate::error::{FitError, Result, SchedulerError};
use crate::predicates::FitPredicate;
use crate::priorities::PriorityFunction;

/// Fewest feasible nodes to find before a partial search may stop.
pub const MIN_FEASIBLE_NODES_TO_FIND: usize = 100;

/// Lists the nodes currently known to the scheduler.
pub trait NodeLister: Send + Sync {
    /// Snapshot of every known node with its usage, in name order.
    ///
    /// # Errors
    ///
    /// Returns an error if the node view cannot be read.
    fn list(&self) -> Result<Vec<NodeInfo>>;
}

/// Chooses a node for a workload.
pub trait ScheduleAlgorithm: Send + Sync {
    /// Pick a host for `workload` among the nodes `lister` knows.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Fit` when no node fits, or
    /// `SchedulerError::NoNodesAvailable` when there are no nodes at all.
    fn schedule(&self, workload: &Workload, lister: &dyn NodeLister) -> Result<String>;
}

/// A named predicate.
#[derive(Clone)]
pub struct PredicateConfig {
    /// Registered name.
    pub name: String,
    /// The predicate.
    pub predicate: Arc<dyn FitPredicate>,
}

/// A named, weighted priority function.
#[derive(Clone)]
pub struct PriorityConfig {
    /// Registered name.
    pub name: String,
    /// The priority function.
    pub function: Arc<dyn PriorityFunction>,
    /// Multiplier applied to the function's score.
    pub weight: i64,
}

/// Filter-then-score scheduler built from registered predicates and priorities.
pub struct GenericScheduler {
    predicates: Vec<PredicateConfig>,
    priorities: Vec<PriorityConfig>,
    percentage_of_nodes_to_score: u32,
    always_check_all_predicates: bool,
}

impl GenericScheduler {
    /// Create a scheduler evaluating `predicates` in order.
    #[must_use]
    pub fn new(predicates: Vec<PredicateConfig>, priorities: Vec<PriorityConfig>) -> Self {
        Self {
            predicates,
            priorities,
            percentage_of_nodes_to_score: 100,
            always_check_all_predicates: false,
        }
    }

    /// Search only this share of the nodes for feasible placements.
    #[must_use]
    pub fn with_percentage_of_nodes_to_score(mut self, percentage: u32) -> Self {
        self.percentage_of_nodes_to_score = percentage.clamp(1, 100);
        self
    }

    /// Evaluate every predicate on each node instead of stopping at the first failure.
    #[must_use]
    pub fn with_always_check_all_predicates(mut self, enabled: bool) -> Self {
        self.always_check_all_predicates = enabled;
        self
    }

    /// Names of the predicates, in evaluation order.
    #[must_use]
    pub fn predicate_names(&self) -> Vec<&str> {
        self.predicates.iter().map(|p| p.name.as_str()).collect()
    }

    /// Names of the priorities.
    #[must_use]
    pub fn priority_names(&self) -> Vec<&str> {
        self.priorities.iter().map(|p| p.name.as_str()).collect()
    }

    fn num_feasible_nodes_to_find(&self, num_all_nodes: usize) -> usize {
        if num_all_nodes < MIN_FEASIBLE_NODES_TO_FIND || self.percentage_of_nodes_to_score >= 100 {
            return num_all_nodes;
        }
        let wanted = num_all_nodes * self.percentage_of_nodes_to_score as usize / 100;
        wanted.max(MIN_FEASIBLE_NODES_TO_FIND)
    }

    fn failed_predicates(&self, workload: &Workload, node: &NodeInfo) -> Vec<String> {
        let mut reasons = Vec::new();
        for config in &self.predicates {
            let failures = config.predicate.check(workload, node);
            if failures.is_empty() {
                continue;
            }
            trace!(node = %node.name(), predicate = %config.name, ?failures, "Predicate failed");
            reasons.extend(failures);
            if !self.always_check_all_predicates {
                break;
            }
        }
        reasons
    }

    fn score(&self, workload: &Workload, node: &NodeInfo) -> i64 {
        self.priorities
            .iter()
            .map(|config| config.function.score(workload, node) * config.weight)
            .sum()
    }
}

impl ScheduleAlgorithm for GenericScheduler {
    fn schedule(&self, workload: &Workload, lister: &dyn NodeLister) -> Result<String> {
        let nodes = lister.list()?;
        if nodes.is_empty() {
            return Err(SchedulerError::NoNodesAvailable);
        }

        let wanted = self.num_feasible_nodes_to_find(nodes.len());
        let mut feasible = Vec::new();
        let mut failed_predicates = BTreeMap::new();

        for node in &nodes {
            if feasible.len() >= wanted {
                break;
            }
            let reasons = self.failed_predicates(workload, node);
            if reasons.is_empty() {
                feasible.push(node);
            } else {
                failed_predicates.insert(node.name().to_string(), reasons);
            }
        }

        if feasible.is_empty() {
            return Err(FitError {
                workload: workload.key(),
                num_all_nodes: nodes.len(),
                failed_predicates,
            }
            .into());
        }

        if feasible.len() == 1 || self.priorities.is_empty() {
            return Ok(feasible[0].name().to_string());
        }

        let mut best = (feasible[0], self.score(workload, feasible[0]));
        for node in &feasible[1..] {
            let score = self.score(workload, node);
            trace!(node = %node.name(), score, "Scored node");
            // Nodes arrive in name order, so strict comparison keeps the first on ties.
            if score > best.1 {
                best = (node, score);
            }
        }

        let (node, score) = best;
        debug!(workload = %workload.key(), node = %node.name(), score, "Selected node");
        Ok(node.name().to_string())
    }
}

/// A scripted [`ScheduleAlgorithm`] for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use std::collections::BTreeMap;

    use capsim_core::Workload;
    use parking_lot::Mutex;

    use super::{NodeLister, ScheduleAlgorithm};
    use crate::error::{FitError, Result, SchedulerError};

    /// What the mock answers for every workload.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Decision {
        /// Pick this host, whether or not the node exists.
        Bind(String),
        /// Fail every listed node with this reason.
        Reject(String),
        /// Fail with a non-terminal error.
        Fail(String),
    }

    /// Returns a fixed decision and records the workloads it was asked about.
    pub struct MockAlgorithm {
        decision: Mutex<Decision>,
        calls: Mutex<Vec<String>>,
    }

    impl MockAlgorithm {
        /// Create a mock answering `decision`.
        #[must_use]
        pub fn new(decision: Decision) -> Self {
            Self {
                decision: Mutex::new(decision),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// A mock binding every workload to `host`.
        #[must_use]
        pub fn always_bind(host: impl Into<String>) -> Self {
            Self::new(Decision::Bind(host.into()))
        }

        /// Change the answer for later calls.
        pub fn set_decision(&self, decision: Decision) {
            *self.decision.lock() = decision;
        }

        /// Keys of the workloads scheduled so far, in call order.
        #[must_use]
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    impl ScheduleAlgorithm for MockAlgorithm {
        fn schedule(&self, workload: &Workload, lister: &dyn NodeLister) -> Result<String> {
            self.calls.lock().push(workload.key().to_string());
            let decision = self.decision.lock().clone();
            match decision {
                Decision::Bind(host) => Ok(host),
                Decision::Reject(reason) => {
                    let nodes = lister.list()?;
                    let failed_predicates: BTreeMap<_, _> = nodes
                        .iter()
                        .map(|node| (node.name().to_string(), vec![reason.clone()]))
                        .collect();
                    Err(FitError {
                        workload: workload.key(),
                        num_all_nodes: nodes.len(),
                        failed_predicates,
                    }
                    .into())
                }
                Decision::Fail(message) => Err(SchedulerError::Config(message)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SchedulerCache;
    use crate::predicates::{MatchNodeSelector, PodFitsResources};
    use crate::priorities::LeastRequested;
    use capsim_core::{Container, Node, ResourceList, WorkloadUid};

    fn scheduler() -> GenericScheduler {
        GenericScheduler::new(
            vec![
                PredicateConfig {
                    name: "PodFitsResources".into(),
                    predicate: Arc::new(PodFitsResources),
                },
                PredicateConfig {
                    name: "MatchNodeSelector".into(),
                    predicate: Arc::new(MatchNodeSelector),
                },
            ],
            vec![PriorityConfig {
                name: "LeastRequestedPriority".into(),
                function: Arc::new(LeastRequested),
                weight: 1,
            }],
        )
    }

    fn node(name: &str, cpu: i64) -> Node {
        Node::new(
            name,
            ResourceList::new().with("cpu", cpu).with("memory", 1 << 30),
        )
    }

    fn workload(name: &str, cpu: i64) -> Workload {
        Workload::new(WorkloadUid::deterministic(name, 0), name, "default")
            .with_container(Container::new("c", ResourceList::new().with("cpu", cpu)))
    }

    #[test]
    fn picks_least_requested_node() {
        let cache = SchedulerCache::new();
        cache.upsert_node(node("a", 1000));
        cache.upsert_node(node("b", 4000));

        let host = scheduler().schedule(&workload("w", 500), &cache).unwrap();
        assert_eq!(host, "b");
    }

    #[test]
    fn ties_go_to_first_node_name() {
        let cache = SchedulerCache::new();
        cache.upsert_node(node("b", 1000));
        cache.upsert_node(node("a", 1000));

        let host = scheduler().schedule(&workload("w", 100), &cache).unwrap();
        assert_eq!(host, "a");
    }

    #[test]
    fn no_nodes_is_unschedulable() {
        let cache = SchedulerCache::new();
        let err = scheduler().schedule(&workload("w", 1), &cache).unwrap_err();
        assert!(matches!(err, SchedulerError::NoNodesAvailable));
        assert!(err.is_unschedulable());
    }

    #[test]
    fn fit_error_stops_at_first_failing_predicate() {
        let cache = SchedulerCache::new();
        cache.upsert_node(node("a", 100).with_label("disk", "hdd"));

        let w = workload("w", 500).with_node_selector("disk", "ssd");
        let err = scheduler().schedule(&w, &cache).unwrap_err();
        assert_eq!(
            err.to_string(),
            "0/1 nodes are available: 1 Insufficient cpu."
        );

        let all = scheduler().with_always_check_all_predicates(true);
        let err = all.schedule(&w, &cache).unwrap_err();
        assert_eq!(
            err.to_string(),
            "0/1 nodes are available: 1 Insufficient cpu, 1 node(s) didn't match node selector."
        );
    }

    #[test]
    fn partial_search_bounds() {
        let s = scheduler().with_percentage_of_nodes_to_score(10);
        assert_eq!(s.num_feasible_nodes_to_find(50), 50);
        assert_eq!(s.num_feasible_nodes_to_find(500), 100);
        assert_eq!(s.num_feasible_nodes_to_find(5000), 500);
    }
}
