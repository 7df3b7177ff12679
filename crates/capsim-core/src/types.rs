//! The simulation data model: workloads, nodes and placement outcomes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{WorkloadKey, WorkloadUid};
use crate::resources::{ResourceList, RESOURCE_PODS};

/// A resource-consuming unit of a workload (a container).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    /// Container name.
    pub name: String,
    /// Requested resources in canonical units.
    pub requests: ResourceList,
}

impl Container {
    /// Create a container with the given requests.
    #[must_use]
    pub fn new(name: impl Into<String>, requests: ResourceList) -> Self {
        Self {
            name: name.into(),
            requests,
        }
    }
}

/// Placement outcome of a workload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Placement {
    /// No decision yet.
    #[default]
    Unscheduled,
    /// Placed on `host`.
    Bound {
        /// The node the workload runs on.
        host: String,
    },
    /// No node could accept the workload.
    Rejected {
        /// The scheduler's rejection message.
        reason: String,
    },
}

impl Placement {
    /// The host, if bound.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        match self {
            Self::Bound { host } => Some(host),
            _ => None,
        }
    }

    /// The rejection reason, if rejected.
    #[must_use]
    pub fn rejection(&self) -> Option<&str> {
        match self {
            Self::Rejected { reason } => Some(reason),
            _ => None,
        }
    }
}

/// A pod condition as reported by a scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodCondition {
    /// Condition type, e.g. `PodScheduled`.
    pub condition_type: String,
    /// `True`, `False` or `Unknown`.
    pub status: String,
    /// Machine-readable reason, e.g. `Unschedulable`.
    pub reason: String,
    /// Human-readable message.
    pub message: String,
}

impl PodCondition {
    /// The `PodScheduled` condition type.
    pub const POD_SCHEDULED: &'static str = "PodScheduled";
    /// Condition status `False`.
    pub const CONDITION_FALSE: &'static str = "False";
    /// Condition status `True`.
    pub const CONDITION_TRUE: &'static str = "True";
    /// Reason reported when no node fits a pod.
    pub const REASON_UNSCHEDULABLE: &'static str = "Unschedulable";

    /// Build a `PodScheduled=False` condition.
    #[must_use]
    pub fn unscheduled(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            condition_type: Self::POD_SCHEDULED.to_string(),
            status: Self::CONDITION_FALSE.to_string(),
            reason: reason.into(),
            message: message.into(),
        }
    }

    /// Whether this condition says the pod cannot be placed on any node.
    #[must_use]
    pub fn is_unschedulable(&self) -> bool {
        self.condition_type == Self::POD_SCHEDULED
            && self.status == Self::CONDITION_FALSE
            && self.reason == Self::REASON_UNSCHEDULABLE
    }
}

/// A unit of compute demand to be placed (a pod).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    /// Unique identifier.
    pub uid: WorkloadUid,
    /// Name within the namespace.
    pub name: String,
    /// Namespace.
    pub namespace: String,
    /// Labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Resource-consuming units.
    #[serde(default)]
    pub containers: Vec<Container>,
    /// Node labels the workload requires.
    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,
    /// The node the workload is assigned to, if any.
    #[serde(default)]
    pub node_name: Option<String>,
    /// Placement outcome.
    #[serde(default)]
    pub placement: Placement,
    /// Conditions reported by the scheduler.
    #[serde(default)]
    pub conditions: Vec<PodCondition>,
}

impl Workload {
    /// Create an unscheduled workload with no containers.
    #[must_use]
    pub fn new(uid: WorkloadUid, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            uid,
            name: name.into(),
            namespace: namespace.into(),
            labels: BTreeMap::new(),
            containers: Vec::new(),
            node_selector: BTreeMap::new(),
            node_name: None,
            placement: Placement::Unscheduled,
            conditions: Vec::new(),
        }
    }

    /// Add a container.
    #[must_use]
    pub fn with_container(mut self, container: Container) -> Self {
        self.containers.push(container);
        self
    }

    /// Require a node label.
    #[must_use]
    pub fn with_node_selector(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.node_selector.insert(key.into(), value.into());
        self
    }

    /// Add a label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Mark the workload as already running on `host`.
    #[must_use]
    pub fn on_node(mut self, host: impl Into<String>) -> Self {
        self.bind(host);
        self
    }

    /// The store key.
    #[must_use]
    pub fn key(&self) -> WorkloadKey {
        WorkloadKey::new(&self.namespace, &self.name)
    }

    /// Sum of the requests of all containers.
    #[must_use]
    pub fn total_requests(&self) -> ResourceList {
        let mut total = ResourceList::new();
        for container in &self.containers {
            total.add(&container.requests);
        }
        total
    }

    /// Stamp the workload as running on `host`.
    pub fn bind(&mut self, host: impl Into<String>) {
        let host = host.into();
        self.node_name = Some(host.clone());
        self.placement = Placement::Bound { host };
    }

    /// Stamp the workload as rejected.
    pub fn reject(&mut self, reason: impl Into<String>) {
        self.node_name = None;
        self.placement = Placement::Rejected {
            reason: reason.into(),
        };
    }

    /// Record a condition, replacing any existing condition of the same type.
    pub fn set_condition(&mut self, condition: PodCondition) {
        self.conditions
            .retain(|c| c.condition_type != condition.condition_type);
        self.conditions.push(condition);
    }

    /// Whether the workload is assigned to a node.
    #[must_use]
    pub fn is_assigned(&self) -> bool {
        self.node_name.is_some()
    }
}

/// A unit of cluster capacity.
///
/// Nodes are immutable inputs of a simulation; their declared capacity is never
/// rewritten to account for placements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node name (the store key).
    pub name: String,
    /// Node UID, if known.
    #[serde(default)]
    pub uid: Option<String>,
    /// Node labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Declared capacity.
    pub capacity: ResourceList,
    /// Declared allocatable resources.
    pub allocatable: ResourceList,
    /// Whether the node is cordoned.
    #[serde(default)]
    pub unschedulable: bool,
}

impl Node {
    /// Create a node whose capacity equals its allocatable resources.
    #[must_use]
    pub fn new(name: impl Into<String>, allocatable: ResourceList) -> Self {
        Self {
            name: name.into(),
            uid: None,
            labels: BTreeMap::new(),
            capacity: allocatable.clone(),
            allocatable,
            unschedulable: false,
        }
    }

    /// Add a label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Mark the node as cordoned.
    #[must_use]
    pub fn cordoned(mut self) -> Self {
        self.unschedulable = true;
        self
    }

    /// Maximum number of pods the node accepts, if it declares a limit.
    #[must_use]
    pub fn allowed_pod_number(&self) -> Option<i64> {
        self.allocatable
            .contains(RESOURCE_PODS)
            .then(|| self.allocatable.get(RESOURCE_PODS))
    }

    /// Whether the node's labels satisfy every entry of `selector`.
    #[must_use]
    pub fn matches_selector(&self, selector: &BTreeMap<String, String>) -> bool {
        selector
            .iter()
            .all(|(key, value)| self.labels.get(key) == Some(value))
    }
}
