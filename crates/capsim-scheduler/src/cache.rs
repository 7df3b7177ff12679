//! Scheduler cache of node usage.
//!
//! The cache is fed by watch events only. It tracks every node and, for each
//! node, the summed requests of the workloads assigned to it, so predicates
//! and priorities see capacity already taken by earlier placements.

use std::collections::{BTreeMap, HashMap};

use capsim_core::{Node, ResourceList, Workload, RESOURCE_CPU, RESOURCE_MEMORY};
use capsim_store::{ChangeType, Object, WatchEvent};
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::algorithm::NodeLister;
use crate::Result;

/// CPU assumed for a workload that requests none, when scoring.
pub const DEFAULT_MILLI_CPU_REQUEST: i64 = 100;
/// Memory assumed for a workload that requests none, when scoring.
pub const DEFAULT_MEMORY_REQUEST: i64 = 200 * 1024 * 1024;

/// Requests used for scoring, substituting defaults for zero cpu and memory.
#[must_use]
pub fn non_zero_requests(requests: &ResourceList) -> ResourceList {
    let cpu = match requests.cpu_millis() {
        0 => DEFAULT_MILLI_CPU_REQUEST,
        cpu => cpu,
    };
    let memory = match requests.memory_bytes() {
        0 => DEFAULT_MEMORY_REQUEST,
        memory => memory,
    };
    ResourceList::new()
        .with(RESOURCE_CPU, cpu)
        .with(RESOURCE_MEMORY, memory)
}

/// A node together with what is already placed on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    /// The node as declared.
    pub node: Node,
    /// Sum of the requests of the workloads on the node.
    pub requested: ResourceList,
    /// Sum of the scoring requests of the workloads on the node.
    pub non_zero_requested: ResourceList,
    /// Number of workloads on the node.
    pub pod_count: i64,
}

impl NodeInfo {
    /// A node with nothing placed on it.
    #[must_use]
    pub fn new(node: Node) -> Self {
        Self {
            node,
            requested: ResourceList::new(),
            non_zero_requested: ResourceList::new(),
            pod_count: 0,
        }
    }

    /// Account a workload's requests on this node.
    pub fn add_workload(&mut self, requests: &ResourceList) {
        self.requested.add(requests);
        self.non_zero_requested.add(&non_zero_requests(requests));
        self.pod_count += 1;
    }

    /// Name of the node.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.node.name
    }
}

#[derive(Debug, Clone)]
struct Assignment {
    host: String,
    requests: ResourceList,
}

#[derive(Debug, Default)]
struct Usage {
    requested: ResourceList,
    non_zero_requested: ResourceList,
    pod_count: i64,
}

#[derive(Debug, Default)]
struct CacheState {
    nodes: BTreeMap<String, Node>,
    usage: HashMap<String, Usage>,
    assigned: HashMap<String, Assignment>,
}

impl CacheState {
    fn assign(&mut self, key: String, host: &str, requests: ResourceList) {
        if let Some(previous) = self.assigned.get(&key) {
            if previous.host == host && previous.requests == requests {
                return;
            }
            self.unassign(&key);
        }

        let usage = self.usage.entry(host.to_string()).or_default();
        usage.requested.add(&requests);
        usage.non_zero_requested.add(&non_zero_requests(&requests));
        usage.pod_count += 1;

        self.assigned.insert(
            key,
            Assignment {
                host: host.to_string(),
                requests,
            },
        );
    }

    fn unassign(&mut self, key: &str) {
        let Some(assignment) = self.assigned.remove(key) else {
            return;
        };
        if let Some(usage) = self.usage.get_mut(&assignment.host) {
            usage.requested.subtract(&assignment.requests);
            usage
                .non_zero_requested
                .subtract(&non_zero_requests(&assignment.requests));
            usage.pod_count -= 1;
        }
    }

    fn node_info(&self, node: &Node) -> NodeInfo {
        match self.usage.get(&node.name) {
            Some(usage) => NodeInfo {
                node: node.clone(),
                requested: usage.requested.clone(),
                non_zero_requested: usage.non_zero_requested.clone(),
                pod_count: usage.pod_count,
            },
            None => NodeInfo::new(node.clone()),
        }
    }
}

/// A cache of nodes and their usage, fed by watch events.
#[derive(Debug, Default)]
pub struct SchedulerCache {
    state: RwLock<CacheState>,
}

impl SchedulerCache {
    /// Create a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a watch event of either kind.
    pub fn apply(&self, event: &WatchEvent) {
        trace!(kind = %event.kind, change = ?event.change, sequence = event.sequence, "Applying watch event");
        match (&event.object, event.change) {
            (Object::Node(node), ChangeType::Added | ChangeType::Modified) => {
                self.upsert_node(node.clone());
            }
            (Object::Node(node), ChangeType::Deleted) => self.remove_node(&node.name),
            (Object::Workload(workload), ChangeType::Added | ChangeType::Modified) => {
                self.observe_workload(workload);
            }
            (Object::Workload(workload), ChangeType::Deleted) => {
                self.state.write().unassign(&workload.key().to_string());
            }
        }
    }

    /// Insert or replace a node, keeping its usage.
    pub fn upsert_node(&self, node: Node) {
        debug!(node = %node.name, "Caching node");
        self.state.write().nodes.insert(node.name.clone(), node);
    }

    /// Remove a node.
    pub fn remove_node(&self, name: &str) {
        self.state.write().nodes.remove(name);
    }

    /// Track a workload: account it on its node if assigned, release it otherwise.
    pub fn observe_workload(&self, workload: &Workload) {
        let key = workload.key().to_string();
        let mut state = self.state.write();
        match &workload.node_name {
            Some(host) => state.assign(key, host, workload.total_requests()),
            None => state.unassign(&key),
        }
    }

    /// Account a workload on `host` ahead of the watch event confirming it.
    pub fn assume(&self, workload: &Workload, host: &str) {
        self.state
            .write()
            .assign(workload.key().to_string(), host, workload.total_requests());
    }

    /// Drop an assumption that did not go through.
    pub fn forget(&self, workload: &Workload) {
        self.state.write().unassign(&workload.key().to_string());
    }

    /// Usage snapshot of one node.
    #[must_use]
    pub fn node_info(&self, name: &str) -> Option<NodeInfo> {
        let state = self.state.read();
        state.nodes.get(name).map(|node| state.node_info(node))
    }

    /// Number of cached nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.state.read().nodes.len()
    }

    /// Number of workloads accounted on some node.
    #[must_use]
    pub fn assigned_count(&self) -> usize {
        self.state.read().assigned.len()
    }
}

impl NodeLister for SchedulerCache {
    fn list(&self) -> Result<Vec<NodeInfo>> {
        let state = self.state.read();
        Ok(state.nodes.values().map(|node| state.node_info(node)).collect())
    }
}
