//! Fit predicates.
//!
//! A predicate decides whether a workload fits a node and, if not, reports the
//! reasons. Reason strings are the ones the upstream Kubernetes scheduler uses,
//! since they end up verbatim in simulation reports.

use capsim_core::{
    is_scalar_resource_name, Workload, RESOURCE_CPU, RESOURCE_EPHEMERAL_STORAGE, RESOURCE_GPU,
    RESOURCE_MEMORY, RESOURCE_PODS,
};

use crate::cache::NodeInfo;

/// Registered name of [`CheckNodeUnschedulable`].
pub const CHECK_NODE_UNSCHEDULABLE: &str = "CheckNodeUnschedulable";
/// Registered name of [`PodFitsResources`].
pub const POD_FITS_RESOURCES: &str = "PodFitsResources";
/// Registered name of [`MatchNodeSelector`].
pub const MATCH_NODE_SELECTOR: &str = "MatchNodeSelector";

/// Reason reported by [`MatchNodeSelector`].
pub const REASON_NODE_SELECTOR_NOT_MATCH: &str = "node(s) didn't match node selector";
/// Reason reported by [`CheckNodeUnschedulable`].
pub const REASON_NODE_UNSCHEDULABLE: &str = "node(s) were unschedulable";

/// Reason reported when a node lacks `resource`.
#[must_use]
pub fn insufficient(resource: &str) -> String {
    format!("Insufficient {resource}")
}

/// Decides whether a workload fits a node.
pub trait FitPredicate: Send + Sync {
    /// Reasons the workload does not fit; empty when it fits.
    fn check(&self, workload: &Workload, node: &NodeInfo) -> Vec<String>;
}

/// Rejects cordoned nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckNodeUnschedulable;

impl FitPredicate for CheckNodeUnschedulable {
    fn check(&self, _workload: &Workload, node: &NodeInfo) -> Vec<String> {
        if node.node.unschedulable {
            vec![REASON_NODE_UNSCHEDULABLE.to_string()]
        } else {
            Vec::new()
        }
    }
}

/// Requires every node-selector label to be present on the node.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchNodeSelector;

impl FitPredicate for MatchNodeSelector {
    fn check(&self, workload: &Workload, node: &NodeInfo) -> Vec<String> {
        if node.node.matches_selector(&workload.node_selector) {
            Vec::new()
        } else {
            vec![REASON_NODE_SELECTOR_NOT_MATCH.to_string()]
        }
    }
}

/// Requires the node's remaining allocatable resources to cover the
/// workload's requests, and a free pod slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct PodFitsResources;

impl FitPredicate for PodFitsResources {
    fn check(&self, workload: &Workload, node: &NodeInfo) -> Vec<String> {
        let mut reasons = Vec::new();

        if let Some(allowed) = node.node.allowed_pod_number() {
            if node.pod_count + 1 > allowed {
                reasons.push(insufficient(RESOURCE_PODS));
            }
        }

        let request = workload.total_requests();
        if request.iter().all(|(_, amount)| amount == 0) {
            return reasons;
        }

        let allocatable = &node.node.allocatable;
        let exceeds = |name: &str| {
            allocatable.get(name) < request.get(name).saturating_add(node.requested.get(name))
        };

        for name in [
            RESOURCE_CPU,
            RESOURCE_MEMORY,
            RESOURCE_GPU,
            RESOURCE_EPHEMERAL_STORAGE,
        ] {
            if exceeds(name) {
                reasons.push(insufficient(name));
            }
        }

        for (name, amount) in request.iter() {
            if name == RESOURCE_GPU || !is_scalar_resource_name(name) || amount == 0 {
                continue;
            }
            if exceeds(name) {
                reasons.push(insufficient(name));
            }
        }

        reasons
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capsim_core::{Container, Node, ResourceList, WorkloadUid};

    fn node_info(allocatable: ResourceList) -> NodeInfo {
        NodeInfo::new(Node::new("n1", allocatable))
    }

    fn workload(requests: ResourceList) -> Workload {
        Workload::new(WorkloadUid::deterministic("w", 0), "w", "default")
            .with_container(Container::new("c", requests))
    }

    #[test]
    fn resources_fit_on_empty_node() {
        let info = node_info(ResourceList::new().with("cpu", 1000).with("memory", 1 << 30));
        let w = workload(ResourceList::new().with("cpu", 600).with("memory", 400 << 20));
        assert!(PodFitsResources.check(&w, &info).is_empty());
    }

    #[test]
    fn resources_account_existing_usage() {
        let mut info = node_info(ResourceList::new().with("cpu", 1000).with("memory", 1 << 30));
        let w = workload(ResourceList::new().with("cpu", 600).with("memory", 400 << 20));
        info.add_workload(&w.total_requests());

        assert_eq!(PodFitsResources.check(&w, &info), vec!["Insufficient cpu"]);
    }

    #[test]
    fn scalar_resources_and_pod_slots() {
        let info = node_info(ResourceList::new().with("cpu", 1000).with("pods", 0));
        let w = workload(
            ResourceList::new()
                .with("cpu", 100)
                .with("example.com/foo", 1)
                .with("nvidia.com/gpu", 1),
        );

        assert_eq!(
            PodFitsResources.check(&w, &info),
            vec![
                "Insufficient pods",
                "Insufficient nvidia.com/gpu",
                "Insufficient example.com/foo",
            ]
        );
    }

    #[test]
    fn zero_request_only_checks_pod_slots() {
        let info = node_info(ResourceList::new());
        let w = workload(ResourceList::new());
        assert!(PodFitsResources.check(&w, &info).is_empty());
    }

    #[test]
    fn selector_and_unschedulable() {
        let info = NodeInfo::new(Node::new("n1", ResourceList::new()).with_label("disk", "ssd"));
        let ssd = workload(ResourceList::new()).with_node_selector("disk", "ssd");
        let hdd = workload(ResourceList::new()).with_node_selector("disk", "hdd");

        assert!(MatchNodeSelector.check(&ssd, &info).is_empty());
        assert_eq!(
            MatchNodeSelector.check(&hdd, &info),
            vec![REASON_NODE_SELECTOR_NOT_MATCH]
        );

        let cordoned = NodeInfo::new(Node::new("n2", ResourceList::new()).cordoned());
        assert_eq!(
            CheckNodeUnschedulable.check(&ssd, &cordoned),
            vec![REASON_NODE_UNSCHEDULABLE]
        );
        assert!(CheckNodeUnschedulable.check(&ssd, &info).is_empty());
    }
}
