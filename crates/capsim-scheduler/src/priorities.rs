//! Priority functions.
//!
//! Each priority scores a feasible node from 0 to [`MAX_PRIORITY`]. The
//! algorithm sums the weighted scores and picks the highest.

use capsim_core::Workload;

use crate::cache::{non_zero_requests, NodeInfo};

/// Highest score a priority function returns.
pub const MAX_PRIORITY: i64 = 10;

/// Registered name of [`LeastRequested`].
pub const LEAST_REQUESTED_PRIORITY: &str = "LeastRequestedPriority";
/// Registered name of [`MostRequested`].
pub const MOST_REQUESTED_PRIORITY: &str = "MostRequestedPriority";
/// Registered name of [`BalancedResourceAllocation`].
pub const BALANCED_RESOURCE_ALLOCATION: &str = "BalancedResourceAllocation";

/// Scores how desirable a node is for a workload.
pub trait PriorityFunction: Send + Sync {
    /// Score in `0..=MAX_PRIORITY`.
    fn score(&self, workload: &Workload, node: &NodeInfo) -> i64;
}

/// Cpu and memory `(requested, allocatable)` pairs, including the workload.
fn requested_and_allocatable(workload: &Workload, node: &NodeInfo) -> [(i64, i64); 2] {
    let request = non_zero_requests(&workload.total_requests());
    let allocatable = &node.node.allocatable;
    [
        (
            node.non_zero_requested.cpu_millis() + request.cpu_millis(),
            allocatable.cpu_millis(),
        ),
        (
            node.non_zero_requested.memory_bytes() + request.memory_bytes(),
            allocatable.memory_bytes(),
        ),
    ]
}

fn unused_score(requested: i64, capacity: i64) -> i64 {
    if capacity == 0 || requested > capacity {
        return 0;
    }
    (capacity - requested) * MAX_PRIORITY / capacity
}

fn used_score(requested: i64, capacity: i64) -> i64 {
    if capacity == 0 || requested > capacity {
        return 0;
    }
    requested * MAX_PRIORITY / capacity
}

/// Favors nodes with the most unrequested cpu and memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastRequested;

impl PriorityFunction for LeastRequested {
    fn score(&self, workload: &Workload, node: &NodeInfo) -> i64 {
        let [(cpu, cpu_cap), (mem, mem_cap)] = requested_and_allocatable(workload, node);
        (unused_score(cpu, cpu_cap) + unused_score(mem, mem_cap)) / 2
    }
}

/// Favors nodes with the most requested cpu and memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct MostRequested;

impl PriorityFunction for MostRequested {
    fn score(&self, workload: &Workload, node: &NodeInfo) -> i64 {
        let [(cpu, cpu_cap), (mem, mem_cap)] = requested_and_allocatable(workload, node);
        (used_score(cpu, cpu_cap) + used_score(mem, mem_cap)) / 2
    }
}

/// Favors nodes whose cpu and memory utilisation stay close to each other.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalancedResourceAllocation;

impl PriorityFunction for BalancedResourceAllocation {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn score(&self, workload: &Workload, node: &NodeInfo) -> i64 {
        let [(cpu, cpu_cap), (mem, mem_cap)] = requested_and_allocatable(workload, node);
        if cpu_cap == 0 || mem_cap == 0 {
            return 0;
        }

        let cpu_fraction = cpu as f64 / cpu_cap as f64;
        let mem_fraction = mem as f64 / mem_cap as f64;
        if cpu_fraction >= 1.0 || mem_fraction >= 1.0 {
            return 0;
        }

        let diff = (cpu_fraction - mem_fraction).abs();
        ((1.0 - diff) * MAX_PRIORITY as f64) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DEFAULT_MEMORY_REQUEST;
    use capsim_core::{Container, Node, ResourceList, WorkloadUid};

    fn info(cpu: i64, memory: i64) -> NodeInfo {
        NodeInfo::new(Node::new(
            "n",
            ResourceList::new().with("cpu", cpu).with("memory", memory),
        ))
    }

    fn workload(cpu: i64, memory: i64) -> Workload {
        Workload::new(WorkloadUid::deterministic("w", 0), "w", "default").with_container(
            Container::new("c", ResourceList::new().with("cpu", cpu).with("memory", memory)),
        )
    }

    #[test]
    fn least_requested_prefers_empty_nodes() {
        let w = workload(500, 512);
        let empty = info(1000, 1024);
        let mut busy = info(1000, 1024);
        busy.add_workload(&w.total_requests());

        assert_eq!(LeastRequested.score(&w, &empty), 5);
        assert_eq!(LeastRequested.score(&w, &busy), 0);
        assert_eq!(MostRequested.score(&w, &empty), 5);
        assert_eq!(MostRequested.score(&w, &busy), 10);
    }

    #[test]
    fn balanced_allocation() {
        assert_eq!(BalancedResourceAllocation.score(&workload(500, 512), &info(1000, 1024)), 10);
        assert_eq!(BalancedResourceAllocation.score(&workload(500, 0), &info(1000, 1 << 40)), 5);
        assert_eq!(BalancedResourceAllocation.score(&workload(1000, 512), &info(1000, 1024)), 0);
        assert_eq!(BalancedResourceAllocation.score(&workload(1, 1), &info(0, 1024)), 0);
    }

    #[test]
    fn zero_requests_use_defaults() {
        let w = workload(0, 0);
        let node = info(200, DEFAULT_MEMORY_REQUEST * 2);
        assert_eq!(LeastRequested.score(&w, &node), 5);
    }
}
