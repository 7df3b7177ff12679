//! The review report.
//!
//! A [`ReviewReport`] is derived from a [`SimulationStatus`] and never changes
//! it. Each category (`success`, `failed`, `scheduled`) carries the requested
//! resources of its workloads and a per-workload result; rejected workloads
//! are additionally grouped by failure type, the leading clause of the
//! scheduler's message up to its first colon.

use std::collections::BTreeMap;

use capsim_core::{is_scalar_resource_name, Workload, RESOURCE_CPU, RESOURCE_GPU, RESOURCE_MEMORY};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::SimulationStatus;

/// Category of workloads the simulation placed.
pub const CATEGORY_SUCCESS: &str = "success";
/// Category of workloads the simulation could not place.
pub const CATEGORY_FAILED: &str = "failed";
/// Category of workloads already running before the simulation.
pub const CATEGORY_SCHEDULED: &str = "scheduled";

/// Failure type reported for the end of the run itself.
pub const FAIL_TYPE_STOPPED: &str = "Stopped";

/// Requested resources of one workload, summed over its containers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    /// CPU in millicores.
    pub milli_cpu: i64,
    /// Memory in bytes.
    pub memory: i64,
    /// GPUs.
    pub gpu: i64,
    /// Extended resources, by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scalar: BTreeMap<String, i64>,
}

impl Resources {
    /// Sum the requests of every container of `workload`.
    #[must_use]
    pub fn of(workload: &Workload) -> Self {
        let mut resources = Self::default();
        for container in &workload.containers {
            for (name, amount) in container.requests.iter() {
                match name {
                    RESOURCE_CPU => resources.milli_cpu = resources.milli_cpu.saturating_add(amount),
                    RESOURCE_MEMORY => resources.memory = resources.memory.saturating_add(amount),
                    RESOURCE_GPU => resources.gpu = resources.gpu.saturating_add(amount),
                    _ if is_scalar_resource_name(name) => {
                        let entry = resources.scalar.entry(name.to_string()).or_insert(0);
                        *entry = entry.saturating_add(amount);
                    }
                    _ => {}
                }
            }
        }
        resources
    }
}

/// What one workload asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    /// Workload name.
    pub name: String,
    /// Requested resources.
    pub resources: Resources,
    /// Required node labels.
    #[serde(default)]
    pub node_selectors: BTreeMap<String, String>,
}

/// The workloads of a category and their requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSpec {
    /// The workloads, in decision order.
    pub workloads: Vec<Workload>,
    /// Requirements, one per workload.
    pub requirements: Vec<Requirements>,
}

/// Outcome of one workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadReviewResult {
    /// Workload UID.
    pub uid: String,
    /// Workload name.
    pub name: String,
    /// Node the workload runs on, if bound.
    pub host: Option<String>,
    /// Rejection message, if rejected.
    pub reason: Option<String>,
    /// Requested resources.
    pub resources: Resources,
}

/// Per-workload outcomes of a category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStatus {
    /// One result per workload.
    pub workloads: Vec<WorkloadReviewResult>,
    /// Rejected workloads grouped by failure type.
    pub reason_summary: BTreeMap<String, Vec<WorkloadReviewResult>>,
}

/// Review of one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterCapacityReview {
    /// What was asked for.
    pub spec: ReviewSpec,
    /// What happened.
    pub status: ReviewStatus,
}

/// A failure message split into type and detail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailReason {
    /// Coarse failure type.
    pub fail_type: String,
    /// The rest of the message.
    pub fail_message: String,
}

/// The full report of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewReport {
    /// Review per category.
    pub review: BTreeMap<String, ClusterCapacityReview>,
    /// Why the run stopped.
    pub fail_reason: FailReason,
    /// When the report was built.
    pub created_at: DateTime<Utc>,
}

impl ReviewReport {
    /// Review of `category`, if present.
    #[must_use]
    pub fn category(&self, category: &str) -> Option<&ClusterCapacityReview> {
        self.review.get(category)
    }

    /// Results of the placed workloads.
    #[must_use]
    pub fn successful(&self) -> &[WorkloadReviewResult] {
        self.results(CATEGORY_SUCCESS)
    }

    /// Results of the rejected workloads.
    #[must_use]
    pub fn failed(&self) -> &[WorkloadReviewResult] {
        self.results(CATEGORY_FAILED)
    }

    /// Results of the workloads that were already running.
    #[must_use]
    pub fn scheduled(&self) -> &[WorkloadReviewResult] {
        self.results(CATEGORY_SCHEDULED)
    }

    fn results(&self, category: &str) -> &[WorkloadReviewResult] {
        self.category(category)
            .map_or(&[], |review| review.status.workloads.as_slice())
    }
}

/// Split a failure message at the first colon of its first line.
///
/// `"0/3 nodes are available: 3 Insufficient cpu."` becomes type
/// `0/3 nodes are available` with detail `3 Insufficient cpu.`. A line without
/// a colon is all type.
#[must_use]
pub fn parse_fail_reason(message: &str) -> FailReason {
    let line = message.lines().next().unwrap_or_default();
    match line.split_once(':') {
        Some((fail_type, detail)) => FailReason {
            fail_type: fail_type.to_string(),
            fail_message: detail.trim().to_string(),
        },
        None => FailReason {
            fail_type: line.to_string(),
            fail_message: String::new(),
        },
    }
}

fn requirements(workload: &Workload) -> Requirements {
    Requirements {
        name: workload.name.clone(),
        resources: Resources::of(workload),
        node_selectors: workload.node_selector.clone(),
    }
}

fn result(workload: &Workload) -> WorkloadReviewResult {
    WorkloadReviewResult {
        uid: workload.uid.to_string(),
        name: workload.name.clone(),
        host: workload.node_name.clone(),
        reason: workload.placement.rejection().map(str::to_string),
        resources: Resources::of(workload),
    }
}

fn review(workloads: &[Workload]) -> ClusterCapacityReview {
    let results: Vec<WorkloadReviewResult> = workloads.iter().map(result).collect();

    let mut reason_summary: BTreeMap<String, Vec<WorkloadReviewResult>> = BTreeMap::new();
    for result in &results {
        if let Some(reason) = &result.reason {
            reason_summary
                .entry(parse_fail_reason(reason).fail_type)
                .or_default()
                .push(result.clone());
        }
    }

    ClusterCapacityReview {
        spec: ReviewSpec {
            workloads: workloads.to_vec(),
            requirements: workloads.iter().map(requirements).collect(),
        },
        status: ReviewStatus {
            workloads: results,
            reason_summary,
        },
    }
}

/// Build the report of `status`, stamped with `created_at`.
#[must_use]
pub fn build_report_at(status: &SimulationStatus, created_at: DateTime<Utc>) -> ReviewReport {
    let mut review_map = BTreeMap::new();
    review_map.insert(CATEGORY_SUCCESS.to_string(), review(&status.successful));
    review_map.insert(CATEGORY_FAILED.to_string(), review(&status.failed));
    review_map.insert(CATEGORY_SCHEDULED.to_string(), review(&status.pre_existing));

    ReviewReport {
        review: review_map,
        fail_reason: FailReason {
            fail_type: FAIL_TYPE_STOPPED.to_string(),
            fail_message: status.stop_reason.clone().unwrap_or_default(),
        },
        created_at,
    }
}

/// Build the report of `status`, stamped now.
#[must_use]
pub fn build_report(status: &SimulationStatus) -> ReviewReport {
    build_report_at(status, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use capsim_core::{Container, ResourceList, WorkloadUid};

    fn workload(name: &str) -> Workload {
        Workload::new(WorkloadUid::deterministic(name, 0), name, "default")
            .with_container(Container::new(
                "a",
                ResourceList::new()
                    .with("cpu", 600)
                    .with("memory", 400 << 20)
                    .with("nvidia.com/gpu", 1)
                    .with("example.com/foo", 2),
            ))
            .with_container(Container::new(
                "b",
                ResourceList::new()
                    .with("cpu", 150)
                    .with("example.com/foo", 3)
                    .with("ephemeral-storage", 1 << 20),
            ))
    }

    fn status() -> SimulationStatus {
        let mut rejected = workload("rejected").with_node_selector("disk", "ssd");
        rejected.reject("0/2 nodes are available: 2 Insufficient cpu.");
        SimulationStatus {
            successful: vec![workload("placed").on_node("n1")],
            failed: vec![rejected],
            pre_existing: vec![workload("running").on_node("n2")],
            stop_reason: Some("Unschedulable: 0/2 nodes are available: 2 Insufficient cpu.".into()),
        }
    }

    #[test]
    fn resources_sum_every_container_exactly() {
        let resources = Resources::of(&workload("w"));
        assert_eq!(resources.milli_cpu, 750);
        assert_eq!(resources.memory, 400 << 20);
        assert_eq!(resources.gpu, 1);
        assert_eq!(resources.scalar.get("example.com/foo"), Some(&5));
        assert!(!resources.scalar.contains_key("ephemeral-storage"));
    }

    #[test]
    fn workload_without_containers_requests_nothing() {
        let empty = Workload::new(WorkloadUid::deterministic("e", 0), "e", "default");
        assert_eq!(Resources::of(&empty), Resources::default());
    }

    #[test]
    fn parse_fail_reason_splits_first_line_at_first_colon() {
        let reason = parse_fail_reason("0/3 nodes are available: 3 Insufficient cpu.\nmore: text");
        assert_eq!(reason.fail_type, "0/3 nodes are available");
        assert_eq!(reason.fail_message, "3 Insufficient cpu.");

        let reason = parse_fail_reason("no colon here");
        assert_eq!(reason.fail_type, "no colon here");
        assert_eq!(reason.fail_message, "");

        assert_eq!(parse_fail_reason(""), FailReason::default());
    }

    #[test]
    fn report_partitions_categories() {
        let report = build_report(&status());
        assert_eq!(report.successful().len(), 1);
        assert_eq!(report.successful()[0].host.as_deref(), Some("n1"));
        assert_eq!(report.scheduled()[0].name, "running");

        let failed = report.category(CATEGORY_FAILED).unwrap();
        assert_eq!(failed.spec.requirements[0].node_selectors.get("disk").map(String::as_str), Some("ssd"));
        assert_eq!(
            failed.status.reason_summary["0/2 nodes are available"].len(),
            1
        );
        assert!(report.category(CATEGORY_SUCCESS).unwrap().status.reason_summary.is_empty());

        assert_eq!(report.fail_reason.fail_type, FAIL_TYPE_STOPPED);
        assert!(report.fail_reason.fail_message.starts_with("Unschedulable"));
    }

    #[test]
    fn building_is_pure() {
        let status = status();
        let before = status.clone();
        let at = Utc::now();

        let first = build_report_at(&status, at);
        let second = build_report_at(&status, at);
        assert_eq!(first, second);
        assert_eq!(status, before);
    }

    #[test]
    fn empty_status_still_has_every_category() {
        let report = build_report(&SimulationStatus::default());
        assert_eq!(report.review.len(), 3);
        assert!(report.failed().is_empty());
        assert_eq!(report.fail_reason.fail_message, "");
    }

    #[test]
    fn report_serializes() {
        let report = build_report(&status());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["fail_reason"]["fail_type"], "Stopped");
        assert_eq!(json["review"]["success"]["status"]["workloads"][0]["host"], "n1");
    }
}
