//! Cluster capacity simulation for capsim.
//!
//! This crate drives a scheduler over a fixed cluster snapshot and reports
//! which candidate workloads it would place, where, and why the rest would
//! fail. It handles:
//!
//! - Single admission: exactly one undecided workload is visible at a time
//! - Capacity accounting after every bind
//! - Idempotent shutdown from any of the paths that end a run
//! - The review report over successful, failed and pre-existing workloads
//!
//! # Example
//!
//! ```no_run
//! use capsim_core::{Container, Node, ResourceList, Workload, WorkloadUid};
//! use capsim_scheduler::AlgorithmRegistry;
//! use capsim_simulator::{Simulation, SimulationConfig, SimulationInput};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = AlgorithmRegistry::with_defaults()?;
//! let input = SimulationInput {
//!     nodes: vec![Node::new(
//!         "node-1",
//!         ResourceList::parse([("cpu", "1"), ("memory", "1Gi")])?,
//!     )],
//!     workloads: (0..2)
//!         .map(|i| {
//!             let uid = WorkloadUid::deterministic("web", i);
//!             Workload::new(uid.clone(), uid.as_str(), "default").with_container(Container::new(
//!                 "app",
//!                 ResourceList::parse([("cpu", "600m"), ("memory", "400Mi")]).unwrap(),
//!             ))
//!         })
//!         .collect(),
//!     pre_existing: Vec::new(),
//! };
//!
//! let simulation = Simulation::new(input, SimulationConfig::default(), &registry)?;
//! simulation.run().await?;
//!
//! if let Some(report) = simulation.report() {
//!     println!("placed {} workloads", report.successful().len());
//!     println!("stopped: {}", report.fail_reason.fail_message);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod controller;
pub mod error;
pub mod queue;
pub mod report;
pub mod shutdown;
pub mod status;
pub mod strategy;

pub use config::SimulationConfig;
pub use controller::{Simulation, SimulationCallbacks, SimulationInput, SimulationState};
pub use error::{Result, SimulationError};
pub use queue::AdmissionQueue;
pub use report::{
    build_report, build_report_at, parse_fail_reason, ClusterCapacityReview, FailReason,
    Requirements, Resources, ReviewReport, ReviewSpec, ReviewStatus, WorkloadReviewResult,
    CATEGORY_FAILED, CATEGORY_SCHEDULED, CATEGORY_SUCCESS, FAIL_TYPE_STOPPED,
};
pub use shutdown::ShutdownGuard;
pub use status::{SimulationStatus, STOP_NO_WORKLOADS_REMAIN};
pub use strategy::{CapacityStrategy, PredictiveStrategy};
