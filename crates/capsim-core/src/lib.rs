//! Core types and utilities for capsim.
//!
//! This crate provides the foundational types used throughout the capsim
//! cluster capacity simulator:
//!
//! - **Identifiers**: workload UIDs and `namespace/name` store keys
//! - **Quantities**: exact parsing of Kubernetes resource quantity strings
//! - **Resources**: canonical resource lists (millicores, bytes, units)
//! - **Model**: workloads, nodes, placement outcomes and pod conditions
//!
//! # Example
//!
//! ```
//! use capsim_core::{Container, Node, ResourceList, Workload, WorkloadUid};
//!
//! let node = Node::new(
//!     "node-1",
//!     ResourceList::parse([("cpu", "1"), ("memory", "1Gi")]).unwrap(),
//! );
//!
//! let workload = Workload::new(WorkloadUid::generate(), "web", "default").with_container(
//!     Container::new(
//!         "app",
//!         ResourceList::parse([("cpu", "600m"), ("memory", "400Mi")]).unwrap(),
//!     ),
//! );
//!
//! assert!(workload.total_requests().cpu_millis() <= node.allocatable.cpu_millis());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod quantity;
pub mod resources;
pub mod types;

pub use error::{CoreError, Result};
pub use ids::{IdError, WorkloadKey, WorkloadUid};
pub use quantity::{format_cpu, format_memory, parse_quantity, Quantity, QuantityError};
pub use resources::{
    canonical_amount, is_scalar_resource_name, ResourceList, RESOURCE_CPU,
    RESOURCE_EPHEMERAL_STORAGE, RESOURCE_GPU, RESOURCE_MEMORY, RESOURCE_PODS,
};
pub use types::{Container, Node, Placement, PodCondition, Workload};
