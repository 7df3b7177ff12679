//! Event-driven workload scheduler for capsim.
//!
//! This crate provides the scheduling side of a simulation. A
//! [`SchedulerService`] watches nodes and workloads through the control-plane
//! emulator and places every new workload using a filter-then-score
//! [`GenericScheduler`] assembled from the [`AlgorithmRegistry`]. It handles:
//!
//! - Cache maintenance from list-then-watch streams
//! - Fit predicates (cordoned nodes, resources, node selectors)
//! - Weighted priorities (least requested, most requested, balanced)
//! - Reporting decisions through [`Binder`] and [`PodConditionUpdater`]
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   ControlPlaneEmulator                           │
//! └─────────────────────────────────────────────────────────────────┘
//!                  │ node watch            │ workload watch
//!                  ▼                       ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     SchedulerService                             │
//! │  ┌─────────────┐ ┌──────────────────┐ ┌─────────────────────┐  │
//! │  │  Scheduler  │ │ GenericScheduler │ │   EventRecorder     │  │
//! │  │  Cache      │ │ predicates +     │ │                     │  │
//! │  │             │ │ priorities       │ │                     │  │
//! │  └─────────────┘ └──────────────────┘ └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!                  │ bind                  │ update
//!                  ▼                       ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │               Binder / PodConditionUpdater                       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use capsim_core::{Container, Node, ResourceList, Workload, WorkloadUid};
//! use capsim_scheduler::{AlgorithmRegistry, ScheduleAlgorithm, SchedulerCache, SchedulerConfig};
//!
//! let algorithm = AlgorithmRegistry::with_defaults()
//!     .unwrap()
//!     .build(&SchedulerConfig::default())
//!     .unwrap();
//!
//! let cache = SchedulerCache::new();
//! cache.upsert_node(Node::new("node-1", ResourceList::new().with("cpu", 1000)));
//!
//! let workload = Workload::new(WorkloadUid::generate(), "web", "default")
//!     .with_container(Container::new("app", ResourceList::new().with("cpu", 600)));
//!
//! assert_eq!(algorithm.schedule(&workload, &cache).unwrap(), "node-1");
//! ```
//!
//! # Testing
//!
//! Enable the `test-utils` feature for [`MockAlgorithm`], which answers every
//! workload with a scripted decision.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod algorithm;
pub mod binder;
pub mod cache;
pub mod error;
pub mod predicates;
pub mod priorities;
pub mod recorder;
pub mod registry;
pub mod service;
pub mod types;

pub use algorithm::{GenericScheduler, NodeLister, PredicateConfig, PriorityConfig, ScheduleAlgorithm};
pub use binder::{Binder, PodConditionUpdater};
pub use cache::{NodeInfo, SchedulerCache};
pub use error::{FitError, Result, SchedulerError, NO_NODE_AVAILABLE};
pub use recorder::{ChannelRecorder, Event, EventRecorder, EventType};
pub use registry::{AlgorithmProvider, AlgorithmRegistry};
pub use service::{SchedulerHandle, SchedulerService, REASON_BINDING_REJECTED, REASON_SCHEDULER_ERROR};
pub use types::{SchedulerConfig, CLUSTER_AUTOSCALER_PROVIDER, DEFAULT_PROVIDER};

#[cfg(any(test, feature = "test-utils"))]
pub use algorithm::mock::{Decision as MockDecision, MockAlgorithm};
