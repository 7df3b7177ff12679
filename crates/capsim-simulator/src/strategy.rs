//! Capacity accounting.
//!
//! After every bind the strategy charges the workload's requests against the
//! node's remaining headroom and writes the bound workload back through the
//! store, so the scheduler observes the reduced capacity before the next
//! admission. Workloads already running when the simulation starts are
//! seeded the same way, except that a snapshot which overcommits a node is
//! tolerated and leaves that node's headroom at zero.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use capsim_core::{Node, ResourceList, Workload, WorkloadUid, RESOURCE_PODS};
use capsim_store::Store;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{Result, SimulationError};

/// Folds placed workloads into the tracked cluster state.
pub trait CapacityStrategy: Send + Sync {
    /// Account a workload that is bound to a node.
    ///
    /// Applying the same UID twice leaves the headroom unchanged.
    ///
    /// # Errors
    ///
    /// Returns an accounting error if the workload has no host, names an
    /// unknown node, or asks for more than the node has left; returns a store
    /// error if the workload cannot be written back.
    fn apply(&self, workload: &Workload) -> Result<()>;

    /// Account a workload that was already running before the simulation.
    ///
    /// Unlike [`apply`](Self::apply), requests beyond the node's headroom are
    /// logged and charged down to zero instead of failing.
    ///
    /// # Errors
    ///
    /// Returns an accounting error if the workload has no host or names an
    /// unknown node; returns a store error if it cannot be written back.
    fn seed(&self, workload: &Workload) -> Result<()>;

    /// Remaining headroom of `node`, once it has been charged at least once.
    fn headroom(&self, node: &str) -> Option<ResourceList>;
}

#[derive(Default)]
struct Ledger {
    headroom: HashMap<String, ResourceList>,
    applied: HashSet<WorkloadUid>,
}

/// Strategy tracking headroom from each node's declared allocatable resources.
pub struct PredictiveStrategy {
    store: Arc<dyn Store>,
    ledger: Mutex<Ledger>,
}

impl PredictiveStrategy {
    /// Create a strategy writing through `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// Number of workloads accounted so far.
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.ledger.lock().applied.len()
    }

    fn charge(node: &Node, workload: &Workload) -> ResourceList {
        let mut charge = workload.total_requests();
        if node.allowed_pod_number().is_some() {
            charge.insert(RESOURCE_PODS, 1);
        }
        charge
    }

    fn write_back(&self, workload: &Workload) -> Result<()> {
        let key = workload.key();
        if self.store.get_workload(&key)?.is_some() {
            self.store.update(workload.clone().into())?;
        } else {
            self.store.add(workload.clone().into())?;
        }
        Ok(())
    }
}

impl PredictiveStrategy {
    fn account(&self, workload: &Workload, tolerate_overcommit: bool) -> Result<()> {
        let key = workload.key();
        let mut ledger = self.ledger.lock();
        if ledger.applied.contains(&workload.uid) {
            debug!(workload = %key, "Workload already accounted");
            return Ok(());
        }

        let host = workload
            .node_name
            .clone()
            .ok_or_else(|| SimulationError::MissingHost(key.clone()))?;
        let node = self
            .store
            .get_node(&host)?
            .ok_or_else(|| SimulationError::UnknownNode {
                workload: key.clone(),
                node: host.clone(),
            })?;

        let charge = Self::charge(&node, workload);
        let headroom = ledger
            .headroom
            .entry(host.clone())
            .or_insert_with(|| node.allocatable.clone());

        let short: Vec<String> = charge
            .exceeding(headroom)
            .into_iter()
            .map(str::to_string)
            .collect();
        if !short.is_empty() && tolerate_overcommit {
            warn!(
                workload = %key,
                node = %host,
                resources = ?short,
                "Running workload overcommits node"
            );
        } else if !short.is_empty() {
            return Err(SimulationError::InsufficientHeadroom {
                workload: key,
                node: host,
                resources: short,
            });
        }

        self.write_back(workload)?;
        headroom.subtract(&charge);
        ledger.applied.insert(workload.uid.clone());

        debug!(
            workload = %key,
            node = %host,
            cpu = charge.cpu_millis(),
            memory = charge.memory_bytes(),
            "Accounted workload"
        );
        Ok(())
    }
}

impl CapacityStrategy for PredictiveStrategy {
    fn apply(&self, workload: &Workload) -> Result<()> {
        self.account(workload, false)
    }

    fn seed(&self, workload: &Workload) -> Result<()> {
        self.account(workload, true)
    }

    fn headroom(&self, node: &str) -> Option<ResourceList> {
        self.ledger.lock().headroom.get(node).cloned()
    }
}
