//! The simulation controller.
//!
//! A [`Simulation`] admits candidate workloads one at a time and waits for the
//! scheduler's decision on each before admitting the next, which turns the
//! asynchronous scheduler into an ordered sequence of placement decisions.
//!
//! # State Machine
//!
//! ```text
//!     ┌──────────┐  run   ┌──────────┐  admit   ┌──────────────────┐
//!     │   Idle   │───────▶│ Running  │─────────▶│ AwaitingDecision │
//!     └──────────┘        └────┬─────┘◀─────────└────────┬─────────┘
//!                              │          bind           │
//!                              │ (queue empty)           │ (unschedulable,
//!                              ▼                         │  accounting failure,
//!                         ┌──────────┐                   │  timeout, shutdown)
//!                         │ Stopped  │◀──────────────────┘
//!                         └──────────┘
//! ```
//!
//! Every path into `Stopped` goes through one guarded shutdown, so the stop
//! reason and the completion signal are produced exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use capsim_core::{Node, Placement, PodCondition, ResourceList, Workload, WorkloadKey};
use capsim_scheduler::{
    AlgorithmRegistry, Binder, ChannelRecorder, EventRecorder, PodConditionUpdater,
    ScheduleAlgorithm, SchedulerError, SchedulerHandle, SchedulerService,
};
use capsim_store::{ControlPlaneEmulator, MemoryStore, Store};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::config::SimulationConfig;
use crate::error::{Result, SimulationError};
use crate::queue::AdmissionQueue;
use crate::report::{build_report, ReviewReport};
use crate::shutdown::ShutdownGuard;
use crate::status::{SimulationStatus, STOP_NO_WORKLOADS_REMAIN};
use crate::strategy::{CapacityStrategy, PredictiveStrategy};

/// The cluster snapshot and candidates of one simulation.
#[derive(Debug, Clone, Default)]
pub struct SimulationInput {
    /// The cluster's nodes.
    pub nodes: Vec<Node>,
    /// Candidate workloads, in admission order.
    pub workloads: Vec<Workload>,
    /// Workloads already running on the nodes.
    pub pre_existing: Vec<Workload>,
}

/// Where a simulation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimulationState {
    /// Built, not yet running.
    Idle,
    /// Admitting the next workload.
    Running,
    /// One workload is admitted and undecided.
    AwaitingDecision,
    /// Finished.
    Stopped,
}

enum Decision {
    Bound,
    Rejected,
    Aborted(SimulationError),
}

struct Pending {
    key: WorkloadKey,
    decision: oneshot::Sender<Decision>,
}

struct Inner {
    config: SimulationConfig,
    store: Arc<dyn Store>,
    emulator: ControlPlaneEmulator,
    algorithm: Arc<dyn ScheduleAlgorithm>,
    strategy: Arc<dyn CapacityStrategy>,
    recorder: Arc<ChannelRecorder>,
    queue: Mutex<AdmissionQueue>,
    status: Mutex<SimulationStatus>,
    state: Mutex<SimulationState>,
    pending: Mutex<Option<Pending>>,
    shutdown: ShutdownGuard,
    stopped: watch::Sender<bool>,
    scheduler: Mutex<Option<Arc<SchedulerHandle>>>,
    drains: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    report: OnceLock<ReviewReport>,
}

/// A single-admission cluster capacity simulation.
pub struct Simulation {
    inner: Arc<Inner>,
}

impl Simulation {
    /// Build a simulation using the algorithm `registry` provides for `config`.
    ///
    /// Nodes and pre-existing workloads are loaded into the store right away.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the provider is not
    /// registered, or the snapshot cannot be loaded.
    pub fn new(
        input: SimulationInput,
        config: SimulationConfig,
        registry: &AlgorithmRegistry,
    ) -> Result<Self> {
        config.validate()?;
        let algorithm = registry.build(&config.scheduler_config())?;
        info!(
            provider = %config.algorithm_provider,
            predicates = ?algorithm.predicate_names(),
            priorities = ?algorithm.priority_names(),
            "Built scheduling algorithm"
        );
        Self::with_algorithm(input, config, Arc::new(algorithm))
    }

    /// Build a simulation driving `algorithm`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the snapshot cannot
    /// be loaded: duplicate nodes, or pre-existing workloads that do not fit
    /// the nodes they run on.
    pub fn with_algorithm(
        input: SimulationInput,
        config: SimulationConfig,
        algorithm: Arc<dyn ScheduleAlgorithm>,
    ) -> Result<Self> {
        config.validate()?;

        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let emulator = ControlPlaneEmulator::new(Arc::clone(&store));
        let strategy: Arc<dyn CapacityStrategy> =
            Arc::new(PredictiveStrategy::new(Arc::clone(&store)));

        let node_count = input.nodes.len();
        for node in input.nodes {
            store.add(node.into())?;
        }

        let mut status = SimulationStatus::default();
        for workload in input.pre_existing {
            strategy.seed(&workload)?;
            status.pre_existing.push(workload);
        }

        let candidates: Vec<Workload> = input
            .workloads
            .into_iter()
            .map(|mut workload| {
                if workload.is_assigned() || workload.placement != Placement::Unscheduled {
                    warn!(workload = %workload.key(), "Clearing placement of candidate workload");
                    workload.node_name = None;
                    workload.placement = Placement::Unscheduled;
                }
                workload
            })
            .collect();
        let queue = AdmissionQueue::new(candidates);

        info!(
            nodes = node_count,
            candidates = queue.len(),
            pre_existing = status.pre_existing.len(),
            "Simulation ready"
        );

        let (stopped, _) = watch::channel(false);
        let recorder = Arc::new(ChannelRecorder::new(config.recorder_capacity));

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                store,
                emulator,
                algorithm,
                strategy,
                recorder,
                queue: Mutex::new(queue),
                status: Mutex::new(status),
                state: Mutex::new(SimulationState::Idle),
                pending: Mutex::new(None),
                shutdown: ShutdownGuard::new(),
                stopped,
                scheduler: Mutex::new(None),
                drains: Mutex::new(Vec::new()),
                started: AtomicBool::new(false),
                report: OnceLock::new(),
            }),
        })
    }

    /// Run the simulation until it stops.
    ///
    /// Rejections are outcomes, not errors: a run that ends because a workload
    /// cannot be placed returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns the error that aborted the run (an accounting failure, a store
    /// failure while admitting, or a decision timeout), or
    /// `SimulationError::AlreadyStarted` on a second call.
    pub async fn run(&self) -> Result<()> {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            return Err(SimulationError::AlreadyStarted);
        }
        if self.inner.shutdown.is_triggered() {
            return Ok(());
        }
        self.inner.set_state(SimulationState::Running);

        let callbacks = self.callbacks();
        let service = SchedulerService::new(
            self.inner.config.scheduler_config(),
            Arc::clone(&self.inner.algorithm),
            Arc::clone(&callbacks) as Arc<dyn Binder>,
            callbacks,
            Arc::clone(&self.inner.recorder) as Arc<dyn EventRecorder>,
        );
        let handle = match service.start(&self.inner.emulator) {
            Ok(handle) => Arc::new(handle),
            Err(e) if self.inner.shutdown.is_triggered() => {
                debug!(error = %e, "Stopped before the scheduler started");
                return Ok(());
            }
            Err(e) => return Err(self.inner.abort(e.into())),
        };
        *self.inner.scheduler.lock() = Some(Arc::clone(&handle));
        if self.inner.shutdown.is_triggered() {
            handle.stop();
        }

        let outcome = match handle.wait_for_cache_sync().await {
            Ok(()) => self.drive().await,
            Err(_) if self.inner.shutdown.is_triggered() => Ok(()),
            Err(e) => Err(self.inner.abort(e.into())),
        };

        self.inner.stop("simulation finished");
        handle.join().await;

        let status = self.inner.status.lock();
        info!(
            successful = status.successful.len(),
            failed = status.failed.len(),
            stop_reason = status.stop_reason.as_deref().unwrap_or_default(),
            "Simulation finished"
        );
        outcome
    }

    async fn drive(&self) -> Result<()> {
        loop {
            if self.inner.shutdown.is_triggered() {
                return Ok(());
            }

            let next = self.inner.queue.lock().pop();
            let Some(workload) = next else {
                info!("No workloads remain");
                self.inner.stop(STOP_NO_WORKLOADS_REMAIN);
                return Ok(());
            };

            let key = workload.key();
            let decision = match self.inner.admit(workload) {
                Ok(decision) => decision,
                Err(e) => return Err(self.inner.abort(e)),
            };

            let decision = match self.inner.config.decision_timeout() {
                Some(limit) => {
                    if let Ok(decision) = tokio::time::timeout(limit, decision).await {
                        decision
                    } else {
                        let err = SimulationError::DecisionTimeout {
                            workload: key,
                            seconds: limit.as_secs(),
                        };
                        return Err(self.inner.abort(err));
                    }
                }
                None => decision.await,
            };

            match decision {
                Ok(Decision::Bound) => self.inner.set_state(SimulationState::Running),
                Ok(Decision::Rejected) => return Ok(()),
                Ok(Decision::Aborted(err)) => return Err(err),
                Err(_) => {
                    debug!(workload = %key, "Stopped while awaiting a decision");
                    return Ok(());
                }
            }
        }
    }

    /// Stop the simulation with `reason`.
    ///
    /// Safe to call any number of times from any task; returns `true` only for
    /// the call that stopped it. The reason is kept only if none was set.
    pub fn shutdown(&self, reason: &str) -> bool {
        self.inner.stop(reason)
    }

    /// Wait until the simulation has stopped.
    pub async fn wait_stopped(&self) {
        let mut stopped = self.inner.stopped.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = stopped.wait_for(|stopped| *stopped).await;
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SimulationState {
        *self.inner.state.lock()
    }

    /// Snapshot of the outcome so far.
    #[must_use]
    pub fn status(&self) -> SimulationStatus {
        self.inner.status.lock().clone()
    }

    /// The review report, built on first call once the simulation has stopped.
    #[must_use]
    pub fn report(&self) -> Option<&ReviewReport> {
        if !self.inner.shutdown.is_stopped() {
            return None;
        }
        Some(
            self.inner
                .report
                .get_or_init(|| build_report(&self.inner.status.lock())),
        )
    }

    /// Remaining accounted headroom of `node`, once something was placed on it.
    #[must_use]
    pub fn headroom(&self, node: &str) -> Option<ResourceList> {
        self.inner.strategy.headroom(node)
    }

    /// Number of candidate workloads not yet admitted.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// The simulation's store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    /// The bind and update callbacks the scheduler reports decisions through.
    #[must_use]
    pub fn binder(&self) -> Arc<SimulationCallbacks> {
        self.callbacks()
    }

    fn callbacks(&self) -> Arc<SimulationCallbacks> {
        Arc::new(SimulationCallbacks {
            inner: Arc::downgrade(&self.inner),
        })
    }
}

impl Inner {
    fn set_state(&self, state: SimulationState) {
        let mut current = self.state.lock();
        if *current != SimulationState::Stopped {
            *current = state;
        }
    }

    fn admit(&self, workload: Workload) -> Result<oneshot::Receiver<Decision>> {
        let key = workload.key();
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            if let Some(outstanding) = pending.as_ref() {
                return Err(SimulationError::Outstanding {
                    admitted: key,
                    outstanding: outstanding.key.clone(),
                });
            }
            *pending = Some(Pending {
                key: key.clone(),
                decision: tx,
            });
        }

        self.set_state(SimulationState::AwaitingDecision);
        debug!(workload = %key, "Admitting workload");
        if let Err(e) = self.store.add(workload.into()) {
            self.pending.lock().take();
            return Err(e.into());
        }
        Ok(rx)
    }

    fn take_pending(&self, key: &WorkloadKey) -> Result<Pending> {
        let mut slot = self.pending.lock();
        match slot.take() {
            Some(pending) if pending.key == *key => Ok(pending),
            other => {
                *slot = other;
                Err(SimulationError::NotPending(key.clone()))
            }
        }
    }

    fn on_bind(&self, key: &WorkloadKey, host: &str) -> Result<()> {
        let pending = self.take_pending(key)?;

        match self.place(key, host) {
            Ok(()) => {
                info!(workload = %key, node = %host, "Workload placed");
                let _ = pending.decision.send(Decision::Bound);
                Ok(())
            }
            Err(err @ SimulationError::Scheduler(SchedulerError::Stopped)) => {
                debug!(workload = %key, node = %host, "Dropping placement after shutdown");
                Err(err)
            }
            Err(err) => {
                error!(workload = %key, node = %host, error = %err, "Failed to account placement");
                let message = err.to_string();
                self.stop(&format!("failed to recompute cluster state: {message}"));
                let _ = pending.decision.send(Decision::Aborted(err));
                Err(SimulationError::Scheduler(SchedulerError::Callback(message)))
            }
        }
    }

    fn place(&self, key: &WorkloadKey, host: &str) -> Result<()> {
        let mut workload = self
            .store
            .get_workload(key)?
            .ok_or_else(|| SimulationError::WorkloadNotFound(key.clone()))?;
        workload.bind(host);

        self.ensure_running()?;
        self.strategy.apply(&workload)?;
        {
            let mut status = self.status.lock();
            if self.shutdown.is_triggered() {
                return Err(SchedulerError::Stopped.into());
            }
            status.record_success(workload);
        }
        self.spawn_drain();
        Ok(())
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shutdown.is_triggered() {
            return Err(SchedulerError::Stopped.into());
        }
        Ok(())
    }

    fn on_update(&self, key: &WorkloadKey, condition: PodCondition) -> Result<()> {
        if !condition.is_unschedulable() {
            debug!(
                workload = %key,
                reason = %condition.reason,
                message = %condition.message,
                "Ignoring non-terminal condition"
            );
            return Ok(());
        }

        let pending = self.take_pending(key)?;
        let reason = format!("{}: {}", condition.reason, condition.message);

        match self.reject(key, condition) {
            Ok(()) => {
                info!(workload = %key, %reason, "Workload cannot be placed");
                self.stop(&reason);
                let _ = pending.decision.send(Decision::Rejected);
                Ok(())
            }
            Err(err @ SimulationError::Scheduler(SchedulerError::Stopped)) => {
                debug!(workload = %key, %reason, "Dropping rejection after shutdown");
                Err(err)
            }
            Err(err) => {
                error!(workload = %key, error = %err, "Failed to record rejection");
                let message = err.to_string();
                self.stop(&format!("failed to record rejection: {message}"));
                let _ = pending.decision.send(Decision::Aborted(err));
                Err(SimulationError::Scheduler(SchedulerError::Callback(message)))
            }
        }
    }

    fn reject(&self, key: &WorkloadKey, condition: PodCondition) -> Result<()> {
        let mut workload = self
            .store
            .get_workload(key)?
            .ok_or_else(|| SimulationError::WorkloadNotFound(key.clone()))?;
        workload.reject(condition.message.clone());
        workload.set_condition(condition);

        self.ensure_running()?;
        self.store.update(workload.clone().into())?;
        let mut status = self.status.lock();
        if self.shutdown.is_triggered() {
            return Err(SchedulerError::Stopped.into());
        }
        status.record_failure(workload);
        Ok(())
    }

    fn spawn_drain(&self) {
        let mut drains = self.drains.lock();
        if self.shutdown.is_triggered() {
            return;
        }
        drains.retain(|task| !task.is_finished());

        let recorder = Arc::clone(&self.recorder);
        drains.push(tokio::spawn(async move {
            let drained = recorder.wait_for_drain().await;
            trace!(drained, "Drained scheduler events");
        }));
    }

    fn abort(&self, err: SimulationError) -> SimulationError {
        error!(error = %err, "Simulation aborted");
        self.stop(&err.to_string());
        err
    }

    fn stop(&self, reason: &str) -> bool {
        {
            // Held across the trigger so no decision is recorded after it.
            let mut status = self.status.lock();
            status.set_stop_reason(reason);
            if !self.shutdown.trigger() {
                return false;
            }
        }

        info!(reason, "Stopping simulation");
        // Closed before the scheduler lets go of its watches, so their
        // disappearance does not fail later mutations.
        self.emulator.close();
        self.pending.lock().take();
        if let Some(scheduler) = self.scheduler.lock().as_ref() {
            scheduler.stop();
        }
        for task in self.drains.lock().drain(..) {
            task.abort();
        }

        *self.state.lock() = SimulationState::Stopped;
        self.shutdown.complete();
        self.stopped.send_replace(true);
        true
    }
}

/// Receives the scheduler's decisions for a [`Simulation`].
pub struct SimulationCallbacks {
    inner: Weak<Inner>,
}

impl SimulationCallbacks {
    fn inner(&self) -> capsim_scheduler::Result<Arc<Inner>> {
        self.inner.upgrade().ok_or(SchedulerError::Stopped)
    }
}

fn callback_error(err: SimulationError) -> SchedulerError {
    match err {
        SimulationError::Scheduler(err) => err,
        other => SchedulerError::Callback(other.to_string()),
    }
}

#[async_trait]
impl Binder for SimulationCallbacks {
    async fn bind(&self, key: &WorkloadKey, host: &str) -> capsim_scheduler::Result<()> {
        self.inner()?.on_bind(key, host).map_err(callback_error)
    }
}

#[async_trait]
impl PodConditionUpdater for SimulationCallbacks {
    async fn update(
        &self,
        key: &WorkloadKey,
        condition: PodCondition,
    ) -> capsim_scheduler::Result<()> {
        self.inner()?.on_update(key, condition).map_err(callback_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capsim_core::{Container, WorkloadUid};
    use capsim_scheduler::MockAlgorithm;
    use capsim_store::Kind;

    fn node(name: &str) -> Node {
        Node::new(
            name,
            ResourceList::new().with("cpu", 1000).with("memory", 1 << 30),
        )
    }

    fn workload(name: &str, cpu: i64) -> Workload {
        Workload::new(WorkloadUid::deterministic(name, 0), name, "default")
            .with_container(Container::new("c", ResourceList::new().with("cpu", cpu)))
    }

    fn simulation(workloads: Vec<Workload>) -> Simulation {
        Simulation::with_algorithm(
            SimulationInput {
                nodes: vec![node("n1")],
                workloads,
                pre_existing: Vec::new(),
            },
            SimulationConfig::default(),
            Arc::new(MockAlgorithm::always_bind("n1")),
        )
        .unwrap()
    }

    #[test]
    fn new_seeds_nodes_and_pre_existing() {
        let sim = Simulation::with_algorithm(
            SimulationInput {
                nodes: vec![node("n1")],
                workloads: vec![workload("candidate", 100).on_node("n1")],
                pre_existing: vec![workload("running", 300).on_node("n1")],
            },
            SimulationConfig::default(),
            Arc::new(MockAlgorithm::always_bind("n1")),
        )
        .unwrap();

        assert_eq!(sim.state(), SimulationState::Idle);
        assert_eq!(sim.queued(), 1);
        assert_eq!(sim.status().pre_existing.len(), 1);
        assert_eq!(sim.headroom("n1").unwrap().cpu_millis(), 700);
        assert!(sim.store().get(Kind::Node, "n1").unwrap().is_some());
        assert!(sim.report().is_none());
    }

    #[test]
    fn pre_existing_on_unknown_node_fails() {
        let result = Simulation::with_algorithm(
            SimulationInput {
                nodes: vec![node("n1")],
                workloads: Vec::new(),
                pre_existing: vec![workload("running", 300).on_node("ghost")],
            },
            SimulationConfig::default(),
            Arc::new(MockAlgorithm::always_bind("n1")),
        );
        assert!(matches!(result, Err(SimulationError::UnknownNode { .. })));
    }

    #[test]
    fn overcommitted_pre_existing_is_tolerated() {
        let sim = Simulation::with_algorithm(
            SimulationInput {
                nodes: vec![node("n1")],
                workloads: vec![workload("candidate", 100)],
                pre_existing: vec![
                    workload("a", 700).on_node("n1"),
                    workload("b", 700).on_node("n1"),
                ],
            },
            SimulationConfig::default(),
            Arc::new(MockAlgorithm::always_bind("n1")),
        )
        .unwrap();

        assert_eq!(sim.status().pre_existing.len(), 2);
        assert_eq!(sim.headroom("n1").unwrap().cpu_millis(), 0);
    }

    #[test]
    fn decisions_after_shutdown_are_not_recorded() {
        let sim = simulation(Vec::new());
        let bound = workload("a", 100);
        let rejected = workload("b", 100);
        let (bound_key, rejected_key) = (bound.key(), rejected.key());

        let _first = sim.inner.admit(bound).unwrap();
        let _bound = sim.inner.take_pending(&bound_key).unwrap();
        let _second = sim.inner.admit(rejected).unwrap();
        let _rejected = sim.inner.take_pending(&rejected_key).unwrap();

        assert!(sim.shutdown("cancelled"));
        let report = sim.report().unwrap();
        assert!(report.successful().is_empty());
        assert!(report.failed().is_empty());

        assert!(matches!(
            sim.inner.place(&bound_key, "n1"),
            Err(SimulationError::Scheduler(SchedulerError::Stopped))
        ));
        let condition = PodCondition::unscheduled(PodCondition::REASON_UNSCHEDULABLE, "full");
        assert!(matches!(
            sim.inner.reject(&rejected_key, condition),
            Err(SimulationError::Scheduler(SchedulerError::Stopped))
        ));

        let status = sim.status();
        assert!(status.successful.is_empty());
        assert!(status.failed.is_empty());
        assert_eq!(status.stop_reason.as_deref(), Some("cancelled"));
        assert!(sim.headroom("n1").is_none());
        assert_eq!(sim.state(), SimulationState::Stopped);
    }

    #[test]
    fn unknown_provider_fails_construction() {
        let config = SimulationConfig {
            algorithm_provider: "Nope".into(),
            ..SimulationConfig::default()
        };
        let registry = AlgorithmRegistry::with_defaults().unwrap();
        let result = Simulation::new(SimulationInput::default(), config, &registry);
        assert!(matches!(
            result,
            Err(SimulationError::Scheduler(SchedulerError::UnknownAlgorithm { .. }))
        ));
    }

    #[tokio::test]
    async fn binds_every_candidate_then_stops() {
        let sim = simulation(vec![workload("a", 100), workload("b", 100)]);
        sim.run().await.unwrap();

        let status = sim.status();
        assert_eq!(status.successful.len(), 2);
        assert_eq!(status.stop_reason.as_deref(), Some(STOP_NO_WORKLOADS_REMAIN));
        assert_eq!(sim.state(), SimulationState::Stopped);
        assert_eq!(sim.headroom("n1").unwrap().cpu_millis(), 800);
        assert!(matches!(sim.run().await, Err(SimulationError::AlreadyStarted)));
    }

    #[tokio::test]
    async fn shutdown_before_run_skips_it() {
        let sim = simulation(vec![workload("a", 100)]);
        assert!(sim.shutdown("cancelled"));
        assert!(!sim.shutdown("again"));
        sim.wait_stopped().await;

        sim.run().await.unwrap();
        let status = sim.status();
        assert!(status.successful.is_empty());
        assert_eq!(status.stop_reason.as_deref(), Some("cancelled"));
        assert_eq!(sim.report().unwrap().fail_reason.fail_message, "cancelled");
    }

    #[tokio::test]
    async fn callbacks_for_unknown_workloads_are_refused() {
        let sim = simulation(Vec::new());
        let callbacks = sim.binder();
        let key = WorkloadKey::new("default", "stray");

        assert!(callbacks.bind(&key, "n1").await.is_err());
        let condition = PodCondition::unscheduled(PodCondition::REASON_UNSCHEDULABLE, "nope");
        assert!(callbacks.update(&key, condition).await.is_err());

        let transient = PodCondition::unscheduled("SchedulerError", "later");
        assert!(callbacks.update(&key, transient).await.is_ok());
    }
}
