//! The scheduler service loop.
//!
//! [`SchedulerService`] consumes the node and workload watches of a
//! [`ControlPlaneEmulator`], keeps its [`SchedulerCache`] current, and
//! schedules every workload that appears without a node. Decisions go back
//! through the [`Binder`] and [`PodConditionUpdater`] callbacks; events go to
//! the [`EventRecorder`].

use std::sync::Arc;

use capsim_core::{Placement, PodCondition, Workload};
use capsim_store::{ChangeType, ControlPlaneEmulator, Kind, Object, Watch, WatchEvent};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::algorithm::ScheduleAlgorithm;
use crate::binder::{Binder, PodConditionUpdater};
use crate::cache::SchedulerCache;
use crate::recorder::{Event, EventRecorder, REASON_FAILED_SCHEDULING, REASON_SCHEDULED};
use crate::types::SchedulerConfig;
use crate::{Result, SchedulerError};

/// Condition reason reported when the binder refuses a placement.
pub const REASON_BINDING_REJECTED: &str = "BindingRejected";
/// Condition reason reported for any other transient scheduling failure.
pub const REASON_SCHEDULER_ERROR: &str = "SchedulerError";

/// An event-driven scheduler over a control-plane emulator.
pub struct SchedulerService {
    config: SchedulerConfig,
    algorithm: Arc<dyn ScheduleAlgorithm>,
    cache: Arc<SchedulerCache>,
    binder: Arc<dyn Binder>,
    updater: Arc<dyn PodConditionUpdater>,
    recorder: Arc<dyn EventRecorder>,
}

impl SchedulerService {
    /// Create a service with an empty cache.
    #[must_use]
    pub fn new(
        config: SchedulerConfig,
        algorithm: Arc<dyn ScheduleAlgorithm>,
        binder: Arc<dyn Binder>,
        updater: Arc<dyn PodConditionUpdater>,
        recorder: Arc<dyn EventRecorder>,
    ) -> Self {
        Self {
            config,
            algorithm,
            cache: Arc::new(SchedulerCache::new()),
            binder,
            updater,
            recorder,
        }
    }

    /// The service's cache.
    #[must_use]
    pub fn cache(&self) -> Arc<SchedulerCache> {
        Arc::clone(&self.cache)
    }

    /// Open the watches and spawn the service loop on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a watch cannot be opened.
    pub fn start(self, emulator: &ControlPlaneEmulator) -> Result<SchedulerHandle> {
        let nodes = emulator.watch(Kind::Node)?;
        let workloads = emulator.watch(Kind::Workload)?;

        let (synced_tx, synced_rx) = watch::channel(false);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let cache = Arc::clone(&self.cache);

        info!(
            scheduler = %self.config.scheduler_name,
            provider = %self.config.algorithm_provider,
            "Starting scheduler"
        );

        let task = tokio::spawn(async move {
            tokio::select! {
                () = self.run(nodes, workloads, synced_tx) => {}
                _ = shutdown_rx.wait_for(|stop| *stop) => {
                    debug!("Scheduler received shutdown");
                }
            }
            info!("Scheduler stopped");
        });

        Ok(SchedulerHandle {
            synced: synced_rx,
            shutdown: shutdown_tx,
            task: Mutex::new(Some(task)),
            cache,
        })
    }

    async fn run(&self, mut nodes: Watch, mut workloads: Watch, synced: watch::Sender<bool>) {
        for _ in 0..nodes.initial_len() {
            let Some(event) = nodes.next().await else {
                return;
            };
            self.cache.apply(&event);
        }
        for _ in 0..workloads.initial_len() {
            let Some(event) = workloads.next().await else {
                return;
            };
            self.handle_workload_event(event).await;
        }

        synced.send_replace(true);
        info!(
            nodes = self.cache.node_count(),
            assigned = self.cache.assigned_count(),
            "Scheduler cache synced"
        );

        loop {
            tokio::select! {
                biased;
                event = nodes.next() => match event {
                    Some(event) => self.cache.apply(&event),
                    None => break,
                },
                event = workloads.next() => match event {
                    Some(event) => self.handle_workload_event(event).await,
                    None => break,
                },
            }
        }

        debug!("Watch streams ended");
    }

    async fn handle_workload_event(&self, event: WatchEvent) {
        self.cache.apply(&event);

        if event.change != ChangeType::Added {
            return;
        }
        if let Object::Workload(workload) = event.object {
            if !workload.is_assigned() && workload.placement == Placement::Unscheduled {
                self.schedule_one(&workload).await;
            }
        }
    }

    async fn schedule_one(&self, workload: &Workload) {
        let key = workload.key();
        let attempts = self.config.max_attempts.max(1);

        for attempt in 1..=attempts {
            let host = match self.algorithm.schedule(workload, self.cache.as_ref()) {
                Ok(host) => host,
                Err(e) if e.is_unschedulable() => {
                    self.report_unschedulable(workload, &e).await;
                    return;
                }
                Err(e) => {
                    error!(workload = %key, attempt, error = %e, "Error scheduling workload");
                    self.report_transient(workload, REASON_SCHEDULER_ERROR, &e)
                        .await;
                    self.backoff(attempt, attempts).await;
                    continue;
                }
            };

            self.cache.assume(workload, &host);
            match self.binder.bind(&key, &host).await {
                Ok(()) => {
                    debug!(workload = %key, node = %host, "Bound workload");
                    self.recorder
                        .record(Event::normal(
                            key.clone(),
                            REASON_SCHEDULED,
                            format!("Successfully assigned {key} to {host}"),
                        ))
                        .await;
                    return;
                }
                Err(e) => {
                    self.cache.forget(workload);
                    warn!(workload = %key, node = %host, attempt, error = %e, "Binding rejected");
                    self.report_transient(workload, REASON_BINDING_REJECTED, &e)
                        .await;
                    self.backoff(attempt, attempts).await;
                }
            }
        }

        error!(workload = %key, attempts, "Giving up on workload");
    }

    async fn report_unschedulable(&self, workload: &Workload, err: &SchedulerError) {
        let key = workload.key();
        let message = err.to_string();
        info!(workload = %key, reason = %message, "Workload cannot be placed");

        self.recorder
            .record(Event::warning(
                key.clone(),
                REASON_FAILED_SCHEDULING,
                message.clone(),
            ))
            .await;

        let condition = PodCondition::unscheduled(PodCondition::REASON_UNSCHEDULABLE, message);
        if let Err(e) = self.updater.update(&key, condition).await {
            warn!(workload = %key, error = %e, "Failed to report unschedulable workload");
        }
    }

    async fn report_transient(&self, workload: &Workload, reason: &str, err: &SchedulerError) {
        let key = workload.key();
        let condition = PodCondition::unscheduled(reason, err.to_string());
        if let Err(e) = self.updater.update(&key, condition).await {
            warn!(workload = %key, error = %e, "Failed to report scheduling error");
        }
    }

    async fn backoff(&self, attempt: u32, attempts: u32) {
        if attempt < attempts {
            tokio::time::sleep(self.config.retry_backoff()).await;
        }
    }
}

/// Controls a running [`SchedulerService`].
///
/// Dropping the handle stops the service.
pub struct SchedulerHandle {
    synced: watch::Receiver<bool>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
    cache: Arc<SchedulerCache>,
}

impl SchedulerHandle {
    /// Wait until the initial node and workload listings are in the cache.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Stopped` if the service ended before syncing.
    pub async fn wait_for_cache_sync(&self) -> Result<()> {
        let mut synced = self.synced.clone();
        synced
            .wait_for(|synced| *synced)
            .await
            .map(|_| ())
            .map_err(|_| SchedulerError::Stopped)
    }

    /// Ask the service to stop. Returns `true` for the call that stopped it.
    pub fn stop(&self) -> bool {
        !self.shutdown.send_replace(true)
    }

    /// Wait for the service task to finish. Returns immediately if already joined.
    pub async fn join(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    error!(error = %e, "Scheduler task failed");
                }
            }
        }
    }

    /// Whether the service task has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map_or(true, JoinHandle::is_finished)
    }

    /// The service's cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<SchedulerCache> {
        &self.cache
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}
