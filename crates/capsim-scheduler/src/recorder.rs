//! Scheduling event recording.
//!
//! The scheduler records an event for every decision. [`ChannelRecorder`]
//! buffers them in a bounded channel; a full buffer blocks the scheduler until
//! someone calls [`EventRecorder::wait_for_drain`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use capsim_core::WorkloadKey;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// Default buffer size of a [`ChannelRecorder`].
pub const DEFAULT_RECORDER_CAPACITY: usize = 10;

/// Reason of the event recorded after a successful bind.
pub const REASON_SCHEDULED: &str = "Scheduled";
/// Reason of the event recorded when a workload cannot be placed.
pub const REASON_FAILED_SCHEDULING: &str = "FailedScheduling";

/// Severity of a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// Normal operation.
    Normal,
    /// Something went wrong.
    Warning,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("Normal"),
            Self::Warning => f.write_str("Warning"),
        }
    }
}

/// An event about one workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// The workload concerned.
    pub workload: WorkloadKey,
    /// Severity.
    pub event_type: EventType,
    /// Machine-readable reason.
    pub reason: String,
    /// Human-readable message.
    pub message: String,
}

impl Event {
    /// A `Normal` event.
    #[must_use]
    pub fn normal(workload: WorkloadKey, reason: &str, message: impl Into<String>) -> Self {
        Self {
            workload,
            event_type: EventType::Normal,
            reason: reason.to_string(),
            message: message.into(),
        }
    }

    /// A `Warning` event.
    #[must_use]
    pub fn warning(workload: WorkloadKey, reason: &str, message: impl Into<String>) -> Self {
        Self {
            workload,
            event_type: EventType::Warning,
            reason: reason.to_string(),
            message: message.into(),
        }
    }
}

/// Records scheduling events.
#[async_trait]
pub trait EventRecorder: Send + Sync {
    /// Record an event. May wait for buffer space.
    async fn record(&self, event: Event);

    /// Wait for at least one event, then discard everything buffered.
    ///
    /// Returns the number of events discarded.
    async fn wait_for_drain(&self) -> usize;
}

/// Event recorder backed by a bounded channel.
pub struct ChannelRecorder {
    tx: mpsc::Sender<Event>,
    rx: Mutex<mpsc::Receiver<Event>>,
    drained: AtomicU64,
}

impl ChannelRecorder {
    /// Create a recorder buffering up to `capacity` events (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(rx),
            drained: AtomicU64::new(0),
        }
    }

    /// Number of events currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Total number of events drained so far.
    #[must_use]
    pub fn drained(&self) -> u64 {
        self.drained.load(Ordering::Relaxed)
    }
}

impl Default for ChannelRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_RECORDER_CAPACITY)
    }
}

#[async_trait]
impl EventRecorder for ChannelRecorder {
    async fn record(&self, event: Event) {
        debug!(
            workload = %event.workload,
            event_type = %event.event_type,
            reason = %event.reason,
            message = %event.message,
            "Recording event"
        );
        // The receiver lives as long as `self`, so sending cannot fail.
        let _ = self.tx.send(event).await;
    }

    async fn wait_for_drain(&self) -> usize {
        let mut rx = self.rx.lock().await;
        if rx.recv().await.is_none() {
            return 0;
        }
        let mut count = 1;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        self.drained.fetch_add(count as u64, Ordering::Relaxed);
        count
    }
}
