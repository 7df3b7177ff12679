//! Control-plane emulation.
//!
//! The [`ControlPlaneEmulator`] observes the store and republishes every
//! mutation as a [`WatchEvent`] to the watchers of that kind. A [`Watch`] first
//! replays the current listing as `Added` events and then yields live changes,
//! so a consumer sees each object exactly once before its updates.

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{ObserverError, Result, StoreError};
use crate::types::{ChangeType, Kind, Object, WatchEvent};
use crate::{ResourceEventHandler, Store};

#[derive(Default)]
struct Watchers {
    senders: Mutex<HashMap<Kind, Vec<mpsc::UnboundedSender<WatchEvent>>>>,
    closed: AtomicBool,
}

impl Watchers {
    fn publish(&self, event: &WatchEvent) -> std::result::Result<(), ObserverError> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(());
        }

        let mut senders = self.senders.lock();
        let Some(list) = senders.get_mut(&event.kind) else {
            return Ok(());
        };

        let before = list.len();
        list.retain(|tx| tx.send(event.clone()).is_ok());
        let dropped = before - list.len();

        if dropped > 0 && !self.closed.load(Ordering::Acquire) {
            return Err(ObserverError(format!(
                "{dropped} {} watcher(s) went away before the emulator was closed",
                event.kind
            )));
        }
        Ok(())
    }
}

/// Relays store notifications of one kind to the emulator's watchers.
struct Relay {
    kind: Kind,
    watchers: Arc<Watchers>,
}

impl Relay {
    fn emit(
        &self,
        change: ChangeType,
        object: &Object,
        sequence: u64,
    ) -> std::result::Result<(), ObserverError> {
        self.watchers.publish(&WatchEvent {
            kind: self.kind,
            change,
            object: object.clone(),
            sequence,
        })
    }
}

impl ResourceEventHandler for Relay {
    fn on_add(&self, object: &Object, sequence: u64) -> std::result::Result<(), ObserverError> {
        self.emit(ChangeType::Added, object, sequence)
    }

    fn on_update(
        &self,
        _old: &Object,
        new: &Object,
        sequence: u64,
    ) -> std::result::Result<(), ObserverError> {
        self.emit(ChangeType::Modified, new, sequence)
    }

    fn on_delete(&self, object: &Object, sequence: u64) -> std::result::Result<(), ObserverError> {
        self.emit(ChangeType::Deleted, object, sequence)
    }
}

/// Serves list-then-watch streams over a [`Store`].
///
/// Creating an emulator registers it as an observer of every kind. Until it is
/// closed, a watcher that disappears makes the next mutation of its kind fail
/// with an observer error. After [`close`](Self::close), events are discarded
/// and every open watch ends.
pub struct ControlPlaneEmulator {
    store: Arc<dyn Store>,
    watchers: Arc<Watchers>,
}

impl ControlPlaneEmulator {
    /// Create an emulator and register it with the store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        let watchers = Arc::new(Watchers::default());
        for kind in Kind::ALL {
            store.register_observer(
                kind,
                Arc::new(Relay {
                    kind,
                    watchers: Arc::clone(&watchers),
                }),
            );
        }
        Self { store, watchers }
    }

    /// The store this emulator serves.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Open a watch on `kind`.
    ///
    /// The watch yields the current objects as `Added` events followed by
    /// every later mutation, without gaps or duplicates.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Closed` if the emulator has been closed, or a store
    /// error if the listing fails.
    pub fn watch(&self, kind: Kind) -> Result<Watch> {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut senders = self.watchers.senders.lock();
            if self.watchers.closed.load(Ordering::Acquire) {
                return Err(StoreError::Closed);
            }
            senders.entry(kind).or_default().push(tx);
        }

        // Listed after registering, so every mutation is either in the listing
        // or arrives on the channel with a higher sequence.
        let listing = self.store.list(kind)?;
        let replay = listing
            .objects
            .into_iter()
            .map(|object| WatchEvent {
                kind,
                change: ChangeType::Added,
                object,
                sequence: listing.sequence,
            })
            .collect::<VecDeque<_>>();

        debug!(%kind, replayed = replay.len(), sequence = listing.sequence, "Opened watch");
        Ok(Watch {
            kind,
            initial_len: replay.len(),
            replay,
            listed_through: listing.sequence,
            rx,
        })
    }

    /// Number of open watchers of `kind`.
    #[must_use]
    pub fn watcher_count(&self, kind: Kind) -> usize {
        self.watchers
            .senders
            .lock()
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Stop publishing and end every open watch. Idempotent.
    pub fn close(&self) {
        let mut senders = self.watchers.senders.lock();
        if !self.watchers.closed.swap(true, Ordering::AcqRel) {
            info!("Closing control plane emulator");
        }
        senders.clear();
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.watchers.closed.load(Ordering::Acquire)
    }
}

/// A list-then-watch stream of one kind.
///
/// Ends when the emulator is closed.
pub struct Watch {
    kind: Kind,
    initial_len: usize,
    replay: VecDeque<WatchEvent>,
    listed_through: u64,
    rx: mpsc::UnboundedReceiver<WatchEvent>,
}

impl Watch {
    /// The kind this watch observes.
    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Number of objects in the initial listing, replayed before live events.
    #[must_use]
    pub fn initial_len(&self) -> usize {
        self.initial_len
    }
}

impl Stream for Watch {
    type Item = WatchEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(event) = this.replay.pop_front() {
            return Poll::Ready(Some(event));
        }

        loop {
            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(event)) if event.sequence <= this.listed_through => {}
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use capsim_core::{Node, ResourceList};
    use futures::StreamExt;

    fn node(name: &str, cpu: i64) -> Object {
        Node::new(name, ResourceList::new().with("cpu", cpu)).into()
    }

    fn setup() -> (Arc<dyn Store>, ControlPlaneEmulator) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let emulator = ControlPlaneEmulator::new(Arc::clone(&store));
        (store, emulator)
    }

    #[tokio::test]
    async fn watch_replays_listing_then_live_events() {
        let (store, emulator) = setup();
        store.add(node("a", 1000)).unwrap();

        let mut watch = emulator.watch(Kind::Node).unwrap();
        assert_eq!(watch.initial_len(), 1);
        store.add(node("b", 1000)).unwrap();
        store.update(node("a", 500)).unwrap();
        store.delete(Kind::Node, "b").unwrap();

        let mut seen = Vec::new();
        for _ in 0..4 {
            let event = watch.next().await.unwrap();
            seen.push((event.change, event.object.key(), event.sequence));
        }

        assert_eq!(
            seen,
            vec![
                (ChangeType::Added, "a".to_string(), 1),
                (ChangeType::Added, "b".to_string(), 2),
                (ChangeType::Modified, "a".to_string(), 3),
                (ChangeType::Deleted, "b".to_string(), 4),
            ]
        );
    }

    #[tokio::test]
    async fn watch_only_sees_its_kind() {
        let (store, emulator) = setup();
        let mut nodes = emulator.watch(Kind::Node).unwrap();

        let workload = capsim_core::Workload::new(
            capsim_core::WorkloadUid::deterministic("w", 0),
            "w",
            "default",
        );
        store.add(workload.into()).unwrap();
        store.add(node("a", 1)).unwrap();

        let event = nodes.next().await.unwrap();
        assert_eq!(event.kind, Kind::Node);
        assert_eq!(event.object.key(), "a");
    }

    #[tokio::test]
    async fn close_ends_watches_and_discards_events() {
        let (store, emulator) = setup();
        let mut watch = emulator.watch(Kind::Node).unwrap();
        assert_eq!(emulator.watcher_count(Kind::Node), 1);

        emulator.close();
        emulator.close();
        assert!(emulator.is_closed());
        assert!(watch.next().await.is_none());

        store.add(node("late", 1)).unwrap();
        assert!(matches!(
            emulator.watch(Kind::Node),
            Err(StoreError::Closed)
        ));
    }

    #[tokio::test]
    async fn dropped_watcher_fails_mutation_while_open() {
        let (store, emulator) = setup();
        let watch = emulator.watch(Kind::Node).unwrap();
        drop(watch);

        let err = store.add(node("a", 1)).unwrap_err();
        assert!(err.is_observer_failure());
        assert_eq!(emulator.watcher_count(Kind::Node), 0);

        // The dead sender was pruned.
        store.add(node("b", 1)).unwrap();
    }
}
