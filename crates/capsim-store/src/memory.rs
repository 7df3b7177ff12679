//! In-memory storage implementation.
//!
//! This module provides the `MemoryStore` implementation of the `Store` trait.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::error::{ObserverError, Result, StoreError};
use crate::types::{Kind, Listing, Object};
use crate::{ResourceEventHandler, Store};

#[derive(Default)]
struct Bucket {
    objects: BTreeMap<String, Object>,
    sequence: u64,
    observers: Vec<Arc<dyn ResourceEventHandler>>,
}

#[derive(Default)]
struct Buckets {
    nodes: Bucket,
    workloads: Bucket,
}

impl Buckets {
    fn get(&self, kind: Kind) -> &Bucket {
        match kind {
            Kind::Node => &self.nodes,
            Kind::Workload => &self.workloads,
        }
    }

    fn get_mut(&mut self, kind: Kind) -> &mut Bucket {
        match kind {
            Kind::Node => &mut self.nodes,
            Kind::Workload => &mut self.workloads,
        }
    }
}

/// Notification to deliver once the data lock is released.
enum Notice {
    Added(Object),
    Modified { old: Object, new: Object },
    Deleted(Object),
}

/// Versioned in-memory storage for nodes and workloads.
///
/// Mutations are serialised: each one updates the data, bumps the kind's
/// sequence number, and notifies every observer of that kind before the next
/// mutation starts. Observers run outside the data lock and may call
/// [`Store::get`] or [`Store::list`].
#[derive(Default)]
pub struct MemoryStore {
    mutation: Mutex<()>,
    buckets: RwLock<Buckets>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects of a kind.
    #[must_use]
    pub fn len(&self, kind: Kind) -> usize {
        self.buckets.read().get(kind).objects.len()
    }

    /// Whether the store holds no objects of a kind.
    #[must_use]
    pub fn is_empty(&self, kind: Kind) -> bool {
        self.len(kind) == 0
    }

    fn notify(
        kind: Kind,
        key: &str,
        sequence: u64,
        observers: &[Arc<dyn ResourceEventHandler>],
        notice: &Notice,
    ) -> Result<u64> {
        for observer in observers {
            let outcome: std::result::Result<(), ObserverError> = match notice {
                Notice::Added(object) => observer.on_add(object, sequence),
                Notice::Modified { old, new } => observer.on_update(old, new, sequence),
                Notice::Deleted(object) => observer.on_delete(object, sequence),
            };
            outcome.map_err(|source| StoreError::Observer {
                kind,
                key: key.to_string(),
                source,
            })?;
        }
        Ok(sequence)
    }
}

impl Store for MemoryStore {
    fn add(&self, object: Object) -> Result<u64> {
        let _serial = self.mutation.lock();
        let kind = object.kind();
        let key = object.key();

        let (sequence, observers) = {
            let mut buckets = self.buckets.write();
            let bucket = buckets.get_mut(kind);
            if bucket.objects.contains_key(&key) {
                return Err(StoreError::AlreadyExists { kind, key });
            }
            bucket.objects.insert(key.clone(), object.clone());
            bucket.sequence += 1;
            (bucket.sequence, bucket.observers.clone())
        };

        trace!(%kind, key, sequence, "Added object");
        Self::notify(kind, &key, sequence, &observers, &Notice::Added(object))
    }

    fn update(&self, object: Object) -> Result<u64> {
        let _serial = self.mutation.lock();
        let kind = object.kind();
        let key = object.key();

        let (sequence, observers, old) = {
            let mut buckets = self.buckets.write();
            let bucket = buckets.get_mut(kind);
            let Some(slot) = bucket.objects.get_mut(&key) else {
                return Err(StoreError::NotFound { kind, key });
            };
            let old = std::mem::replace(slot, object.clone());
            bucket.sequence += 1;
            (bucket.sequence, bucket.observers.clone(), old)
        };

        trace!(%kind, key, sequence, "Updated object");
        Self::notify(
            kind,
            &key,
            sequence,
            &observers,
            &Notice::Modified { old, new: object },
        )
    }

    fn delete(&self, kind: Kind, key: &str) -> Result<u64> {
        let _serial = self.mutation.lock();

        let (sequence, observers, removed) = {
            let mut buckets = self.buckets.write();
            let bucket = buckets.get_mut(kind);
            let Some(removed) = bucket.objects.remove(key) else {
                return Err(StoreError::NotFound {
                    kind,
                    key: key.to_string(),
                });
            };
            bucket.sequence += 1;
            (bucket.sequence, bucket.observers.clone(), removed)
        };

        trace!(%kind, key, sequence, "Deleted object");
        Self::notify(kind, key, sequence, &observers, &Notice::Deleted(removed))
    }

    fn get(&self, kind: Kind, key: &str) -> Result<Option<Object>> {
        Ok(self.buckets.read().get(kind).objects.get(key).cloned())
    }

    fn list(&self, kind: Kind) -> Result<Listing> {
        let buckets = self.buckets.read();
        let bucket = buckets.get(kind);
        Ok(Listing {
            objects: bucket.objects.values().cloned().collect(),
            sequence: bucket.sequence,
        })
    }

    fn register_observer(&self, kind: Kind, handler: Arc<dyn ResourceEventHandler>) {
        self.buckets.write().get_mut(kind).observers.push(handler);
    }

    fn sequence(&self, kind: Kind) -> u64 {
        self.buckets.read().get(kind).sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capsim_core::{Node, ResourceList, Workload, WorkloadKey, WorkloadUid};

    /// Records every notification as `(label, change, key, sequence)`.
    #[derive(Default)]
    struct Recording {
        label: &'static str,
        log: Arc<Mutex<Vec<(&'static str, &'static str, String, u64)>>>,
        fail: bool,
    }

    impl ResourceEventHandler for Recording {
        fn on_add(&self, object: &Object, sequence: u64) -> std::result::Result<(), ObserverError> {
            self.log
                .lock()
                .push((self.label, "add", object.key(), sequence));
            if self.fail {
                return Err(ObserverError("boom".to_string()));
            }
            Ok(())
        }

        fn on_update(
            &self,
            _old: &Object,
            new: &Object,
            sequence: u64,
        ) -> std::result::Result<(), ObserverError> {
            self.log
                .lock()
                .push((self.label, "update", new.key(), sequence));
            Ok(())
        }

        fn on_delete(
            &self,
            object: &Object,
            sequence: u64,
        ) -> std::result::Result<(), ObserverError> {
            self.log
                .lock()
                .push((self.label, "delete", object.key(), sequence));
            Ok(())
        }
    }

    fn node(name: &str) -> Object {
        Node::new(name, ResourceList::new().with("cpu", 1000)).into()
    }

    fn workload(name: &str) -> Workload {
        Workload::new(WorkloadUid::deterministic(name, 0), name, "default")
    }

    #[test]
    fn get_absent_is_not_an_error() {
        let store = MemoryStore::new();
        assert!(store.get(Kind::Node, "missing").unwrap().is_none());
        assert!(store
            .get_workload(&WorkloadKey::new("default", "missing"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn add_get_update_delete() {
        let store = MemoryStore::new();

        assert_eq!(store.add(node("n1")).unwrap(), 1);
        assert!(matches!(
            store.add(node("n1")),
            Err(StoreError::AlreadyExists { .. })
        ));

        let mut w = workload("w");
        store.add(w.clone().into()).unwrap();
        w.bind("n1");
        assert_eq!(store.update(w.clone().into()).unwrap(), 2);
        assert_eq!(store.get_workload(&w.key()).unwrap(), Some(w.clone()));

        store.delete(Kind::Workload, &w.key().to_string()).unwrap();
        assert!(store.get_workload(&w.key()).unwrap().is_none());
        assert_eq!(store.sequence(Kind::Workload), 3);
        assert_eq!(store.sequence(Kind::Node), 1);
    }

    #[test]
    fn update_missing_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.update(node("ghost")),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete(Kind::Node, "ghost"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn observers_notified_in_registration_order_per_kind() {
        let store = MemoryStore::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second"] {
            store.register_observer(
                Kind::Node,
                Arc::new(Recording {
                    label,
                    log: Arc::clone(&log),
                    fail: false,
                }),
            );
        }

        store.add(node("n1")).unwrap();
        store.update(node("n1")).unwrap();
        store.add(workload("w").into()).unwrap();

        let log = log.lock();
        assert_eq!(
            *log,
            vec![
                ("first", "add", "n1".to_string(), 1),
                ("second", "add", "n1".to_string(), 1),
                ("first", "update", "n1".to_string(), 2),
                ("second", "update", "n1".to_string(), 2),
            ]
        );
    }

    #[test]
    fn observer_failure_aborts_the_call() {
        let store = MemoryStore::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        store.register_observer(
            Kind::Node,
            Arc::new(Recording {
                label: "failing",
                log: Arc::clone(&log),
                fail: true,
            }),
        );
        store.register_observer(
            Kind::Node,
            Arc::new(Recording {
                label: "never",
                log: Arc::clone(&log),
                fail: false,
            }),
        );

        let err = store.add(node("n1")).unwrap_err();
        assert!(err.is_observer_failure());
        assert_eq!(log.lock().len(), 1);
        assert!(store.get(Kind::Node, "n1").unwrap().is_some());
    }

    #[test]
    fn listing_reflects_sequence() {
        let store = MemoryStore::new();
        store.add(node("b")).unwrap();
        store.add(node("a")).unwrap();

        let listing = store.list(Kind::Node).unwrap();
        assert_eq!(listing.sequence, 2);
        let keys: Vec<_> = listing.objects.iter().map(Object::key).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(store.len(Kind::Node), 2);
        assert!(store.is_empty(Kind::Workload));
    }
}
