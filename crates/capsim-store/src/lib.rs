//! In-memory resource store and control-plane emulation for capsim.
//!
//! The store holds the versioned state of every node and workload in a
//! simulation. Each mutation bumps a per-kind sequence number and notifies the
//! registered observers synchronously, before the mutating call returns.
//!
//! The [`ControlPlaneEmulator`] is the observer that turns those mutations into
//! watch streams, which is how the scheduling algorithm sees the cluster: the
//! same list-then-watch feed it would receive from a live API server.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use capsim_core::{Node, ResourceList};
//! use capsim_store::{ControlPlaneEmulator, Kind, MemoryStore, Store};
//!
//! let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
//! let emulator = ControlPlaneEmulator::new(Arc::clone(&store));
//!
//! store.add(Node::new("node-1", ResourceList::new().with("cpu", 1000)).into()).unwrap();
//! let _nodes = emulator.watch(Kind::Node).unwrap();
//!
//! assert!(store.get(Kind::Node, "node-1").unwrap().is_some());
//! assert!(store.get(Kind::Node, "missing").unwrap().is_none());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod emulator;
pub mod error;
pub mod memory;
pub mod types;

use std::sync::Arc;

pub use emulator::{ControlPlaneEmulator, Watch};
pub use error::{ObserverError, Result, StoreError};
pub use memory::MemoryStore;
pub use types::{ChangeType, Kind, Listing, Object, WatchEvent};

use capsim_core::{Node, Workload, WorkloadKey};

/// Receives store mutations of one kind.
///
/// Handlers are invoked synchronously while the store serialises mutations, so
/// they may read the store but must not mutate it.
pub trait ResourceEventHandler: Send + Sync {
    /// An object was added.
    ///
    /// # Errors
    ///
    /// A failure aborts the mutating call.
    fn on_add(&self, object: &Object, sequence: u64) -> std::result::Result<(), ObserverError>;

    /// An object was replaced.
    ///
    /// # Errors
    ///
    /// A failure aborts the mutating call.
    fn on_update(
        &self,
        old: &Object,
        new: &Object,
        sequence: u64,
    ) -> std::result::Result<(), ObserverError>;

    /// An object was removed.
    ///
    /// # Errors
    ///
    /// A failure aborts the mutating call.
    fn on_delete(&self, object: &Object, sequence: u64) -> std::result::Result<(), ObserverError>;
}

/// The storage trait defining all resource store operations.
///
/// This trait abstracts the storage layer; the simulation uses the in-memory
/// [`MemoryStore`].
pub trait Store: Send + Sync {
    /// Insert a new object and notify observers of its kind.
    ///
    /// Returns the mutation's sequence number.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if the key is taken, or
    /// `StoreError::Observer` if an observer fails.
    fn add(&self, object: Object) -> Result<u64>;

    /// Replace an existing object and notify observers of its kind.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the key is absent, or
    /// `StoreError::Observer` if an observer fails.
    fn update(&self, object: Object) -> Result<u64>;

    /// Remove an object and notify observers of its kind.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the key is absent, or
    /// `StoreError::Observer` if an observer fails.
    fn delete(&self, kind: Kind, key: &str) -> Result<u64>;

    /// Get the current version of an object.
    ///
    /// An absent key is `Ok(None)`, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    fn get(&self, kind: Kind, key: &str) -> Result<Option<Object>>;

    /// List every object of a kind together with the sequence it reflects.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    fn list(&self, kind: Kind) -> Result<Listing>;

    /// Register an observer for a kind. Observers run in registration order.
    fn register_observer(&self, kind: Kind, handler: Arc<dyn ResourceEventHandler>);

    /// The sequence number of the last mutation of a kind.
    fn sequence(&self, kind: Kind) -> u64;

    /// Get a workload by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or holds a non-workload under the key.
    fn get_workload(&self, key: &WorkloadKey) -> Result<Option<Workload>> {
        match self.get(Kind::Workload, &key.to_string())? {
            Some(Object::Workload(workload)) => Ok(Some(workload)),
            Some(Object::Node(_)) => Err(StoreError::Internal(format!(
                "workload key {key} holds a node"
            ))),
            None => Ok(None),
        }
    }

    /// Get a node by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or holds a non-node under the key.
    fn get_node(&self, name: &str) -> Result<Option<Node>> {
        match self.get(Kind::Node, name)? {
            Some(Object::Node(node)) => Ok(Some(node)),
            Some(Object::Workload(_)) => Err(StoreError::Internal(format!(
                "node key {name} holds a workload"
            ))),
            None => Ok(None),
        }
    }
}
