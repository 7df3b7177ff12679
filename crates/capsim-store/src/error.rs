//! Error types for the resource store.

use thiserror::Error;

use crate::types::Kind;

/// A result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Failure reported by a store observer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ObserverError(pub String);

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The record to update or delete does not exist.
    #[error("{kind} {key} not found")]
    NotFound {
        /// Object kind.
        kind: Kind,
        /// Object key.
        key: String,
    },

    /// An object with the same key is already stored.
    #[error("{kind} {key} already exists")]
    AlreadyExists {
        /// Object kind.
        kind: Kind,
        /// Object key.
        key: String,
    },

    /// An observer failed while being notified of a mutation.
    ///
    /// The mutation itself has been applied; the notification has not
    /// reached every observer.
    #[error("observer of {kind} failed on {key}: {source}")]
    Observer {
        /// Object kind.
        kind: Kind,
        /// Object key.
        key: String,
        /// The observer's error.
        #[source]
        source: ObserverError,
    },

    /// The control-plane emulator has been closed and accepts no new watches.
    #[error("control plane emulator is closed")]
    Closed,

    /// The store is internally inconsistent.
    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Whether this error came from an observer rather than the store itself.
    #[must_use]
    pub const fn is_observer_failure(&self) -> bool {
        matches!(self, Self::Observer { .. })
    }
}
