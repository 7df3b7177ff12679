//! Common error types for capsim.
//!
//! This module provides shared error types that are used across multiple crates.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur while building the simulation model.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A resource quantity could not be parsed.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(#[from] crate::quantity::QuantityError),

    /// An invalid identifier was provided.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] crate::ids::IdError),

    /// A resource request could not be interpreted.
    #[error("invalid resource {name}: {reason}")]
    InvalidResource {
        /// The resource name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },
}
