//! The callbacks a scheduler uses to report decisions.
//!
//! A scheduler never writes placements into the store itself; it hands each
//! decision to whoever owns the workload through these two traits.

use async_trait::async_trait;
use capsim_core::{PodCondition, WorkloadKey};

use crate::Result;

/// Receives placement decisions.
#[async_trait]
pub trait Binder: Send + Sync {
    /// Place the workload on `host`.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Callback` if the placement is refused.
    async fn bind(&self, key: &WorkloadKey, host: &str) -> Result<()>;
}

/// Receives condition updates, including rejections.
#[async_trait]
pub trait PodConditionUpdater: Send + Sync {
    /// Report a condition for the workload.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Callback` if the update is refused.
    async fn update(&self, key: &WorkloadKey, condition: PodCondition) -> Result<()>;
}
