//! One-shot shutdown state.

use std::sync::atomic::{AtomicU8, Ordering};

const NOT_STOPPED: u8 = 0;
const STOPPING: u8 = 1;
const STOPPED: u8 = 2;

/// Shutdown progress: `NotStopped → Stopping → Stopped`.
///
/// Exactly one caller of [`trigger`](Self::trigger) wins and owns the
/// shutdown work; everyone else is told it is already under way.
#[derive(Debug, Default)]
pub struct ShutdownGuard {
    state: AtomicU8,
}

impl ShutdownGuard {
    /// Create a guard in the `NotStopped` state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(NOT_STOPPED),
        }
    }

    /// Move to `Stopping`. Returns `true` only for the caller that made the move.
    pub fn trigger(&self) -> bool {
        self.state
            .compare_exchange(NOT_STOPPED, STOPPING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Move from `Stopping` to `Stopped`. Returns `false` if not stopping.
    pub fn complete(&self) -> bool {
        self.state
            .compare_exchange(STOPPING, STOPPED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether shutdown has been triggered.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.state.load(Ordering::Acquire) != NOT_STOPPED
    }

    /// Whether shutdown has completed.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state.load(Ordering::Acquire) == STOPPED
    }
}
