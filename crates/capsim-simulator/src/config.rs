//! Simulation configuration.

use std::time::Duration;

use capsim_scheduler::{SchedulerConfig, DEFAULT_PROVIDER};
use serde::Deserialize;

use crate::error::{Result, SimulationError};

/// Configuration for one simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Name the scheduler reports in events.
    #[serde(default = "SimulationConfig::default_scheduler_name")]
    pub scheduler_name: String,

    /// Registered algorithm provider to schedule with.
    #[serde(default = "SimulationConfig::default_provider")]
    pub algorithm_provider: String,

    /// Percentage of nodes the algorithm searches for feasible placements.
    #[serde(default = "SimulationConfig::default_percentage")]
    pub percentage_of_nodes_to_score: u32,

    /// Seconds to wait for each scheduling decision. Zero waits forever.
    #[serde(default = "SimulationConfig::default_decision_timeout")]
    pub decision_timeout_secs: u64,

    /// Events the recorder buffers before the scheduler blocks.
    #[serde(default = "SimulationConfig::default_recorder_capacity")]
    pub recorder_capacity: usize,
}

impl SimulationConfig {
    fn default_scheduler_name() -> String {
        "capsim-scheduler".to_string()
    }

    fn default_provider() -> String {
        DEFAULT_PROVIDER.to_string()
    }

    const fn default_percentage() -> u32 {
        100
    }

    const fn default_decision_timeout() -> u64 {
        30
    }

    const fn default_recorder_capacity() -> usize {
        10
    }

    /// Load configuration from `CAPSIM_*` environment variables over the defaults.
    ///
    /// Unparseable numbers are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("CAPSIM_SCHEDULER_NAME") {
            config.scheduler_name = val;
        }
        if let Ok(val) = std::env::var("CAPSIM_ALGORITHM_PROVIDER") {
            config.algorithm_provider = val;
        }
        if let Ok(val) = std::env::var("CAPSIM_DECISION_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.decision_timeout_secs = secs;
            }
        }
        if let Ok(val) = std::env::var("CAPSIM_RECORDER_CAPACITY") {
            if let Ok(capacity) = val.parse() {
                config.recorder_capacity = capacity;
            }
        }

        config
    }

    /// The per-decision timeout, if enabled.
    #[must_use]
    pub const fn decision_timeout(&self) -> Option<Duration> {
        if self.decision_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.decision_timeout_secs))
        }
    }

    /// The scheduler configuration derived from this one.
    #[must_use]
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            scheduler_name: self.scheduler_name.clone(),
            algorithm_provider: self.algorithm_provider.clone(),
            percentage_of_nodes_to_score: self.percentage_of_nodes_to_score,
            ..SchedulerConfig::default()
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler settings are invalid or the recorder
    /// has no capacity.
    pub fn validate(&self) -> Result<()> {
        self.scheduler_config().validate()?;
        if self.recorder_capacity == 0 {
            return Err(SimulationError::Config(
                "recorder capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            scheduler_name: Self::default_scheduler_name(),
            algorithm_provider: Self::default_provider(),
            percentage_of_nodes_to_score: Self::default_percentage(),
            decision_timeout_secs: Self::default_decision_timeout(),
            recorder_capacity: Self::default_recorder_capacity(),
        }
    }
}
