//! Types for the scheduler crate.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Name of the default algorithm provider.
pub const DEFAULT_PROVIDER: &str = "DefaultProvider";

/// Name of the provider that packs nodes tightly.
pub const CLUSTER_AUTOSCALER_PROVIDER: &str = "ClusterAutoscalerProvider";

/// Configuration for the scheduling algorithm and its service loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Name the scheduler reports in events.
    pub scheduler_name: String,
    /// Registered algorithm provider to build the algorithm from.
    pub algorithm_provider: String,
    /// Percentage of nodes to search for feasible placements (1..=100).
    pub percentage_of_nodes_to_score: u32,
    /// Evaluate every predicate on a node instead of stopping at the first failure.
    pub always_check_all_predicates: bool,
    /// Attempts per workload when binding fails for a transient reason.
    pub max_attempts: u32,
    /// Delay between attempts, in milliseconds.
    pub retry_backoff_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scheduler_name: "capsim-scheduler".to_string(),
            algorithm_provider: DEFAULT_PROVIDER.to_string(),
            percentage_of_nodes_to_score: 100,
            always_check_all_predicates: false,
            max_attempts: 3,
            retry_backoff_ms: 100,
        }
    }
}

impl SchedulerConfig {
    /// Create a config using the given provider.
    #[must_use]
    pub fn with_provider(provider: impl Into<String>) -> Self {
        Self {
            algorithm_provider: provider.into(),
            ..Default::default()
        }
    }

    /// Delay between scheduling attempts.
    #[must_use]
    pub const fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the percentage is out of range or no attempt is allowed.
    pub fn validate(&self) -> crate::Result<()> {
        if !(1..=100).contains(&self.percentage_of_nodes_to_score) {
            return Err(crate::SchedulerError::Config(format!(
                "percentage of nodes to score must be within 1..=100, got {}",
                self.percentage_of_nodes_to_score
            )));
        }
        if self.max_attempts == 0 {
            return Err(crate::SchedulerError::Config(
                "max attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_config_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.algorithm_provider, "DefaultProvider");
        assert_eq!(config.percentage_of_nodes_to_score, 100);
        assert_eq!(config.retry_backoff(), Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn scheduler_config_validate() {
        let mut config = SchedulerConfig::with_provider(CLUSTER_AUTOSCALER_PROVIDER);
        config.percentage_of_nodes_to_score = 0;
        assert!(config.validate().is_err());

        config.percentage_of_nodes_to_score = 50;
        config.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
