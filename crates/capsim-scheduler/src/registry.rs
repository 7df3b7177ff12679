//! Algorithm registry.
//!
//! The registry maps names to predicates, weighted priorities and providers
//! (named sets of predicate and priority keys). It is an ordinary value owned
//! by whoever composes the simulation; [`AlgorithmRegistry::with_defaults`] comes
//! with the built-in algorithms registered.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::debug;

use crate::algorithm::{GenericScheduler, PredicateConfig, PriorityConfig};
use crate::error::{Result, SchedulerError};
use crate::predicates::{
    CheckNodeUnschedulable, FitPredicate, MatchNodeSelector, PodFitsResources,
    CHECK_NODE_UNSCHEDULABLE, MATCH_NODE_SELECTOR, POD_FITS_RESOURCES,
};
use crate::priorities::{
    BalancedResourceAllocation, LeastRequested, MostRequested, PriorityFunction,
    BALANCED_RESOURCE_ALLOCATION, LEAST_REQUESTED_PRIORITY, MOST_REQUESTED_PRIORITY,
};
use crate::types::{SchedulerConfig, CLUSTER_AUTOSCALER_PROVIDER, DEFAULT_PROVIDER};

/// Pattern every registered algorithm name must match.
pub const VALID_NAME_PATTERN: &str = "^[a-zA-Z0-9]([-a-zA-Z0-9]*[a-zA-Z0-9])$";

static VALID_NAME: OnceLock<Option<Regex>> = OnceLock::new();

/// Validate an algorithm name.
///
/// # Errors
///
/// Returns `SchedulerError::InvalidAlgorithmName` if the name does not match
/// `^[a-zA-Z0-9]([-a-zA-Z0-9]*[a-zA-Z0-9])$`.
pub fn validate_algorithm_name(name: &str) -> Result<()> {
    let Some(valid) = VALID_NAME
        .get_or_init(|| Regex::new(VALID_NAME_PATTERN).ok())
        .as_ref()
    else {
        return Err(SchedulerError::Config(format!(
            "invalid name pattern {VALID_NAME_PATTERN}"
        )));
    };
    if valid.is_match(name) {
        Ok(())
    } else {
        Err(SchedulerError::InvalidAlgorithmName(name.to_string()))
    }
}

/// Predicate and priority keys making up one algorithm.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlgorithmProvider {
    /// Predicates to evaluate, besides the mandatory ones.
    pub fit_predicate_keys: BTreeSet<String>,
    /// Priorities to score with.
    pub priority_keys: BTreeSet<String>,
}

struct RegisteredPriority {
    function: Arc<dyn PriorityFunction>,
    weight: i64,
}

/// Named predicates, priorities and providers.
#[derive(Default)]
pub struct AlgorithmRegistry {
    predicates: BTreeMap<String, Arc<dyn FitPredicate>>,
    /// Predicate names in registration order, which is also evaluation order.
    predicate_order: Vec<String>,
    mandatory: BTreeSet<String>,
    priorities: BTreeMap<String, RegisteredPriority>,
    providers: BTreeMap<String, AlgorithmProvider>,
}

impl AlgorithmRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in predicates, priorities and the
    /// `DefaultProvider` and `ClusterAutoscalerProvider` providers.
    ///
    /// # Errors
    ///
    /// Returns an error only if a built-in name fails validation.
    pub fn with_defaults() -> Result<Self> {
        let mut registry = Self::new();

        registry.register_mandatory_fit_predicate(
            CHECK_NODE_UNSCHEDULABLE,
            Arc::new(CheckNodeUnschedulable),
        )?;
        registry.register_fit_predicate(POD_FITS_RESOURCES, Arc::new(PodFitsResources))?;
        registry.register_fit_predicate(MATCH_NODE_SELECTOR, Arc::new(MatchNodeSelector))?;

        registry.register_priority(LEAST_REQUESTED_PRIORITY, Arc::new(LeastRequested), 1)?;
        registry.register_priority(MOST_REQUESTED_PRIORITY, Arc::new(MostRequested), 1)?;
        registry.register_priority(
            BALANCED_RESOURCE_ALLOCATION,
            Arc::new(BalancedResourceAllocation),
            1,
        )?;

        let predicates = [POD_FITS_RESOURCES, MATCH_NODE_SELECTOR];
        registry.register_provider(
            DEFAULT_PROVIDER,
            predicates,
            [LEAST_REQUESTED_PRIORITY, BALANCED_RESOURCE_ALLOCATION],
        )?;
        registry.register_provider(
            CLUSTER_AUTOSCALER_PROVIDER,
            predicates,
            [MOST_REQUESTED_PRIORITY, BALANCED_RESOURCE_ALLOCATION],
        )?;

        Ok(registry)
    }

    /// Register a predicate. Re-registering a name replaces it.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid.
    pub fn register_fit_predicate(
        &mut self,
        name: &str,
        predicate: Arc<dyn FitPredicate>,
    ) -> Result<()> {
        validate_algorithm_name(name)?;
        if self.predicates.insert(name.to_string(), predicate).is_none() {
            self.predicate_order.push(name.to_string());
        }
        Ok(())
    }

    /// Register a predicate evaluated by every algorithm built from this registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid.
    pub fn register_mandatory_fit_predicate(
        &mut self,
        name: &str,
        predicate: Arc<dyn FitPredicate>,
    ) -> Result<()> {
        self.register_fit_predicate(name, predicate)?;
        self.mandatory.insert(name.to_string());
        Ok(())
    }

    /// Remove a predicate, including from every provider.
    pub fn remove_fit_predicate(&mut self, name: &str) {
        self.predicates.remove(name);
        self.predicate_order.retain(|n| n != name);
        self.mandatory.remove(name);
        for provider in self.providers.values_mut() {
            provider.fit_predicate_keys.remove(name);
        }
    }

    /// Register a weighted priority. Re-registering a name replaces it.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid.
    pub fn register_priority(
        &mut self,
        name: &str,
        function: Arc<dyn PriorityFunction>,
        weight: i64,
    ) -> Result<()> {
        validate_algorithm_name(name)?;
        self.priorities
            .insert(name.to_string(), RegisteredPriority { function, weight });
        Ok(())
    }

    /// Register a provider from predicate and priority keys.
    ///
    /// Keys are resolved when an algorithm is built, not here.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider name is invalid.
    pub fn register_provider<P, Q>(&mut self, name: &str, predicates: P, priorities: Q) -> Result<()>
    where
        P: IntoIterator,
        P::Item: Into<String>,
        Q: IntoIterator,
        Q::Item: Into<String>,
    {
        validate_algorithm_name(name)?;
        self.providers.insert(
            name.to_string(),
            AlgorithmProvider {
                fit_predicate_keys: predicates.into_iter().map(Into::into).collect(),
                priority_keys: priorities.into_iter().map(Into::into).collect(),
            },
        );
        Ok(())
    }

    /// Look up a provider.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::UnknownAlgorithm` if it is not registered.
    pub fn provider(&self, name: &str) -> Result<&AlgorithmProvider> {
        self.providers
            .get(name)
            .ok_or_else(|| SchedulerError::UnknownAlgorithm {
                kind: "provider",
                name: name.to_string(),
            })
    }

    /// Names of the registered providers.
    #[must_use]
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    /// Build the algorithm named by `config.algorithm_provider`.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::UnknownAlgorithm` if the provider or one of its
    /// keys is not registered, or a config error if `config` is invalid.
    pub fn build(&self, config: &SchedulerConfig) -> Result<GenericScheduler> {
        config.validate()?;
        let provider = self.provider(&config.algorithm_provider)?;

        for key in &provider.fit_predicate_keys {
            if !self.predicates.contains_key(key) {
                return Err(SchedulerError::UnknownAlgorithm {
                    kind: "predicate",
                    name: key.clone(),
                });
            }
        }

        let predicates = self
            .predicate_order
            .iter()
            .filter(|name| {
                provider.fit_predicate_keys.contains(*name) || self.mandatory.contains(*name)
            })
            .filter_map(|name| {
                self.predicates.get(name).map(|predicate| PredicateConfig {
                    name: name.clone(),
                    predicate: Arc::clone(predicate),
                })
            })
            .collect::<Vec<_>>();

        let priorities = provider
            .priority_keys
            .iter()
            .map(|name| {
                self.priorities
                    .get(name)
                    .map(|registered| PriorityConfig {
                        name: name.clone(),
                        function: Arc::clone(&registered.function),
                        weight: registered.weight,
                    })
                    .ok_or_else(|| SchedulerError::UnknownAlgorithm {
                        kind: "priority",
                        name: name.clone(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            provider = %config.algorithm_provider,
            predicates = predicates.len(),
            priorities = priorities.len(),
            "Built scheduling algorithm"
        );

        Ok(GenericScheduler::new(predicates, priorities)
            .with_percentage_of_nodes_to_score(config.percentage_of_nodes_to_score)
            .with_always_check_all_predicates(config.always_check_all_predicates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_validation() {
        assert!(validate_algorithm_name("DefaultProvider").is_ok());
        assert!(validate_algorithm_name("my-predicate-2").is_ok());
        assert!(validate_algorithm_name("a").is_err());
        assert!(validate_algorithm_name("-leading").is_err());
        assert!(validate_algorithm_name("trailing-").is_err());
        assert!(validate_algorithm_name("has space").is_err());
    }

    #[test]
    fn default_provider_builds_in_registration_order() {
        let registry = AlgorithmRegistry::with_defaults().unwrap();
        let algorithm = registry.build(&SchedulerConfig::default()).unwrap();

        assert_eq!(
            algorithm.predicate_names(),
            vec![CHECK_NODE_UNSCHEDULABLE, POD_FITS_RESOURCES, MATCH_NODE_SELECTOR]
        );
        assert_eq!(
            algorithm.priority_names(),
            vec![BALANCED_RESOURCE_ALLOCATION, LEAST_REQUESTED_PRIORITY]
        );
        assert_eq!(
            registry.provider_names(),
            vec![CLUSTER_AUTOSCALER_PROVIDER, DEFAULT_PROVIDER]
        );
    }

    #[test]
    fn unknown_provider_and_keys() {
        let mut registry = AlgorithmRegistry::with_defaults().unwrap();
        let err = registry
            .build(&SchedulerConfig::with_provider("Nope"))
            .err()
            .unwrap();
        assert!(matches!(err, SchedulerError::UnknownAlgorithm { kind: "provider", .. }));

        registry
            .register_provider("Broken", ["PodFitsResources"], ["MissingPriority"])
            .unwrap();
        let err = registry
            .build(&SchedulerConfig::with_provider("Broken"))
            .err()
            .unwrap();
        assert!(matches!(err, SchedulerError::UnknownAlgorithm { kind: "priority", .. }));
    }

    #[test]
    fn removed_predicate_leaves_providers() {
        let mut registry = AlgorithmRegistry::with_defaults().unwrap();
        registry.remove_fit_predicate(MATCH_NODE_SELECTOR);

        let provider = registry.provider(DEFAULT_PROVIDER).unwrap();
        assert!(!provider.fit_predicate_keys.contains(MATCH_NODE_SELECTOR));

        let algorithm = registry.build(&SchedulerConfig::default()).unwrap();
        assert!(!algorithm.predicate_names().contains(&MATCH_NODE_SELECTOR));
    }

    #[test]
    fn invalid_names_are_rejected() {
        let mut registry = AlgorithmRegistry::new();
        let err = registry
            .register_fit_predicate("bad name", Arc::new(PodFitsResources))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidAlgorithmName(_)));
    }
}
