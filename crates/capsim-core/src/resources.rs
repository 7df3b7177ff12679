//! Canonical resource lists.
//!
//! A [`ResourceList`] maps resource names to integer amounts in canonical
//! units: CPU in millicores, everything else in whole units (bytes for memory
//! and storage). All arithmetic is integer arithmetic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::quantity::Quantity;

/// CPU, in millicores.
pub const RESOURCE_CPU: &str = "cpu";
/// Memory, in bytes.
pub const RESOURCE_MEMORY: &str = "memory";
/// Maximum number of pods a node accepts.
pub const RESOURCE_PODS: &str = "pods";
/// Local ephemeral storage, in bytes.
pub const RESOURCE_EPHEMERAL_STORAGE: &str = "ephemeral-storage";
/// NVIDIA GPUs.
pub const RESOURCE_GPU: &str = "nvidia.com/gpu";

/// Whether `name` is a scalar (extended) resource: hugepages, attachable
/// volumes, or a domain-qualified name outside `kubernetes.io/`.
#[must_use]
pub fn is_scalar_resource_name(name: &str) -> bool {
    if name.starts_with("hugepages-") || name.starts_with("attachable-volumes-") {
        return true;
    }
    name.contains('/')
        && !name.starts_with("kubernetes.io/")
        && !name.starts_with("requests.")
}

/// A mapping from resource name to amount in canonical units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceList(BTreeMap<String, i64>);

impl ResourceList {
    /// Create an empty resource list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `(name, quantity)` pairs, converting each quantity to canonical units.
    ///
    /// # Errors
    ///
    /// Returns an error if a quantity is malformed or out of range.
    pub fn parse<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut list = Self::new();
        for (name, quantity) in pairs {
            let name = name.into();
            let amount = canonical_amount(&name, quantity.as_ref())?;
            list.0.insert(name, amount);
        }
        Ok(list)
    }

    /// Set the amount of a resource.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, amount: i64) -> Self {
        self.0.insert(name.into(), amount);
        self
    }

    /// Set the amount of a resource in place.
    pub fn insert(&mut self, name: impl Into<String>, amount: i64) {
        self.0.insert(name.into(), amount);
    }

    /// The amount of `name`, or zero if absent.
    #[must_use]
    pub fn get(&self, name: &str) -> i64 {
        self.0.get(name).copied().unwrap_or(0)
    }

    /// Whether the list declares `name` at all.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// CPU in millicores.
    #[must_use]
    pub fn cpu_millis(&self) -> i64 {
        self.get(RESOURCE_CPU)
    }

    /// Memory in bytes.
    #[must_use]
    pub fn memory_bytes(&self) -> i64 {
        self.get(RESOURCE_MEMORY)
    }

    /// Iterate over `(name, amount)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(name, amount)| (name.as_str(), *amount))
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Add every amount of `other` into this list.
    pub fn add(&mut self, other: &Self) {
        for (name, amount) in &other.0 {
            let entry = self.0.entry(name.clone()).or_insert(0);
            *entry = entry.saturating_add(*amount);
        }
    }

    /// Subtract every amount of `other` from this list.
    ///
    /// Resources absent from `self` are treated as zero.
    pub fn subtract(&mut self, other: &Self) {
        for (name, amount) in &other.0 {
            let entry = self.0.entry(name.clone()).or_insert(0);
            *entry = entry.saturating_sub(*amount);
        }
    }

    /// Names of the resources in `self` whose amount exceeds what `available`
    /// offers. Resources `available` does not declare count as zero.
    #[must_use]
    pub fn exceeding<'a>(&'a self, available: &Self) -> Vec<&'a str> {
        self.0
            .iter()
            .filter(|(name, amount)| **amount > available.get(name))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

impl FromIterator<(String, i64)> for ResourceList {
    fn from_iter<T: IntoIterator<Item = (String, i64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Convert a quantity string for `name` into canonical units.
///
/// # Errors
///
/// Returns an error if the quantity is malformed or negative.
pub fn canonical_amount(name: &str, quantity: &str) -> Result<i64> {
    let parsed = Quantity::parse(quantity)?;
    let amount = if name == RESOURCE_CPU {
        parsed.milli_value()?
    } else {
        parsed.value()?
    };

    if amount < 0 {
        return Err(CoreError::InvalidResource {
            name: name.to_string(),
            reason: format!("negative quantity {quantity:?}"),
        });
    }
    Ok(amount)
}
