//! Identifier types for simulated workloads.
//!
//! Workloads carry an opaque UID (unique across a run) and are addressed in the
//! resource store by their `namespace/name` key, the same convention a
//! Kubernetes watch cache uses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors produced when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The key is not of the form `namespace/name`.
    #[error("invalid workload key {0:?}: expected namespace/name")]
    InvalidKey(String),

    /// The identifier was empty.
    #[error("identifier must not be empty")]
    Empty,
}

/// A workload UID.
///
/// Simulation workloads expanded from a template each receive a fresh UID,
/// which is also used as their name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkloadUid(String);

impl WorkloadUid {
    /// Create a UID from an existing string (e.g. a UID read from a snapshot).
    ///
    /// # Errors
    ///
    /// Returns an error if the string is empty.
    pub fn new(uid: impl Into<String>) -> Result<Self, IdError> {
        let uid = uid.into();
        if uid.is_empty() {
            return Err(IdError::Empty);
        }
        Ok(Self(uid))
    }

    /// Generate a new random UID (UUID v4).
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Generate a deterministic UID for the `index`-th copy of a template.
    ///
    /// This is useful for reproducible runs and predictable IDs in tests.
    #[must_use]
    pub fn deterministic(template: &str, index: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(template.as_bytes());
        hasher.update(&index.to_le_bytes());

        let hash = hasher.finalize();
        Self(hex::encode(&hash.as_bytes()[..16]))
    }

    /// Return the UID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for WorkloadUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorkloadUid({})", self.0)
    }
}

impl fmt::Display for WorkloadUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for WorkloadUid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The store key of a workload: `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkloadKey {
    /// Workload namespace.
    pub namespace: String,
    /// Workload name.
    pub name: String,
}

impl WorkloadKey {
    /// Create a new key.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for WorkloadKey {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((namespace, name))
                if !namespace.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(namespace, name))
            }
            _ => Err(IdError::InvalidKey(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_uids_are_unique() {
        let a = WorkloadUid::generate();
        let b = WorkloadUid::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn deterministic_uids_are_stable() {
        let a = WorkloadUid::deterministic("web", 3);
        let b = WorkloadUid::deterministic("web", 3);
        let c = WorkloadUid::deterministic("web", 4);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn empty_uid_rejected() {
        assert_eq!(WorkloadUid::new(""), Err(IdError::Empty));
        assert!(WorkloadUid::new("abc").is_ok());
    }

    #[test]
    fn workload_key_roundtrip() {
        let key = WorkloadKey::new("default", "web-0");
        assert_eq!(key.to_string(), "default/web-0");

        let parsed: WorkloadKey = "default/web-0".parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn workload_key_rejects_malformed() {
        assert!("no-slash".parse::<WorkloadKey>().is_err());
        assert!("/name".parse::<WorkloadKey>().is_err());
        assert!("ns/".parse::<WorkloadKey>().is_err());
        assert!("a/b/c".parse::<WorkloadKey>().is_err());
    }

    #[test]
    fn uid_serializes_as_plain_string() {
        let uid = WorkloadUid::new("abc-123").unwrap();
        assert_eq!(serde_json::to_string(&uid).unwrap(), "\"abc-123\"");
    }
}
