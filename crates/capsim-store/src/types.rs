//! Object, kind and event types exchanged through the store.

use std::fmt;

use capsim_core::{Node, Workload};
use serde::{Deserialize, Serialize};

/// The kinds of objects the store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// Cluster nodes.
    Node,
    /// Workloads (pods).
    Workload,
}

impl Kind {
    /// All kinds, in registration order.
    pub const ALL: [Self; 2] = [Self::Node, Self::Workload];

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Workload => "workload",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "object", rename_all = "snake_case")]
pub enum Object {
    /// A node.
    Node(Node),
    /// A workload.
    Workload(Workload),
}

impl Object {
    /// The object's kind.
    #[must_use]
    pub const fn kind(&self) -> Kind {
        match self {
            Self::Node(_) => Kind::Node,
            Self::Workload(_) => Kind::Workload,
        }
    }

    /// The object's store key: the node name, or `namespace/name` for workloads.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Node(node) => node.name.clone(),
            Self::Workload(workload) => workload.key().to_string(),
        }
    }

    /// The node, if this is one.
    #[must_use]
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Self::Node(node) => Some(node),
            Self::Workload(_) => None,
        }
    }

    /// The workload, if this is one.
    #[must_use]
    pub fn as_workload(&self) -> Option<&Workload> {
        match self {
            Self::Workload(workload) => Some(workload),
            Self::Node(_) => None,
        }
    }

    /// Take the node out, if this is one.
    #[must_use]
    pub fn into_node(self) -> Option<Node> {
        match self {
            Self::Node(node) => Some(node),
            Self::Workload(_) => None,
        }
    }

    /// Take the workload out, if this is one.
    #[must_use]
    pub fn into_workload(self) -> Option<Workload> {
        match self {
            Self::Workload(workload) => Some(workload),
            Self::Node(_) => None,
        }
    }
}

impl From<Node> for Object {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl From<Workload> for Object {
    fn from(workload: Workload) -> Self {
        Self::Workload(workload)
    }
}

/// The type of change a watch event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// The object was created.
    Added,
    /// The object was replaced.
    Modified,
    /// The object was removed.
    Deleted,
}

/// One change delivered to a watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Kind of the changed object.
    pub kind: Kind,
    /// What happened.
    pub change: ChangeType,
    /// The object after the change (before it, for deletions).
    pub object: Object,
    /// Per-kind sequence number of the mutation.
    pub sequence: u64,
}

/// A consistent listing of one kind.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    /// Objects in key order.
    pub objects: Vec<Object>,
    /// Sequence number of the last mutation included in the listing.
    pub sequence: u64,
}
