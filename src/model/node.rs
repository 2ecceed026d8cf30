//! Tree node types

use super::{Digest, Fingerprint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable node identifier
///
/// Assigned in creation order starting at 0 for the root. Doubles as the
/// node's position in the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn is_root(&self) -> bool {
        *self == NodeId::ROOT
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(v: u64) -> Self {
        NodeId(v)
    }
}

/// A node in the BK-tree
///
/// Everything except `children` is fixed at creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub value: Fingerprint,
    /// Caller-supplied commitment to `value`, stored verbatim
    pub commitment: Digest,
    pub parent: Option<NodeId>,
    /// Label of the edge from `parent` (None for the root)
    pub label: Option<u32>,
    /// Children keyed by their distance from this node
    pub children: BTreeMap<u32, NodeId>,
}

impl Node {
    pub(crate) fn root(value: Fingerprint, commitment: Digest) -> Self {
        Node {
            id: NodeId::ROOT,
            value,
            commitment,
            parent: None,
            label: None,
            children: BTreeMap::new(),
        }
    }

    pub(crate) fn leaf(
        id: NodeId,
        value: Fingerprint,
        commitment: Digest,
        parent: NodeId,
        label: u32,
    ) -> Self {
        Node {
            id,
            value,
            commitment,
            parent: Some(parent),
            label: Some(label),
            children: BTreeMap::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn child(&self, label: u32) -> Option<NodeId> {
        self.children.get(&label).copied()
    }
}

/// The persisted form of a node: everything but its children
///
/// Children are rebuilt by replaying records in id order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub value: Fingerprint,
    pub commitment: Digest,
    pub parent: Option<NodeId>,
    pub label: Option<u32>,
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        NodeRecord {
            id: node.id,
            value: node.value,
            commitment: node.commitment,
            parent: node.parent,
            label: node.label,
        }
    }
}
