//! Node arena and tree configuration

use crate::metric;
use crate::model::{Digest, Fingerprint, Node, NodeId, NodeRecord};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tree-wide settings fixed at genesis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Fingerprint width in bits, `1..=256`
    pub width: u16,
    /// Opaque constant recorded at genesis. Never read by the tree itself.
    pub config_scalar: u64,
}

impl TreeConfig {
    pub fn new(width: u16, config_scalar: u64) -> Self {
        TreeConfig {
            width,
            config_scalar,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.width > Fingerprint::MAX_WIDTH {
            return Err(Error::Config(format!(
                "width must be between 1 and {}, got {}",
                Fingerprint::MAX_WIDTH,
                self.width
            )));
        }
        Ok(())
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig::new(128, 0)
    }
}

/// The node table
///
/// Nodes live in a `Vec` indexed by [`NodeId`]; parent and child links are
/// ids into it. The only mutation is appending a leaf through the insertion
/// protocol.
#[derive(Clone, Debug)]
pub struct TreeStore {
    config: TreeConfig,
    nodes: Vec<Node>,
    by_value: HashMap<Fingerprint, NodeId>,
}

impl TreeStore {
    /// Create a tree holding only the genesis node
    pub fn new(config: TreeConfig, root_value: Fingerprint, root_commitment: Digest) -> Result<Self> {
        config.validate()?;
        if !root_value.fits(config.width) {
            return Err(Error::ValueOutOfRange {
                value: root_value,
                width: config.width,
            });
        }

        let mut by_value = HashMap::new();
        by_value.insert(root_value, NodeId::ROOT);

        Ok(TreeStore {
            config,
            nodes: vec![Node::root(root_value, root_commitment)],
            by_value,
        })
    }

    pub fn config(&self) -> TreeConfig {
        self.config
    }

    pub fn width(&self) -> u16 {
        self.config.width
    }

    pub fn config_scalar(&self) -> u64 {
        self.config.config_scalar
    }

    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Like [`TreeStore::node`], but a missing id is an error
    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.node(id).ok_or(Error::NodeNotFound(id))
    }

    /// Number of nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root exists from construction
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Persisted form of every node, in id order
    pub fn records(&self) -> impl Iterator<Item = NodeRecord> + '_ {
        self.nodes.iter().map(NodeRecord::from)
    }

    /// Node holding exactly `value`, from the value table
    pub fn find_value(&self, value: &Fingerprint) -> Option<NodeId> {
        self.by_value.get(value).copied()
    }

    /// Edges on the longest root-to-leaf path
    pub fn height(&self) -> usize {
        // parents always precede children in the arena
        let mut depth = vec![0usize; self.nodes.len()];
        let mut max = 0;
        for node in &self.nodes {
            if let Some(parent) = node.parent {
                depth[node.id.index()] = depth[parent.index()] + 1;
                max = max.max(depth[node.id.index()]);
            }
        }
        max
    }

    pub(crate) fn ensure_fits(&self, value: &Fingerprint) -> Result<()> {
        if value.fits(self.config.width) {
            Ok(())
        } else {
            Err(Error::ValueOutOfRange {
                value: *value,
                width: self.config.width,
            })
        }
    }

    pub(crate) fn push_leaf(
        &mut self,
        value: Fingerprint,
        commitment: Digest,
        parent: NodeId,
        label: u32,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u64);
        self.nodes.push(Node::leaf(id, value, commitment, parent, label));
        self.nodes[parent.index()].children.insert(label, id);
        self.by_value.insert(value, id);
        id
    }

    /// Check every structural invariant over the whole arena
    pub fn verify(&self) -> Result<()> {
        let corrupt = |msg: String| Err(Error::Corruption(msg));

        self.config.validate()?;
        let root = self.root();
        if root.id != NodeId::ROOT || root.parent.is_some() || root.label.is_some() {
            return corrupt("root must be node 0 with no parent".into());
        }

        for (index, node) in self.nodes.iter().enumerate() {
            if node.id.index() != index {
                return corrupt(format!("node at slot {} has id {}", index, node.id));
            }
            if !node.value.fits(self.config.width) {
                return corrupt(format!("node {} value {} exceeds width", node.id, node.value));
            }
            if self.find_value(&node.value) != Some(node.id) {
                return corrupt(format!("value table disagrees for node {}", node.id));
            }

            for (&label, &child) in &node.children {
                let Some(c) = self.node(child) else {
                    return corrupt(format!("node {} has unknown child {}", node.id, child));
                };
                if c.parent != Some(node.id) || c.label != Some(label) {
                    return corrupt(format!(
                        "child {} under label {} of node {} does not point back",
                        child, label, node.id
                    ));
                }
            }

            if index == 0 {
                continue;
            }
            let (Some(parent), Some(label)) = (node.parent, node.label) else {
                return corrupt(format!("non-root node {} has no parent edge", node.id));
            };
            if parent >= node.id {
                return corrupt(format!("node {} has later parent {}", node.id, parent));
            }
            let p = self.get(parent)?;
            if p.child(label) != Some(node.id) {
                return corrupt(format!("node {} missing from parent {}", node.id, parent));
            }
            let expected = metric::distance(&p.value, &node.value);
            if label != expected {
                return corrupt(format!(
                    "edge {} -> {} labeled {}, distance is {}",
                    parent, node.id, label, expected
                ));
            }
        }

        // ids only point backwards and every edge is mirrored, so this
        // also guarantees reachability from the root
        if self.by_value.len() != self.nodes.len() {
            return corrupt(format!(
                "{} values indexed for {} nodes",
                self.by_value.len(),
                self.nodes.len()
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(v: u128) -> Fingerprint {
        Fingerprint::from_u128(v)
    }

    #[test]
    fn test_genesis() {
        let store = TreeStore::new(TreeConfig::new(128, 42), fp(0x90), Digest::of(b"root")).unwrap();
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
        assert_eq!(store.config_scalar(), 42);
        assert_eq!(store.root().value, fp(0x90));
        assert_eq!(store.root().commitment, Digest::of(b"root"));
        assert_eq!(store.find_value(&fp(0x90)), Some(NodeId::ROOT));
        assert_eq!(store.height(), 0);
        store.verify().unwrap();
    }

    #[test]
    fn test_genesis_rejects_bad_config() {
        let err = TreeStore::new(TreeConfig::new(0, 0), fp(0), Digest::ZERO).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = TreeStore::new(TreeConfig::new(257, 0), fp(0), Digest::ZERO).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = TreeStore::new(TreeConfig::new(4, 0), fp(0x10), Digest::ZERO).unwrap_err();
        assert!(matches!(err, Error::ValueOutOfRange { width: 4, .. }));
    }

    #[test]
    fn test_push_leaf_links_both_ways() {
        let mut store = TreeStore::new(TreeConfig::new(8, 0), fp(0), Digest::ZERO).unwrap();
        let id = store.push_leaf(fp(0b111), Digest::ZERO, NodeId::ROOT, 3);
        assert_eq!(id, NodeId(1));
        assert_eq!(store.root().child(3), Some(id));
        assert_eq!(store.get(id).unwrap().parent, Some(NodeId::ROOT));
        assert_eq!(store.height(), 1);
        store.verify().unwrap();
    }

    #[test]
    fn test_verify_catches_bad_label() {
        let mut store = TreeStore::new(TreeConfig::new(8, 0), fp(0), Digest::ZERO).unwrap();
        store.push_leaf(fp(0b111), Digest::ZERO, NodeId::ROOT, 2);
        assert!(matches!(store.verify(), Err(Error::Corruption(_))));
    }

    #[test]
    fn test_get_missing_node() {
        let store = TreeStore::new(TreeConfig::default(), fp(0), Digest::ZERO).unwrap();
        assert!(matches!(store.get(NodeId(3)), Err(Error::NodeNotFound(NodeId(3)))));
    }
}
