//! Insertion protocol
//!
//! A caller resolves a path in one step and submits it in a later one; other
//! insertions may land in between. The submitted path is therefore only a
//! hint: every fact it claims is re-derived from the current arena before
//! anything is written.

use super::TreeStore;
use crate::metric;
use crate::model::{Digest, Fingerprint, Node, NodeId, NodeRecord};
use crate::{Error, Result};

/// A validated, not yet applied, insertion
///
/// Only valid against the exact store state it was validated on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attachment {
    id: NodeId,
    value: Fingerprint,
    commitment: Digest,
    parent: NodeId,
    label: u32,
}

impl Attachment {
    /// Id the new node will receive
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> NodeId {
        self.parent
    }

    pub fn label(&self) -> u32 {
        self.label
    }

    /// The record a journal would persist for this insertion
    pub fn record(&self) -> NodeRecord {
        NodeRecord {
            id: self.id,
            value: self.value,
            commitment: self.commitment,
            parent: Some(self.parent),
            label: Some(self.label),
        }
    }
}

impl TreeStore {
    /// Validate and apply an insertion
    pub fn insert(
        &mut self,
        value: Fingerprint,
        commitment: Digest,
        edge_label: u32,
        path: &[NodeId],
    ) -> Result<NodeId> {
        let attachment = self.validate_insert(value, commitment, edge_label, path)?;
        Ok(self.apply(attachment))
    }

    /// Check an insertion against current state without mutating anything
    pub fn validate_insert(
        &self,
        value: Fingerprint,
        commitment: Digest,
        edge_label: u32,
        path: &[NodeId],
    ) -> Result<Attachment> {
        let Some(&last_id) = path.last() else {
            return Err(Error::MalformedPath("path is empty".into()));
        };
        self.ensure_fits(&value)?;

        if let Some(node) = self.find_value(&value) {
            return Err(Error::DuplicateValue { value, node });
        }

        if path[0] != NodeId::ROOT {
            return Err(Error::MalformedPath(format!(
                "path starts at node {}, not the root",
                path[0]
            )));
        }

        let nodes = path
            .iter()
            .map(|&id| {
                self.node(id)
                    .ok_or_else(|| Error::MalformedPath(format!("unknown node {}", id)))
            })
            .collect::<Result<Vec<&Node>>>()?;

        for (i, node) in nodes.iter().enumerate() {
            let d = metric::distance(&node.value, &value);
            if d == 0 {
                return Err(Error::DuplicateValue {
                    value,
                    node: node.id,
                });
            }
            let Some(next) = nodes.get(i + 1) else {
                break;
            };
            if node.child(d) != Some(next.id) {
                return Err(Error::MalformedPath(describe_bad_step(node, next, d)));
            }
        }

        let last = self.get(last_id)?;
        let expected = metric::distance(&last.value, &value);
        if edge_label == 0 || edge_label > self.width() as u32 || edge_label != expected {
            return Err(Error::InvalidLabel {
                label: edge_label,
                expected,
            });
        }

        if last.child(edge_label).is_some() {
            return Err(Error::StaleVisit {
                parent: last_id,
                label: edge_label,
            });
        }

        Ok(Attachment {
            id: NodeId(self.len() as u64),
            value,
            commitment,
            parent: last_id,
            label: edge_label,
        })
    }

    /// Apply an attachment produced by [`TreeStore::validate_insert`]
    ///
    /// No other mutation may happen between validation and apply.
    pub(crate) fn apply(&mut self, attachment: Attachment) -> NodeId {
        debug_assert_eq!(attachment.id.index(), self.len());
        let id = self.push_leaf(
            attachment.value,
            attachment.commitment,
            attachment.parent,
            attachment.label,
        );
        tracing::debug!(
            id = %id,
            parent = %attachment.parent,
            label = attachment.label,
            value = %attachment.value,
            "attached node"
        );
        id
    }

    /// Re-insert the persisted record of a non-root node
    ///
    /// The record must attach exactly where the descent for its value ends
    /// and must carry the next id.
    pub fn restore(&mut self, record: &NodeRecord) -> Result<NodeId> {
        let (Some(parent), Some(label)) = (record.parent, record.label) else {
            return Err(Error::Corruption(format!(
                "record {} has no parent edge",
                record.id
            )));
        };
        if record.id.index() != self.len() {
            return Err(Error::Corruption(format!(
                "record {} out of order, expected id {}",
                record.id,
                self.len()
            )));
        }

        let resolution = self.resolve(&record.value)?;
        if resolution.last() != Some(parent) {
            return Err(Error::Corruption(format!(
                "record {} claims parent {}, descent ends at {:?}",
                record.id,
                parent,
                resolution.last()
            )));
        }
        let attachment = self
            .validate_insert(record.value, record.commitment, label, &resolution.path)
            .map_err(|e| Error::Corruption(format!("record {}: {}", record.id, e)))?;
        Ok(self.apply(attachment))
    }
}

fn describe_bad_step(node: &Node, next: &Node, descent_label: u32) -> String {
    if next.parent == Some(node.id) {
        format!(
            "edge {} -> {} is labeled {:?}, but the descent takes label {}",
            node.id, next.id, next.label, descent_label
        )
    } else {
        format!("{} -> {} is not an edge", node.id, next.id)
    }
}
