//! Path resolution: where a value lives, or where it would attach

use super::TreeStore;
use crate::metric;
use crate::model::{Fingerprint, NodeId};
use crate::Result;
use serde::{Deserialize, Serialize};

/// How a descent ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Terminal {
    /// No edge to follow: a new node would hang off `parent` under `label`
    AttachPoint { parent: NodeId, label: u32 },
    /// The query is already indexed at `node`
    Exists { node: NodeId },
}

/// Result of descending the tree for one query
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathResolution {
    /// Visited nodes, root first. Excludes the matching node on `Exists`.
    pub path: Vec<NodeId>,
    /// `distances[i]` is the distance from `path[i]` to the query
    pub distances: Vec<u32>,
    pub terminal: Terminal,
}

impl PathResolution {
    pub fn is_attach_point(&self) -> bool {
        matches!(self.terminal, Terminal::AttachPoint { .. })
    }

    /// Last visited node
    pub fn last(&self) -> Option<NodeId> {
        self.path.last().copied()
    }

    /// Distance from the last visited node; the edge label on attach
    pub fn label(&self) -> Option<u32> {
        self.distances.last().copied()
    }
}

impl TreeStore {
    /// Descend from the root toward `query`
    ///
    /// Read-only. Fails only if `query` is wider than the tree.
    pub fn resolve(&self, query: &Fingerprint) -> Result<PathResolution> {
        self.ensure_fits(query)?;

        let mut path = Vec::new();
        let mut distances = Vec::new();
        let mut current = self.root();

        let terminal = loop {
            let d = metric::distance(&current.value, query);
            if d == 0 {
                break Terminal::Exists { node: current.id };
            }
            path.push(current.id);
            distances.push(d);
            match current.child(d) {
                Some(next) => current = self.get(next)?,
                None => {
                    break Terminal::AttachPoint {
                        parent: current.id,
                        label: d,
                    }
                }
            }
        };

        tracing::trace!(
            query = %query,
            steps = path.len(),
            ?terminal,
            "resolved path"
        );

        Ok(PathResolution {
            path,
            distances,
            terminal,
        })
    }

    /// Node holding `value`, found by descent
    pub fn lookup(&self, value: &Fingerprint) -> Result<Option<NodeId>> {
        Ok(match self.resolve(value)?.terminal {
            Terminal::Exists { node } => Some(node),
            Terminal::AttachPoint { .. } => None,
        })
    }

    pub fn contains(&self, value: &Fingerprint) -> Result<bool> {
        Ok(self.lookup(value)?.is_some())
    }
}
