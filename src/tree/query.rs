//! Radius search

use super::TreeStore;
use crate::metric;
use crate::model::{Fingerprint, NodeId};
use crate::Result;
use serde::{Deserialize, Serialize};

/// A node within the search radius
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub node: NodeId,
    pub value: Fingerprint,
    pub distance: u32,
}

impl TreeStore {
    /// All nodes within `radius` of `query`, nearest first
    ///
    /// A child under label `l` of a node at distance `d` can only hold
    /// matches if `|d - l| <= radius` (triangle inequality), so other
    /// subtrees are skipped without losing results.
    pub fn within(&self, query: &Fingerprint, radius: u32) -> Result<Vec<Match>> {
        self.ensure_fits(query)?;

        let mut hits = Vec::new();
        let mut visited = 0usize;
        let mut stack = vec![NodeId::ROOT];

        while let Some(id) = stack.pop() {
            let node = self.get(id)?;
            let d = metric::distance(&node.value, query);
            visited += 1;

            if d <= radius {
                hits.push(Match {
                    node: id,
                    value: node.value,
                    distance: d,
                });
            }

            let lo = d.saturating_sub(radius);
            let hi = d.saturating_add(radius);
            stack.extend(node.children.range(lo..=hi).map(|(_, &child)| child));
        }

        hits.sort_by_key(|m| (m.distance, m.node));
        tracing::trace!(query = %query, radius, visited, hits = hits.len(), "radius search");
        Ok(hits)
    }
}
