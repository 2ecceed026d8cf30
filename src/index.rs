//! High-level Index API
//!
//! This module provides the main entry point for using bkindex from several
//! threads, optionally backed by a journal file.

use crate::model::{Digest, Fingerprint, Node, NodeId};
use crate::store::Journal;
use crate::tree::{Match, PathResolution, Terminal, TreeConfig, TreeStore};
use crate::{Error, Result};
use parking_lot::RwLock;
use std::path::Path;

/// Genesis parameters for a new index
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Genesis {
    pub root_value: Fingerprint,
    pub root_commitment: Digest,
    pub config: TreeConfig,
}

impl Genesis {
    /// Genesis committing to the root with [`Digest::commit`]
    pub fn new(root_value: Fingerprint, config: TreeConfig) -> Self {
        Genesis {
            root_value,
            root_commitment: Digest::commit(&root_value, config.width),
            config,
        }
    }

    pub fn with_commitment(mut self, commitment: Digest) -> Self {
        self.root_commitment = commitment;
        self
    }
}

/// How often [`Index::insert_value`] re-resolves after losing a race
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy { max_attempts: 8 }
    }
}

struct State {
    tree: TreeStore,
    journal: Option<Journal>,
}

/// A shareable BK-tree index
///
/// Reads (`find_path`, `lookup`, `within`) run concurrently under a shared
/// lock. `add_node` takes the exclusive lock, so mutations are applied one
/// at a time against the latest state, but nothing orders a caller's
/// `find_path` against its own later `add_node`.
pub struct Index {
    state: RwLock<State>,
    retry: RetryPolicy,
}

impl Index {
    /// Create an in-memory index
    pub fn new(genesis: Genesis) -> Result<Self> {
        let tree = TreeStore::new(genesis.config, genesis.root_value, genesis.root_commitment)?;
        Ok(Self::from_parts(tree, None))
    }

    /// Create an index backed by a new journal file
    pub fn create(path: impl AsRef<Path>, genesis: Genesis) -> Result<Self> {
        let tree = TreeStore::new(genesis.config, genesis.root_value, genesis.root_commitment)?;
        let journal = Journal::create(path, &tree)?;
        Ok(Self::from_parts(tree, Some(journal)))
    }

    /// Open an existing journal file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let (journal, tree) = Journal::open(path)?;
        Ok(Self::from_parts(tree, Some(journal)))
    }

    fn from_parts(tree: TreeStore, journal: Option<Journal>) -> Self {
        Index {
            state: RwLock::new(State { tree, journal }),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    // === Queries ===

    /// Where `query` lives, or where it would attach
    pub fn find_path(&self, query: &Fingerprint) -> Result<PathResolution> {
        self.state.read().tree.resolve(query)
    }

    pub fn lookup(&self, value: &Fingerprint) -> Result<Option<NodeId>> {
        self.state.read().tree.lookup(value)
    }

    /// All nodes within `radius` of `query`, nearest first
    pub fn within(&self, query: &Fingerprint, radius: u32) -> Result<Vec<Match>> {
        self.state.read().tree.within(query, radius)
    }

    /// Copy of one node
    pub fn node(&self, id: NodeId) -> Result<Node> {
        self.state.read().tree.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().tree.len()
    }

    /// Always false: the root exists from construction
    pub fn is_empty(&self) -> bool {
        self.state.read().tree.is_empty()
    }

    pub fn height(&self) -> usize {
        self.state.read().tree.height()
    }

    pub fn config(&self) -> TreeConfig {
        self.state.read().tree.config()
    }

    pub fn verify(&self) -> Result<()> {
        self.state.read().tree.verify()
    }

    /// Run `f` against a consistent view of the whole tree
    pub fn read<R>(&self, f: impl FnOnce(&TreeStore) -> R) -> R {
        f(&self.state.read().tree)
    }

    // === Mutation ===

    /// Attach `value` at the end of a previously resolved `path`
    ///
    /// The path is re-validated against the current tree; see
    /// [`TreeStore::validate_insert`] for the failure modes. With a journal,
    /// the record is written before the tree changes, so a failed write
    /// leaves the tree untouched.
    pub fn add_node(
        &self,
        value: Fingerprint,
        commitment: Digest,
        edge_label: u32,
        path: &[NodeId],
    ) -> Result<NodeId> {
        let mut state = self.state.write();
        let attachment = state
            .tree
            .validate_insert(value, commitment, edge_label, path)?;
        if let Some(journal) = state.journal.as_mut() {
            journal.append(&attachment.record())?;
        }
        Ok(state.tree.apply(attachment))
    }

    /// Resolve and insert, re-resolving whenever another writer got there
    /// first
    pub fn insert_value(&self, value: Fingerprint, commitment: Digest) -> Result<NodeId> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let resolution = self.find_path(&value)?;
            let label = match resolution.terminal {
                Terminal::Exists { node } => return Err(Error::DuplicateValue { value, node }),
                Terminal::AttachPoint { label, .. } => label,
            };

            match self.add_node(value, commitment, label, &resolution.path) {
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    tracing::warn!(value = %value, attempt, error = %e, "retrying insert");
                }
                other => return other,
            }
        }
    }

    /// Flush the journal, if any
    pub fn sync(&self) -> Result<()> {
        if let Some(journal) = self.state.write().journal.as_mut() {
            journal.sync()?;
        }
        Ok(())
    }

    /// Whether this index is backed by a file
    pub fn is_persistent(&self) -> bool {
        self.state.read().journal.is_some()
    }
}
