//! # bkindex
//!
//! A similarity index over fixed-width content fingerprints.
//!
//! Fingerprints (perceptual or content hashes) are arranged in a BK-tree
//! whose edges are labeled by Hamming distance. Insertion is split in two:
//! a read-only descent that finds where a value would attach, and a write
//! that re-validates that path against the current tree before appending a
//! leaf. Writers that lose a race simply resolve again.
//!
//! ## Core Concepts
//!
//! - **Fingerprint**: an up-to-256-bit value; each tree has a fixed width
//! - **Commitment**: a caller-supplied digest stored next to each value
//! - **Path**: the root-first node sequence visited while descending
//! - **Journal**: an append-only file recording every node in insertion order
//!
//! ## Example
//!
//! ```ignore
//! use bkindex::{Digest, Fingerprint, Genesis, Index, TreeConfig};
//!
//! let root = Fingerprint::from_hex("90988d8325694163e750b89304f01907")?;
//! let index = Index::create("fingerprints.bkt", Genesis::new(root, TreeConfig::new(128, 42)))?;
//!
//! let value = Fingerprint::from_hex("6cdadad86564e7c5602fd2901b6466e4")?;
//! let found = index.find_path(&value)?;
//! index.add_node(value, Digest::commit(&value, 128), found.label().unwrap(), &found.path)?;
//! ```

pub mod metric;
pub mod model;
pub mod store;
pub mod tree;

mod error;
mod index;

pub use error::{Error, Result};
pub use index::{Genesis, Index, RetryPolicy};
pub use model::{Digest, Fingerprint, Node, NodeId, NodeRecord};
pub use store::Journal;
pub use tree::{Attachment, Match, PathResolution, Terminal, TreeConfig, TreeStore};

/// Journal format version
pub const VERSION: u32 = 1;

/// Magic bytes for file identification
pub const MAGIC: &[u8; 8] = b"BKINDEX\0";
