//! Core data model types for bkindex

mod digest;
mod fingerprint;
mod node;

pub use digest::Digest;
pub use fingerprint::Fingerprint;
pub use node::{Node, NodeId, NodeRecord};
