//! BK-tree over Hamming distance
//!
//! Every node's children are keyed by their distance from it, so:
//! - a descent for a value follows exactly one edge per level
//! - a radius search can skip any child whose label is too far from the
//!   query's distance to its parent
//!
//! The tree only grows by appending leaves.

mod insert;
mod query;
mod resolve;
mod store;

pub use insert::Attachment;
pub use query::Match;
pub use resolve::{PathResolution, Terminal};
pub use store::{TreeConfig, TreeStore};
