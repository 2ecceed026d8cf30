//! Journal persistence
//!
//! The node table is persisted as an append-only log of node records, each
//! stored as a zstd-compressed blob.

mod blob;
mod journal;

pub use blob::{Blob, BlobType};
pub use journal::Journal;
