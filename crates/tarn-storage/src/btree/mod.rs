//! Disk-resident B+ tree index.
//!
//! All data lives in the leaves; internal nodes are a routing index.
//! Leaves are linked left to right for forward range scans. Inserts
//! split full nodes bottom-up, promoting a separator key per split and
//! growing a new root when the old root itself splits.
//!
//! Node pages use a hand-rolled fixed-entry layout (see `node`); the
//! tree meta (root pid and height) persists in page 0 of the index file
//! (see `index`).

pub mod constants;
pub mod index;
pub mod node;

pub use constants::{MAX_INTERNAL_KEYS, MAX_LEAF_ENTRIES};
pub use index::{BTree, Cursor, SeekResult};
pub use node::{InternalNode, LeafNode};
