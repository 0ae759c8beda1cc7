//! Storage engine for TarnDB.
//!
//! This crate provides:
//! - Page store for fixed-size-page file I/O
//! - Heap record file for `(key, value)` tuple storage
//! - Disk-resident B+ tree index over integer keys

pub mod btree;
pub mod pagestore;
pub mod record;

pub use btree::{BTree, Cursor, SeekResult, MAX_INTERNAL_KEYS, MAX_LEAF_ENTRIES};
pub use pagestore::{AccessMode, PageStore};
pub use record::{Record, RecordFile, RecordId, MAX_VALUE_SIZE, RECORDS_PER_PAGE, RECORD_SIZE};
