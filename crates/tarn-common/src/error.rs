//! Error types for TarnDB.

use crate::page::PageId;
use thiserror::Error;

/// Result type alias using TarnError.
pub type Result<T> = std::result::Result<T, TarnError>;

/// Errors that can occur in TarnDB operations.
#[derive(Debug, Error)]
pub enum TarnError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot open file: {path}")]
    FileOpenFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("seek to page {pid} failed")]
    FileSeekFailed {
        pid: PageId,
        source: std::io::Error,
    },

    #[error("read of page {pid} failed")]
    FileReadFailed {
        pid: PageId,
        source: std::io::Error,
    },

    #[error("write of page {pid} failed")]
    FileWriteFailed {
        pid: PageId,
        source: std::io::Error,
    },

    #[error("store is opened read-only")]
    ReadOnly,

    // Structural errors
    #[error("invalid page id: {pid}")]
    InvalidPid { pid: PageId },

    #[error("invalid cursor: page {pid}, entry {eid}")]
    InvalidCursor { pid: PageId, eid: usize },

    #[error("invalid record id: {pid}:{sid}")]
    InvalidRid { pid: PageId, sid: i32 },

    // B+ tree protocol errors
    #[error("B+ tree node full")]
    NodeFull,

    #[error("no such record")]
    NoSuchRecord,

    #[error("duplicate key: {0}")]
    DuplicateKey(i32),

    // Input errors
    #[error("invalid attribute: {0}")]
    InvalidAttribute(i32),

    #[error("invalid line format: {0}")]
    InvalidFileFormat(String),

    #[error("value too large: {size} bytes (max {max})")]
    ValueTooLarge { size: usize, max: usize },

    // Planner errors
    #[error("table not found: {0}")]
    TableNotFound(String),
}
