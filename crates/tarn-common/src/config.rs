//! Configuration structures for TarnDB.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage configuration for the database engine.
///
/// Each table `T` is stored as `<data_dir>/T.tbl` (heap file) with an
/// optional `<data_dir>/T.idx` (B+ tree index) next to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for table and index files.
    pub data_dir: PathBuf,
    /// Enable fsync after page writes.
    pub fsync_enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            fsync_enabled: true,
        }
    }
}

impl StorageConfig {
    /// Returns the heap file path for a table.
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.data_dir.join(format!("{}.tbl", table))
    }

    /// Returns the index file path for a table.
    pub fn index_path(&self, table: &str) -> PathBuf {
        self.data_dir.join(format!("{}.idx", table))
    }
}
