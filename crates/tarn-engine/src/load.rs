//! Bulk loader: reads `<key> , <value>` lines into a table's heap file
//! and, optionally, its B+ tree index.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tarn_common::{Result, StorageConfig, TarnError};
use tarn_storage::{AccessMode, BTree, RecordFile};
use tracing::debug;

/// Loads a file of records into `table`, appending to its heap file
/// and inserting into its index when `with_index` is set.
///
/// Returns the number of rows loaded. On error the heap and index are
/// flushed as-is on drop; there is no rollback.
pub fn load(
    config: &StorageConfig,
    table: &str,
    loadfile: impl AsRef<Path>,
    with_index: bool,
) -> Result<usize> {
    let loadfile = loadfile.as_ref();
    let file = File::open(loadfile).map_err(|source| TarnError::FileOpenFailed {
        path: loadfile.display().to_string(),
        source,
    })?;
    let reader = BufReader::new(file);

    std::fs::create_dir_all(&config.data_dir)?;
    let mut rf = RecordFile::open_with(
        config.table_path(table),
        AccessMode::ReadWrite,
        config.fsync_enabled,
    )?;
    let mut tree = if with_index {
        Some(BTree::open_with(
            config.index_path(table),
            AccessMode::ReadWrite,
            config.fsync_enabled,
        )?)
    } else {
        None
    };

    let mut rows = 0;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let (key, value) = parse_load_line(&line)?;
        let rid = rf.append(key, &value)?;
        if let Some(tree) = tree.as_mut() {
            tree.insert(key, rid)?;
        }
        rows += 1;
    }

    if let Some(tree) = tree {
        tree.close()?;
    }
    rf.close()?;

    debug!(table, rows, with_index, "load complete");
    Ok(rows)
}

/// Parses one load line: an integer key, a comma, then an optional
/// value. A value delimited by `'` or `"` runs to the matching
/// delimiter (or the end of the line if unterminated); anything else
/// runs to the end of the line.
pub fn parse_load_line(line: &str) -> Result<(i32, String)> {
    let (key_part, rest) = line
        .split_once(',')
        .ok_or_else(|| TarnError::InvalidFileFormat(line.to_string()))?;

    let key: i32 = key_part
        .trim()
        .parse()
        .map_err(|_| TarnError::InvalidFileFormat(line.to_string()))?;

    let rest = rest.trim_start_matches([' ', '\t']);
    if rest.is_empty() {
        return Ok((key, String::new()));
    }

    let value = match rest.chars().next() {
        Some(delim @ ('\'' | '"')) => {
            let body = &rest[1..];
            match body.find(delim) {
                Some(end) => body[..end].to_string(),
                None => body.to_string(),
            }
        }
        _ => rest.to_string(),
    };

    Ok((key, value))
}
