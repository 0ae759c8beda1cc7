//! Index-aware selection planner.
//!
//! Folds key conditions into a single interval, then drives either a
//! full heap scan or a forward index walk from the interval's lower
//! bound, streaming matching tuples to the caller's writer.

use crate::predicate::{fold_key_range, matches_all, Attr, CompOp, Condition, KeyRange, Projection};
use std::io::Write;
use tarn_common::{Result, StorageConfig, TarnError};
use tarn_storage::{AccessMode, BTree, Cursor, RecordFile};
use tracing::debug;

/// Plans and executes select statements against one table's heap file
/// and optional B+ tree index.
pub struct SelectPlanner {
    config: StorageConfig,
}

impl SelectPlanner {
    /// Creates a planner over the given storage layout.
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Executes a select, writing matching tuples to `out`.
    ///
    /// Returns the number of matching tuples. With `Projection::Count`
    /// no per-tuple output is produced; the count is printed at the
    /// end instead.
    pub fn select<W: Write>(
        &self,
        projection: Projection,
        table: &str,
        conds: &[Condition],
        out: &mut W,
    ) -> Result<usize> {
        let rf = match RecordFile::open(self.config.table_path(table), AccessMode::ReadOnly) {
            Ok(rf) => rf,
            Err(TarnError::FileOpenFailed { .. }) => {
                return Err(TarnError::TableNotFound(table.to_string()))
            }
            Err(e) => return Err(e),
        };

        let count = match fold_key_range(conds) {
            None => {
                // The conjunction is provably empty; no tuple is read.
                debug!(table, "key conditions conflict, empty result");
                0
            }
            Some((range, _)) if range.is_empty_for_keys() => {
                debug!(table, "key interval has no i32 inhabitant, empty result");
                0
            }
            Some((range, _)) if range.is_unbounded() => {
                debug!(table, "unbounded key interval, full heap scan");
                full_heap_scan(&rf, conds, projection, out)?
            }
            Some((range, residuals)) => {
                match BTree::open(self.config.index_path(table), AccessMode::ReadOnly) {
                    Ok(tree) => {
                        debug!(table, lo = range.lo, hi = range.hi, "index range scan");
                        index_range_scan(&tree, &rf, &range, &residuals, projection, out)?
                    }
                    Err(TarnError::FileOpenFailed { .. }) => {
                        debug!(table, "no index file, full heap scan");
                        full_heap_scan(&rf, conds, projection, out)?
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        if projection == Projection::Count {
            writeln!(out, "{}", count)?;
        }

        rf.close()?;
        Ok(count)
    }
}

/// Writes one matching tuple according to the projection.
fn emit<W: Write>(out: &mut W, projection: Projection, key: i32, value: &str) -> Result<()> {
    match projection {
        Projection::Key => writeln!(out, "{}", key)?,
        Projection::Value => writeln!(out, "{}", value)?,
        Projection::All => writeln!(out, "{} '{}'", key, value)?,
        Projection::Count => {}
    }
    Ok(())
}

/// Scans the heap from the first record, evaluating every condition.
fn full_heap_scan<W: Write>(
    rf: &RecordFile,
    conds: &[Condition],
    projection: Projection,
    out: &mut W,
) -> Result<usize> {
    let mut count = 0;
    for record in rf.scan() {
        let (_, key, value) = record?;
        if matches_all(conds, key, &value) {
            emit(out, projection, key, &value)?;
            count += 1;
        }
    }
    Ok(count)
}

/// Walks the index from the interval's lower bound, picking the
/// cheapest scan that can satisfy the residuals and projection.
fn index_range_scan<W: Write>(
    tree: &BTree,
    rf: &RecordFile,
    range: &KeyRange,
    residuals: &[Condition],
    projection: Projection,
    out: &mut W,
) -> Result<usize> {
    // A missed locate is fine: the cursor rests just past the gap.
    let lo_key = range.lo.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
    let cursor = tree.locate(lo_key)?.cursor();

    let key_ne_only = residuals
        .iter()
        .all(|c| c.attr == Attr::Key && c.op == CompOp::Ne);

    if projection == Projection::Key && residuals.is_empty() {
        index_scan_keys_only(tree, cursor, range.hi, &[], out)
    } else if projection == Projection::Key && key_ne_only {
        let skip: Vec<i64> = residuals.iter().map(|c| c.key_literal()).collect();
        index_scan_keys_only(tree, cursor, range.hi, &skip, out)
    } else {
        index_scan_general(tree, rf, cursor, range.hi, residuals, projection, out)
    }
}

/// Emits keys straight from the index, never touching the heap. Keys
/// equal to any entry of `skip` are passed over.
fn index_scan_keys_only<W: Write>(
    tree: &BTree,
    mut cursor: Cursor,
    hi: i64,
    skip: &[i64],
    out: &mut W,
) -> Result<usize> {
    let mut count = 0;
    while cursor.pid > 0 {
        let (key, _) = match tree.read_forward(&mut cursor) {
            Ok(entry) => entry,
            Err(TarnError::NoSuchRecord) => break,
            Err(e) => return Err(e),
        };
        if key as i64 > hi {
            break;
        }
        if skip.iter().any(|&v| key as i64 == v) {
            continue;
        }
        writeln!(out, "{}", key)?;
        count += 1;
    }
    Ok(count)
}

/// Walks the index and resolves every entry in the heap to evaluate
/// the residual conditions.
fn index_scan_general<W: Write>(
    tree: &BTree,
    rf: &RecordFile,
    mut cursor: Cursor,
    hi: i64,
    residuals: &[Condition],
    projection: Projection,
    out: &mut W,
) -> Result<usize> {
    let mut count = 0;
    while cursor.pid > 0 {
        let (key, rid) = match tree.read_forward(&mut cursor) {
            Ok(entry) => entry,
            Err(TarnError::NoSuchRecord) => break,
            Err(e) => return Err(e),
        };
        if key as i64 > hi {
            break;
        }

        let (_, value) = rf.read(rid)?;
        if matches_all(residuals, key, &value) {
            emit(out, projection, key, &value)?;
            count += 1;
        }
    }
    Ok(count)
}
