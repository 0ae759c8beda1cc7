//! Disk-resident B+ tree index over integer keys.
//!
//! Page 0 of the index file is the meta page (`root_pid: i32 LE`,
//! `height: i32 LE`, zero-padded). Node pages are allocated append-only
//! at `end_pid` and never reused. `height == 0` iff the tree is empty;
//! otherwise the root sits at level 1 and leaves at level `height`.

use crate::btree::constants::META_PID;
use crate::btree::node::{InternalNode, LeafNode};
use crate::pagestore::{AccessMode, PageStore};
use crate::record::RecordId;
use std::path::Path;
use tarn_common::page::{PageId, INVALID_PAGE_ID, PAGE_SIZE};
use tarn_common::{Result, TarnError};
use tracing::debug;

/// Position of a leaf entry, used to stream entries in key order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    /// Leaf page holding the entry.
    pub pid: PageId,
    /// Entry index within the leaf.
    pub eid: usize,
}

/// Result of descending to the leaf level for a search key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekResult {
    /// The key is present; the cursor points at its entry.
    Found(Cursor),
    /// The key is absent; the cursor points at the smallest entry with
    /// a greater key within the reached leaf, possibly one past the
    /// last entry.
    NotFound(Cursor),
}

impl SeekResult {
    /// Returns the cursor regardless of whether the key was found.
    pub fn cursor(self) -> Cursor {
        match self {
            SeekResult::Found(c) | SeekResult::NotFound(c) => c,
        }
    }

    /// Returns true if the key was found.
    pub fn is_found(&self) -> bool {
        matches!(self, SeekResult::Found(_))
    }
}

/// Result of an insert below a node: absorbed, or a split promoting a
/// separator key and a new right sibling to the parent.
enum Insertion {
    Done,
    Split { key_up: i32, sibling: PageId },
}

/// Disk-resident B+ tree mapping i32 keys to record ids.
pub struct BTree {
    /// Backing page store; owned for the lifetime of the open index.
    store: PageStore,
    /// Page id of the root node, -1 when the tree is empty.
    root_pid: PageId,
    /// Number of levels; 0 when the tree is empty.
    height: i32,
    /// Meta page needs rewriting before close.
    dirty: bool,
}

impl BTree {
    /// Opens an index file. An empty file is initialized with an empty
    /// tree (the meta page is written immediately when writable);
    /// otherwise the meta page is loaded.
    pub fn open(path: impl AsRef<Path>, mode: AccessMode) -> Result<Self> {
        Self::open_with(path, mode, false)
    }

    /// Opens an index file with an explicit fsync setting.
    pub fn open_with(path: impl AsRef<Path>, mode: AccessMode, fsync: bool) -> Result<Self> {
        let store = PageStore::open(path, mode)?.with_fsync(fsync);
        let mut tree = Self {
            store,
            root_pid: INVALID_PAGE_ID,
            height: 0,
            dirty: false,
        };

        if tree.store.end_pid() == 0 {
            if mode == AccessMode::ReadWrite {
                tree.flush_meta()?;
            }
        } else {
            tree.load_meta()?;
        }

        debug!(root_pid = tree.root_pid, height = tree.height, "index opened");
        Ok(tree)
    }

    /// Returns the number of levels in the tree.
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Returns the page id of the root node, -1 when empty.
    pub fn root_pid(&self) -> PageId {
        self.root_pid
    }

    fn load_meta(&mut self) -> Result<()> {
        let mut page = [0u8; PAGE_SIZE];
        self.store.read(META_PID, &mut page)?;
        self.root_pid = i32::from_le_bytes([page[0], page[1], page[2], page[3]]);
        self.height = i32::from_le_bytes([page[4], page[5], page[6], page[7]]);
        Ok(())
    }

    fn flush_meta(&mut self) -> Result<()> {
        let mut page = [0u8; PAGE_SIZE];
        page[0..4].copy_from_slice(&self.root_pid.to_le_bytes());
        page[4..8].copy_from_slice(&self.height.to_le_bytes());
        self.store.write(META_PID, &page)?;
        self.dirty = false;
        Ok(())
    }

    /// Writes the meta page back and flushes the store.
    pub fn close(mut self) -> Result<()> {
        if self.dirty {
            self.flush_meta()?;
        }
        self.store.close()
    }

    /// Adds a `(key, rid)` pair. Duplicate keys are rejected with
    /// `DuplicateKey` before any page is modified.
    pub fn insert(&mut self, key: i32, rid: RecordId) -> Result<()> {
        if self.height == 0 {
            let mut leaf = LeafNode::new();
            leaf.insert(key, rid)?;
            let pid = self.store.end_pid();
            leaf.write_to(&self.store, pid)?;
            self.root_pid = pid;
            self.height = 1;
            self.dirty = true;
            return Ok(());
        }

        match self.insert_below(self.root_pid, 1, key, rid)? {
            Insertion::Done => Ok(()),
            Insertion::Split { key_up, sibling } => {
                // The old root split; grow the tree by one level.
                let root = InternalNode::with_separator(self.root_pid, key_up, sibling);
                let pid = self.store.end_pid();
                root.write_to(&self.store, pid)?;
                debug!(root_pid = pid, key_up, "root grown");
                self.root_pid = pid;
                self.height += 1;
                self.dirty = true;
                Ok(())
            }
        }
    }

    /// Recursive descent for insert. Split siblings and their data are
    /// written before the parent that will point at them.
    fn insert_below(&mut self, pid: PageId, level: i32, key: i32, rid: RecordId) -> Result<Insertion> {
        if level == self.height {
            let mut node = LeafNode::read_from(&self.store, pid)?;
            return match node.insert(key, rid) {
                Ok(()) => {
                    node.write_to(&self.store, pid)?;
                    Ok(Insertion::Done)
                }
                Err(TarnError::NodeFull) => {
                    let mut sibling = LeafNode::new();
                    let key_up = node.insert_and_split(key, rid, &mut sibling)?;

                    let sibling_pid = self.store.end_pid();
                    sibling.set_next_leaf(node.next_leaf());
                    node.set_next_leaf(sibling_pid);
                    sibling.write_to(&self.store, sibling_pid)?;
                    node.write_to(&self.store, pid)?;

                    debug!(sibling = sibling_pid, key_up, "leaf split");
                    Ok(Insertion::Split {
                        key_up,
                        sibling: sibling_pid,
                    })
                }
                Err(e) => Err(e),
            };
        }

        let mut node = InternalNode::read_from(&self.store, pid)?;
        let child = node.locate_child(key);
        match self.insert_below(child, level + 1, key, rid)? {
            Insertion::Done => Ok(Insertion::Done),
            Insertion::Split { key_up, sibling } => match node.insert(key_up, sibling) {
                Ok(()) => {
                    node.write_to(&self.store, pid)?;
                    Ok(Insertion::Done)
                }
                Err(TarnError::NodeFull) => {
                    let mut new_sibling = InternalNode::new();
                    let mid_key = node.insert_and_split(key_up, sibling, &mut new_sibling)?;

                    let sibling_pid = self.store.end_pid();
                    new_sibling.write_to(&self.store, sibling_pid)?;
                    node.write_to(&self.store, pid)?;

                    debug!(sibling = sibling_pid, key_up = mid_key, "internal split");
                    Ok(Insertion::Split {
                        key_up: mid_key,
                        sibling: sibling_pid,
                    })
                }
                Err(e) => Err(e),
            },
        }
    }

    /// Descends to the leaf where `search_key` may live.
    ///
    /// On an empty tree the cursor's pid is -1, which scan loops already
    /// treat as end-of-scan.
    pub fn locate(&self, search_key: i32) -> Result<SeekResult> {
        if self.height == 0 {
            return Ok(SeekResult::NotFound(Cursor {
                pid: INVALID_PAGE_ID,
                eid: 0,
            }));
        }

        let mut pid = self.root_pid;
        for _ in 1..self.height {
            let node = InternalNode::read_from(&self.store, pid)?;
            pid = node.locate_child(search_key);
        }

        let leaf = LeafNode::read_from(&self.store, pid)?;
        match leaf.search(search_key) {
            Ok(eid) => Ok(SeekResult::Found(Cursor { pid, eid })),
            Err(eid) => Ok(SeekResult::NotFound(Cursor { pid, eid })),
        }
    }

    /// Reads the entry at the cursor and advances it, crossing to the
    /// next leaf when the current leaf's entries are exhausted.
    ///
    /// A cursor already one past the last entry (a legal `locate` miss)
    /// hops to the next leaf first; `NoSuchRecord` signals the end of
    /// the chain. Callers detect end-of-scan via `cursor.pid <= 0`.
    pub fn read_forward(&self, cursor: &mut Cursor) -> Result<(i32, RecordId)> {
        loop {
            if cursor.pid <= 0 || cursor.pid >= self.store.end_pid() {
                return Err(TarnError::InvalidCursor {
                    pid: cursor.pid,
                    eid: cursor.eid,
                });
            }

            let node = LeafNode::read_from(&self.store, cursor.pid)?;
            let count = node.entry_count();

            if cursor.eid < count {
                let (key, rid) = node.entry(cursor.eid).ok_or(TarnError::InvalidCursor {
                    pid: cursor.pid,
                    eid: cursor.eid,
                })?;
                cursor.eid += 1;
                if cursor.eid >= count {
                    cursor.pid = node.next_leaf();
                    cursor.eid = 0;
                }
                return Ok((key, rid));
            }

            if cursor.eid == count {
                cursor.pid = node.next_leaf();
                cursor.eid = 0;
                if cursor.pid <= 0 {
                    return Err(TarnError::NoSuchRecord);
                }
                continue;
            }

            return Err(TarnError::InvalidCursor {
                pid: cursor.pid,
                eid: cursor.eid,
            });
        }
    }
}

impl Drop for BTree {
    fn drop(&mut self) {
        if self.dirty {
            let _ = self.flush_meta();
            let _ = self.store.close();
        }
    }
}
