//! Heap record file: fixed-slot tuple storage addressed by RecordId.
//!
//! Page layout:
//! ```text
//! +------------------------+ 0
//! | record count (4, LE)   |
//! +------------------------+ 4
//! | slot 0 (RECORD_SIZE)   |
//! | slot 1                 |
//! | ...                    |
//! +------------------------+ 4 + RECORDS_PER_PAGE * RECORD_SIZE
//! | unused                 |
//! +------------------------+ PAGE_SIZE
//! ```
//!
//! Each slot holds `key: i32 LE`, `value_len: u16 LE`, then the value
//! bytes zero-padded to `MAX_VALUE_SIZE`. Records are append-only.

use crate::pagestore::{AccessMode, PageStore};
use bytes::{Bytes, BytesMut};
use std::path::Path;
use tarn_common::page::{PageId, PAGE_SIZE};
use tarn_common::{Result, TarnError};

/// Maximum value length in bytes.
pub const MAX_VALUE_SIZE: usize = 96;

/// On-disk size of one record slot.
pub const RECORD_SIZE: usize = 4 + 2 + MAX_VALUE_SIZE;

/// Number of record slots per page.
pub const RECORDS_PER_PAGE: usize = (PAGE_SIZE - 4) / RECORD_SIZE;

/// Locator of a record within a heap file.
///
/// Ordering is lexicographic on `(pid, sid)`, which matches the physical
/// append order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId {
    /// Page containing this record.
    pub pid: PageId,
    /// Slot number within the page.
    pub sid: i32,
}

impl RecordId {
    /// On-disk size of a record id in bytes.
    pub const SIZE: usize = 8;

    /// Creates a new record id.
    pub fn new(pid: PageId, sid: i32) -> Self {
        Self { pid, sid }
    }

    /// Returns the locator of the slot following this one.
    pub fn next(self) -> Self {
        if self.sid + 1 >= RECORDS_PER_PAGE as i32 {
            Self {
                pid: self.pid + 1,
                sid: 0,
            }
        } else {
            Self {
                pid: self.pid,
                sid: self.sid + 1,
            }
        }
    }

    /// Serializes to bytes.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.pid.to_le_bytes());
        buf[4..8].copy_from_slice(&self.sid.to_le_bytes());
        buf
    }

    /// Deserializes from bytes.
    pub fn from_bytes(buf: &[u8]) -> Self {
        Self {
            pid: i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            sid: i32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        }
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.pid, self.sid)
    }
}

/// A `(key, value)` tuple stored in the heap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Integer primary key.
    pub key: i32,
    /// Value payload.
    pub value: String,
}

impl Record {
    /// Serializes the record to bytes (unpadded).
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(6 + self.value.len());
        buf.extend_from_slice(&self.key.to_le_bytes());
        buf.extend_from_slice(&(self.value.len() as u16).to_le_bytes());
        buf.extend_from_slice(self.value.as_bytes());
        buf.freeze()
    }

    /// Deserializes a record from a slot. Returns None on a bad length.
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < 6 {
            return None;
        }
        let key = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let len = u16::from_le_bytes([buf[4], buf[5]]) as usize;
        if len > MAX_VALUE_SIZE || buf.len() < 6 + len {
            return None;
        }
        let value = String::from_utf8_lossy(&buf[6..6 + len]).into_owned();
        Some(Self { key, value })
    }
}

/// Append-only heap file of `(key, value)` records.
pub struct RecordFile {
    /// Backing page store.
    store: PageStore,
    /// One past the last record in the file.
    end: RecordId,
}

impl RecordFile {
    /// Opens a heap file. In `ReadWrite` mode the file is created if
    /// missing.
    pub fn open(path: impl AsRef<Path>, mode: AccessMode) -> Result<Self> {
        let store = PageStore::open(path, mode)?;
        let end = Self::scan_end(&store)?;
        Ok(Self { store, end })
    }

    /// Opens a heap file with an explicit fsync setting.
    pub fn open_with(path: impl AsRef<Path>, mode: AccessMode, fsync: bool) -> Result<Self> {
        let store = PageStore::open(path, mode)?.with_fsync(fsync);
        let end = Self::scan_end(&store)?;
        Ok(Self { store, end })
    }

    /// Derives the end locator from the final page's record count.
    fn scan_end(store: &PageStore) -> Result<RecordId> {
        let end_pid = store.end_pid();
        if end_pid == 0 {
            return Ok(RecordId::new(0, 0));
        }

        let last_pid = end_pid - 1;
        let mut page = [0u8; PAGE_SIZE];
        store.read(last_pid, &mut page)?;
        let count = i32::from_le_bytes([page[0], page[1], page[2], page[3]]);
        if count < 0 || count > RECORDS_PER_PAGE as i32 {
            return Err(TarnError::InvalidPid { pid: last_pid });
        }

        if count == RECORDS_PER_PAGE as i32 {
            Ok(RecordId::new(end_pid, 0))
        } else {
            Ok(RecordId::new(last_pid, count))
        }
    }

    /// Returns the locator one past the last record.
    pub fn end_rid(&self) -> RecordId {
        self.end
    }

    /// Appends a record and returns its assigned locator.
    pub fn append(&mut self, key: i32, value: &str) -> Result<RecordId> {
        if value.len() > MAX_VALUE_SIZE {
            return Err(TarnError::ValueTooLarge {
                size: value.len(),
                max: MAX_VALUE_SIZE,
            });
        }

        let rid = self.end;
        let mut page = [0u8; PAGE_SIZE];
        if rid.sid > 0 {
            self.store.read(rid.pid, &mut page)?;
        }

        let record = Record {
            key,
            value: value.to_string(),
        };
        let encoded = record.to_bytes();
        let offset = 4 + rid.sid as usize * RECORD_SIZE;
        page[offset..offset + encoded.len()].copy_from_slice(&encoded);
        page[0..4].copy_from_slice(&(rid.sid + 1).to_le_bytes());

        self.store.write(rid.pid, &page)?;
        self.end = rid.next();
        Ok(rid)
    }

    /// Reads the record at `rid`.
    pub fn read(&self, rid: RecordId) -> Result<(i32, String)> {
        if rid.pid < 0 || rid.sid < 0 || rid.sid >= RECORDS_PER_PAGE as i32 || rid >= self.end {
            return Err(TarnError::InvalidRid {
                pid: rid.pid,
                sid: rid.sid,
            });
        }

        let mut page = [0u8; PAGE_SIZE];
        self.store.read(rid.pid, &mut page)?;

        let offset = 4 + rid.sid as usize * RECORD_SIZE;
        let record = Record::from_bytes(&page[offset..offset + RECORD_SIZE]).ok_or(
            TarnError::InvalidRid {
                pid: rid.pid,
                sid: rid.sid,
            },
        )?;
        Ok((record.key, record.value))
    }

    /// Returns a forward iterator over all records in append order.
    pub fn scan(&self) -> RecordScan<'_> {
        RecordScan {
            file: self,
            next: RecordId::new(0, 0),
            page: Box::new([0u8; PAGE_SIZE]),
            loaded_pid: -1,
        }
    }

    /// Flushes pending writes. The handle is released on drop.
    pub fn close(&self) -> Result<()> {
        self.store.close()
    }
}

/// Forward iterator over the records of a heap file.
///
/// Caches the current page so a full scan reads each page once.
pub struct RecordScan<'a> {
    file: &'a RecordFile,
    next: RecordId,
    page: Box<[u8; PAGE_SIZE]>,
    loaded_pid: PageId,
}

impl Iterator for RecordScan<'_> {
    type Item = Result<(RecordId, i32, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.file.end {
            return None;
        }

        let rid = self.next;
        if self.loaded_pid != rid.pid {
            if let Err(e) = self.file.store.read(rid.pid, &mut self.page) {
                return Some(Err(e));
            }
            self.loaded_pid = rid.pid;
        }

        let offset = 4 + rid.sid as usize * RECORD_SIZE;
        let record = match Record::from_bytes(&self.page[offset..offset + RECORD_SIZE]) {
            Some(r) => r,
            None => {
                return Some(Err(TarnError::InvalidRid {
                    pid: rid.pid,
                    sid: rid.sid,
                }))
            }
        };

        self.next = rid.next();
        Some(Ok((rid, record.key, record.value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_record_id_ordering() {
        assert!(RecordId::new(0, 3) < RecordId::new(0, 4));
        assert!(RecordId::new(0, 9) < RecordId::new(1, 0));
        assert_eq!(RecordId::new(2, 5), RecordId::new(2, 5));
    }

    #[test]
    fn test_record_id_next_wraps_pages() {
        let rid = RecordId::new(0, RECORDS_PER_PAGE as i32 - 1);
        assert_eq!(rid.next(), RecordId::new(1, 0));
        assert_eq!(RecordId::new(1, 0).next(), RecordId::new(1, 1));
    }

    #[test]
    fn test_record_id_bytes_roundtrip() {
        let rid = RecordId::new(7, 3);
        assert_eq!(RecordId::from_bytes(&rid.to_bytes()), rid);
    }

    #[test]
    fn test_record_bytes_roundtrip() {
        let record = Record {
            key: -42,
            value: "hello world".to_string(),
        };
        let bytes = record.to_bytes();
        assert_eq!(Record::from_bytes(&bytes).unwrap(), record);
    }

    #[test]
    fn test_record_from_bytes_rejects_bad_length() {
        let mut buf = [0u8; RECORD_SIZE];
        buf[4..6].copy_from_slice(&(MAX_VALUE_SIZE as u16 + 1).to_le_bytes());
        assert!(Record::from_bytes(&buf).is_none());
        assert!(Record::from_bytes(&buf[..3]).is_none());
    }

    #[test]
    fn test_append_assigns_sequential_rids() {
        let dir = tempdir().unwrap();
        let mut rf =
            RecordFile::open(dir.path().join("t.tbl"), AccessMode::ReadWrite).unwrap();

        let mut expected = RecordId::new(0, 0);
        for i in 0..(RECORDS_PER_PAGE as i32 * 2 + 3) {
            let rid = rf.append(i, "v").unwrap();
            assert_eq!(rid, expected);
            expected = expected.next();
        }
        assert_eq!(rf.end_rid(), expected);
        assert_eq!(expected.pid, 2);
        assert_eq!(expected.sid, 3);
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = tempdir().unwrap();
        let mut rf =
            RecordFile::open(dir.path().join("t.tbl"), AccessMode::ReadWrite).unwrap();

        let rid1 = rf.append(10, "ten").unwrap();
        let rid2 = rf.append(20, "twenty").unwrap();

        assert_eq!(rf.read(rid1).unwrap(), (10, "ten".to_string()));
        assert_eq!(rf.read(rid2).unwrap(), (20, "twenty".to_string()));
    }

    #[test]
    fn test_read_invalid_rid() {
        let dir = tempdir().unwrap();
        let mut rf =
            RecordFile::open(dir.path().join("t.tbl"), AccessMode::ReadWrite).unwrap();
        rf.append(1, "one").unwrap();

        assert!(matches!(
            rf.read(RecordId::new(0, 1)),
            Err(TarnError::InvalidRid { .. })
        ));
        assert!(matches!(
            rf.read(RecordId::new(-1, 0)),
            Err(TarnError::InvalidRid { .. })
        ));
    }

    #[test]
    fn test_value_too_large() {
        let dir = tempdir().unwrap();
        let mut rf =
            RecordFile::open(dir.path().join("t.tbl"), AccessMode::ReadWrite).unwrap();

        let big = "x".repeat(MAX_VALUE_SIZE + 1);
        assert!(matches!(
            rf.append(1, &big),
            Err(TarnError::ValueTooLarge { .. })
        ));

        let exact = "y".repeat(MAX_VALUE_SIZE);
        let rid = rf.append(2, &exact).unwrap();
        assert_eq!(rf.read(rid).unwrap().1, exact);
    }

    #[test]
    fn test_empty_value() {
        let dir = tempdir().unwrap();
        let mut rf =
            RecordFile::open(dir.path().join("t.tbl"), AccessMode::ReadWrite).unwrap();

        let rid = rf.append(5, "").unwrap();
        assert_eq!(rf.read(rid).unwrap(), (5, String::new()));
    }

    #[test]
    fn test_scan_iterates_in_order() {
        let dir = tempdir().unwrap();
        let mut rf =
            RecordFile::open(dir.path().join("t.tbl"), AccessMode::ReadWrite).unwrap();

        let n = RECORDS_PER_PAGE as i32 + 5;
        for i in 0..n {
            rf.append(i * 10, &format!("v{}", i)).unwrap();
        }

        let records: Vec<_> = rf.scan().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), n as usize);

        let mut expected = RecordId::new(0, 0);
        for (i, (rid, key, value)) in records.iter().enumerate() {
            assert_eq!(*rid, expected);
            assert_eq!(*key, i as i32 * 10);
            assert_eq!(value, &format!("v{}", i));
            expected = expected.next();
        }
    }

    #[test]
    fn test_end_rid_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.tbl");

        let end = {
            let mut rf = RecordFile::open(&path, AccessMode::ReadWrite).unwrap();
            for i in 0..(RECORDS_PER_PAGE as i32 + 2) {
                rf.append(i, "v").unwrap();
            }
            rf.close().unwrap();
            rf.end_rid()
        };

        let rf = RecordFile::open(&path, AccessMode::ReadOnly).unwrap();
        assert_eq!(rf.end_rid(), end);
        assert_eq!(rf.read(RecordId::new(1, 1)).unwrap().0, RECORDS_PER_PAGE as i32 + 1);
    }

    #[test]
    fn test_end_rid_on_page_boundary() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.tbl");

        {
            let mut rf = RecordFile::open(&path, AccessMode::ReadWrite).unwrap();
            for i in 0..RECORDS_PER_PAGE as i32 {
                rf.append(i, "v").unwrap();
            }
            rf.close().unwrap();
        }

        let rf = RecordFile::open(&path, AccessMode::ReadOnly).unwrap();
        assert_eq!(rf.end_rid(), RecordId::new(1, 0));
    }
}
