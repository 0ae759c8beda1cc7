//! Paged file abstraction for page-level I/O.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tarn_common::page::{PageId, PAGE_SIZE};
use tarn_common::{Result, TarnError};

/// Access mode for an open page store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Read pages only. The file must already exist.
    ReadOnly,
    /// Read and write pages. The file is created if missing.
    ReadWrite,
}

/// State guarded by the file-handle lock.
struct Inner {
    /// The open file handle.
    file: File,
    /// Number of pages currently allocated in the file.
    num_pages: i32,
}

/// A file viewed as a dense sequence of fixed-size pages.
///
/// Pages are addressed by `PageId` starting at 0. Writing at `end_pid`
/// extends the file by one page; pages are never released. Writes are
/// durable after `close`.
pub struct PageStore {
    /// Open file handle and page count.
    inner: Mutex<Inner>,
    /// Path to the backing file.
    path: PathBuf,
    /// Access mode this store was opened with.
    mode: AccessMode,
    /// Enable fsync after every write.
    fsync_enabled: bool,
}

impl PageStore {
    /// Opens a page file.
    ///
    /// In `ReadWrite` mode the file is created if it does not exist; in
    /// `ReadOnly` mode a missing file is an error.
    pub fn open(path: impl AsRef<Path>, mode: AccessMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let result = match mode {
            AccessMode::ReadOnly => OpenOptions::new().read(true).open(&path),
            AccessMode::ReadWrite => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(&path),
        };
        let file = result.map_err(|source| TarnError::FileOpenFailed {
            path: path.display().to_string(),
            source,
        })?;

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / PAGE_SIZE as u64) as i32;

        Ok(Self {
            inner: Mutex::new(Inner { file, num_pages }),
            path,
            mode,
            fsync_enabled: false,
        })
    }

    /// Enables or disables fsync after each page write.
    pub fn with_fsync(mut self, enabled: bool) -> Self {
        self.fsync_enabled = enabled;
        self
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the smallest page id not yet allocated.
    pub fn end_pid(&self) -> PageId {
        self.inner.lock().num_pages
    }

    /// Reads page `pid` into `buf`.
    pub fn read(&self, pid: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        if pid < 0 {
            return Err(TarnError::InvalidPid { pid });
        }

        let mut inner = self.inner.lock();
        if pid >= inner.num_pages {
            return Err(TarnError::InvalidPid { pid });
        }

        let offset = (pid as u64) * (PAGE_SIZE as u64);
        inner
            .file
            .seek(SeekFrom::Start(offset))
            .map_err(|source| TarnError::FileSeekFailed { pid, source })?;
        inner
            .file
            .read_exact(buf)
            .map_err(|source| TarnError::FileReadFailed { pid, source })?;

        Ok(())
    }

    /// Writes `buf` to page `pid`.
    ///
    /// Writing at `end_pid` extends the file by one page; a pid beyond
    /// that is rejected.
    pub fn write(&self, pid: PageId, buf: &[u8; PAGE_SIZE]) -> Result<()> {
        if self.mode == AccessMode::ReadOnly {
            return Err(TarnError::ReadOnly);
        }
        if pid < 0 {
            return Err(TarnError::InvalidPid { pid });
        }

        let mut inner = self.inner.lock();
        if pid > inner.num_pages {
            return Err(TarnError::InvalidPid { pid });
        }

        let offset = (pid as u64) * (PAGE_SIZE as u64);
        inner
            .file
            .seek(SeekFrom::Start(offset))
            .map_err(|source| TarnError::FileSeekFailed { pid, source })?;
        inner
            .file
            .write_all(buf)
            .map_err(|source| TarnError::FileWriteFailed { pid, source })?;

        if self.fsync_enabled {
            inner.file.sync_all()?;
        }

        if pid == inner.num_pages {
            inner.num_pages = pid + 1;
        }

        Ok(())
    }

    /// Flushes pending writes to disk. The handle is released on drop.
    pub fn close(&self) -> Result<()> {
        if self.mode == AccessMode::ReadWrite {
            self.inner.lock().file.sync_all()?;
        }
        Ok(())
    }
}
