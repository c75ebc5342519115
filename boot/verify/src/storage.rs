//! Backing storage for the secure record
//!
//! On hardware the record lives in a TPM NV index. The verification flow only
//! needs whole-record reads and writes, so storage is a small trait.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anchor_secdata::SECDATA_FIRMWARE_SIZE;

/// Raw record bytes
pub type RecordBytes = [u8; SECDATA_FIRMWARE_SIZE];

/// Whole-record storage
pub trait SecdataStorage {
    /// Read the stored record
    ///
    /// `Ok(None)` means no record was ever written. Stored bytes are returned
    /// as they are, whether or not they form a valid record.
    fn read(&mut self) -> io::Result<Option<RecordBytes>>;

    /// Replace the stored record with `buf`
    fn write(&mut self, buf: &RecordBytes) -> io::Result<()>;
}

// =============================================================================
// MEMORY STORAGE
// =============================================================================

/// In-memory record with write accounting and failure injection
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    record: Option<RecordBytes>,
    writes: usize,
    fail_reads: Option<io::ErrorKind>,
    failing_writes: usize,
}

impl MemoryStorage {
    /// Storage holding `bytes`
    pub fn new(bytes: RecordBytes) -> Self {
        Self {
            record: Some(bytes),
            ..Self::default()
        }
    }

    /// Storage with no record written yet
    pub fn empty() -> Self {
        Self::default()
    }

    /// Stored record, if any
    pub fn record(&self) -> Option<&RecordBytes> {
        self.record.as_ref()
    }

    /// Successful writes so far
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Make every read fail with `kind`
    pub fn fail_reads(mut self, kind: io::ErrorKind) -> Self {
        self.fail_reads = Some(kind);
        self
    }

    /// Make the next `count` writes fail
    pub fn fail_next_writes(&mut self, count: usize) {
        self.failing_writes = count;
    }
}

impl SecdataStorage for MemoryStorage {
    fn read(&mut self) -> io::Result<Option<RecordBytes>> {
        match self.fail_reads {
            Some(kind) => Err(io::Error::from(kind)),
            None => Ok(self.record),
        }
    }

    fn write(&mut self, buf: &RecordBytes) -> io::Result<()> {
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(io::Error::from(io::ErrorKind::Other));
        }
        self.record = Some(*buf);
        self.writes += 1;
        Ok(())
    }
}

// =============================================================================
// FILE STORAGE
// =============================================================================

/// Record kept in a regular file
///
/// A missing file means no record; a file of any other length than the
/// record size is an `InvalidData` error.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Storage at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SecdataStorage for FileStorage {
    fn read(&mut self) -> io::Result<Option<RecordBytes>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("secure record {} not found", self.path.display());
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let record = RecordBytes::try_from(data.as_slice()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "{}: expected {} bytes, found {}",
                    self.path.display(),
                    SECDATA_FIRMWARE_SIZE,
                    data.len()
                ),
            )
        })?;
        Ok(Some(record))
    }

    fn write(&mut self, buf: &RecordBytes) -> io::Result<()> {
        fs::write(&self.path, buf)
    }
}
