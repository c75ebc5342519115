//! System entropy for TPM consumers
//!
//! Randomness is read from the OS entropy device rather than through a chip
//! command. The source is opened on first use and kept for the life of the
//! process, independent of any TPM device handle.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use spin::Mutex;

use crate::error::{TpmError, TpmResult};

/// System entropy device
pub const ENTROPY_SOURCE_PATH: &str = "/dev/urandom";

/// Process-wide entropy source, opened lazily
static ENTROPY: Mutex<Option<EntropySource<File>>> = Mutex::new(None);

/// Byte source for random data
#[derive(Debug)]
pub struct EntropySource<R: Read> {
    reader: R,
}

impl EntropySource<File> {
    /// Open an entropy device
    pub fn open(path: &Path) -> TpmResult<Self> {
        match File::open(path) {
            Ok(file) => Ok(Self::new(file)),
            Err(err) => {
                log::error!("cannot open entropy source {}: {}", path.display(), err);
                Err(TpmError::Unknown)
            }
        }
    }
}

impl<R: Read> EntropySource<R> {
    /// Wrap an existing reader
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Fill `buf` from a single read; a short read is an error
    pub fn fill(&mut self, buf: &mut [u8]) -> TpmResult<()> {
        match self.reader.read(buf) {
            Ok(n) if n == buf.len() => Ok(()),
            Ok(n) => {
                log::warn!("short entropy read: {} of {} bytes", n, buf.len());
                Err(TpmError::Unknown)
            }
            Err(err) => {
                log::warn!("entropy read failed: {}", err);
                Err(TpmError::Unknown)
            }
        }
    }
}

/// Fill `buf` with random bytes from the system entropy device
pub fn get_random(buf: &mut [u8]) -> TpmResult<()> {
    let mut slot = ENTROPY.lock();

    if slot.is_none() {
        *slot = Some(EntropySource::open(Path::new(ENTROPY_SOURCE_PATH))?);
    }

    match slot.as_mut() {
        Some(source) => source.fill(buf),
        None => Err(TpmError::Unknown),
    }
}
