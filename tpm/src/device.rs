//! OS seams used by the transport
//!
//! The transport only needs three things from the platform: a way to open the
//! device path, a byte-stream device to write commands to and read replies
//! from, and a way to stall between busy open attempts.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Byte-stream TPM device
pub trait TpmDevice {
    /// Write a command, returning the number of bytes accepted
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Read a reply, returning the number of bytes received
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl TpmDevice for File {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Write::write(self, buf)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }
}

/// Opens TPM devices by path
pub trait DeviceOpener {
    /// Device type produced by this opener
    type Device: TpmDevice;

    /// Open the device at `path` for reading and writing
    fn open(&mut self, path: &Path) -> io::Result<Self::Device>;
}

/// Opens character devices read/write
///
/// The standard library opens every descriptor close-on-exec.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharDeviceOpener;

impl DeviceOpener for CharDeviceOpener {
    type Device = File;

    fn open(&mut self, path: &Path) -> io::Result<File> {
        OpenOptions::new().read(true).write(true).open(path)
    }
}

/// Blocking delay between retries
pub trait Delay {
    /// Stall the calling thread for `duration`
    fn delay(&mut self, duration: Duration);
}

/// Sleeps the current thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Whether an open failure means "claimed by someone else, try again"
pub fn is_busy(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::ResourceBusy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_classification() {
        assert!(is_busy(&io::Error::from(io::ErrorKind::ResourceBusy)));
        assert!(!is_busy(&io::Error::from(io::ErrorKind::NotFound)));
        assert!(!is_busy(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }

    #[test]
    fn test_char_device_opener_missing_path() {
        let err = CharDeviceOpener
            .open(Path::new("/nonexistent/anchor/tpm0"))
            .expect_err("path does not exist");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
