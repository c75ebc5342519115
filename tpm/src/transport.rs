//! TPM transport
//!
//! Owns the device handle and runs command/response exchanges over it.
//! Opening retries while another consumer holds the device; each write and
//! read is retried a bounded number of times.

use core::fmt;
use std::io;
use std::time::Instant;

use crate::config::TransportConfig;
use crate::device::{is_busy, CharDeviceOpener, Delay, DeviceOpener, ThreadDelay, TpmDevice};
use crate::error::{TpmError, TpmResult};
use crate::frame::{self, HexDump, TPM_MAX_COMMAND_SIZE};
use crate::random;

/// Transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// No device handle
    Closed,
    /// Device handle held
    Open,
}

/// Request/response channel to a TPM character device
pub struct TpmTransport<O: DeviceOpener = CharDeviceOpener, D: Delay = ThreadDelay> {
    config: TransportConfig,
    opener: O,
    delay: D,
    device: Option<O::Device>,
}

impl TpmTransport {
    /// Transport over the OS character device
    pub fn new() -> Self {
        Self::with_backend(CharDeviceOpener, ThreadDelay)
    }
}

impl Default for TpmTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: DeviceOpener, D: Delay> TpmTransport<O, D> {
    /// Transport over custom OS seams
    pub fn with_backend(opener: O, delay: D) -> Self {
        Self {
            config: TransportConfig::default(),
            opener,
            delay,
            device: None,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Current state
    pub fn state(&self) -> TransportState {
        if self.device.is_some() {
            TransportState::Open
        } else {
            TransportState::Closed
        }
    }

    /// Whether a device handle is held
    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Install `config` and open the device
    ///
    /// An already open transport keeps its handle and configuration.
    pub fn init(&mut self, config: TransportConfig) -> TpmResult<()> {
        if self.is_open() {
            log::debug!("TPM: already open, init ignored");
            return Ok(());
        }
        self.config = config;
        self.open()
    }

    /// Open the configured device
    ///
    /// Retries while the device reports busy, sleeping between attempts.
    pub fn open(&mut self) -> TpmResult<()> {
        if self.is_open() {
            return Ok(());
        }

        let path = &self.config.device_path;
        let attempts = self.config.open_retry_max.max(1);

        for attempt in 1..=attempts {
            match self.opener.open(path) {
                Ok(device) => {
                    log::debug!("TPM: opened {} (attempt {})", path.display(), attempt);
                    self.device = Some(device);
                    return Ok(());
                }
                Err(err) if is_busy(&err) => {
                    if attempt == 1 {
                        log::warn!("TPM: {} busy, retrying", path.display());
                    }
                    if attempt < attempts {
                        self.delay.delay(self.config.open_retry_delay);
                    }
                }
                Err(err) => {
                    log::error!("TPM: cannot open {}: {}", path.display(), err);
                    return Err(TpmError::OpenFailed);
                }
            }
        }

        log::error!(
            "TPM: {} still busy after {} attempts",
            path.display(),
            attempts
        );
        Err(TpmError::OpenFailed)
    }

    /// Release the device handle
    pub fn close(&mut self) {
        if self.device.take().is_some() {
            log::debug!("TPM: closed {}", self.config.device_path.display());
        }
    }

    // =========================================================================
    // EXCHANGE
    // =========================================================================

    /// Send `request` and copy the reply into `response`
    ///
    /// Returns the number of reply bytes. `response` is left untouched on
    /// every error.
    pub fn send_command(&mut self, request: &[u8], response: &mut [u8]) -> TpmResult<usize> {
        if request.is_empty() {
            return Err(TpmError::InputTooSmall);
        }
        let attempts = self.config.comm_retry_max.max(1);
        let device = self.device.as_mut().ok_or(TpmError::NoDevice)?;

        log::trace!("TPM request:\n{}", HexDump(request));
        let start = Instant::now();

        let written = retry(attempts, "write", || device.write(request)).ok_or_else(|| {
            log::error!("TPM: write failed after {} attempts", attempts);
            TpmError::WriteFailure
        })?;
        if written != request.len() {
            log::error!("TPM: short write, {} of {} bytes", written, request.len());
            return Err(TpmError::WriteFailure);
        }

        let mut reply = [0u8; TPM_MAX_COMMAND_SIZE];
        let received = retry(attempts, "read", || device.read(&mut reply)).ok_or_else(|| {
            log::error!("TPM: read failed after {} attempts", attempts);
            TpmError::ReadFailure
        })?;
        if received == 0 {
            log::error!("TPM: null read");
            return Err(TpmError::ReadEmpty);
        }
        if received > response.len() {
            log::error!(
                "TPM: reply of {} bytes exceeds {} byte buffer",
                received,
                response.len()
            );
            return Err(TpmError::ResponseTooLarge);
        }

        let reply = &reply[..received];
        response[..received].copy_from_slice(reply);

        log::trace!("TPM response:\n{}", HexDump(reply));
        log::trace!("TPM execution time: {}ms", start.elapsed().as_millis());

        frame::assert_exchange(request, reply);
        Ok(received)
    }

    /// Fill `buf` from the system entropy source
    pub fn get_random(&self, buf: &mut [u8]) -> TpmResult<()> {
        random::get_random(buf)
    }
}

impl<O: DeviceOpener, D: Delay> fmt::Debug for TpmTransport<O, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TpmTransport")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

/// Run `op` until it succeeds or `attempts` calls have failed
fn retry<T>(attempts: u32, what: &str, mut op: impl FnMut() -> io::Result<T>) -> Option<T> {
    for attempt in 1..=attempts {
        match op() {
            Ok(value) => return Some(value),
            Err(err) => {
                if attempt == 1 {
                    log::warn!("TPM: {} error: {}", what, err);
                }
            }
        }
    }
    None
}

// =============================================================================
// TESTS
// =============================================================================
