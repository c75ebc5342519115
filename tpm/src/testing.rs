//! Failure-injection doubles for the transport seams
//!
//! Scripted devices, openers and delays let tests drive every retry path
//! without a real TPM. Each double shares its call log through a cloneable
//! handle, so tests can inspect it after handing the double to a transport.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use crate::device::{Delay, DeviceOpener, TpmDevice};

// =============================================================================
// FRAMES
// =============================================================================

/// Build a frame with a correct size field
pub fn build_frame(tag: u16, ordinal: u32, payload: &[u8]) -> Vec<u8> {
    let size = 10 + payload.len();
    let mut frame = Vec::with_capacity(size);
    frame.extend_from_slice(&tag.to_be_bytes());
    frame.extend_from_slice(&(size as u32).to_be_bytes());
    frame.extend_from_slice(&ordinal.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

// =============================================================================
// SCRIPTED DEVICE
// =============================================================================

/// Outcome of one device write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStep {
    /// Accept the whole buffer
    Accept,
    /// Accept only this many bytes
    Short(usize),
    /// Fail with an OS error
    Fail(io::ErrorKind),
}

/// Outcome of one device read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStep {
    /// Return these bytes
    Reply(Vec<u8>),
    /// Fail with an OS error
    Fail(io::ErrorKind),
}

/// Calls observed by a [`ScriptedDevice`]
#[derive(Debug, Default)]
pub struct DeviceCalls {
    /// Buffers passed to successful writes
    pub written: Vec<Vec<u8>>,
    /// Write attempts, including failed ones
    pub write_attempts: usize,
    /// Read attempts, including failed ones
    pub read_attempts: usize,
}

/// Shared view of a device's call log
pub type DeviceLog = Rc<RefCell<DeviceCalls>>;

/// Device that plays back scripted write and read outcomes
///
/// Writes past the end of the script are accepted; reads past the end
/// return zero bytes.
#[derive(Debug, Default)]
pub struct ScriptedDevice {
    writes: VecDeque<WriteStep>,
    reads: VecDeque<ReadStep>,
    log: DeviceLog,
}

impl ScriptedDevice {
    /// Create an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Device that answers one command with `reply`
    pub fn replying(reply: Vec<u8>) -> Self {
        Self::new().then_read(ReadStep::Reply(reply))
    }

    /// Queue a write outcome
    pub fn then_write(mut self, step: WriteStep) -> Self {
        self.writes.push_back(step);
        self
    }

    /// Queue a read outcome
    pub fn then_read(mut self, step: ReadStep) -> Self {
        self.reads.push_back(step);
        self
    }

    /// Handle on the call log
    pub fn log(&self) -> DeviceLog {
        Rc::clone(&self.log)
    }
}

impl TpmDevice for ScriptedDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut log = self.log.borrow_mut();
        log.write_attempts += 1;
        match self.writes.pop_front().unwrap_or(WriteStep::Accept) {
            WriteStep::Accept => {
                log.written.push(buf.to_vec());
                Ok(buf.len())
            }
            WriteStep::Short(n) => {
                let n = n.min(buf.len());
                log.written.push(buf[..n].to_vec());
                Ok(n)
            }
            WriteStep::Fail(kind) => Err(io::Error::from(kind)),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.log.borrow_mut().read_attempts += 1;
        match self.reads.pop_front() {
            Some(ReadStep::Reply(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Some(ReadStep::Fail(kind)) => Err(io::Error::from(kind)),
            None => Ok(0),
        }
    }
}

// =============================================================================
// SCRIPTED OPENER
// =============================================================================

/// Outcome of one open attempt
#[derive(Debug)]
pub enum OpenStep {
    /// Device claimed by another consumer
    Busy,
    /// Fail with another OS error
    Fail(io::ErrorKind),
    /// Hand out this device
    Ready(ScriptedDevice),
}

/// Open attempts observed by a [`ScriptedOpener`]
pub type OpenLog = Rc<RefCell<Vec<PathBuf>>>;

/// Opener that plays back scripted open outcomes
///
/// Attempts past the end of the script fail with `NotFound`.
#[derive(Debug, Default)]
pub struct ScriptedOpener {
    steps: VecDeque<OpenStep>,
    log: OpenLog,
}

impl ScriptedOpener {
    /// Create an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Opener that reports busy `busy` times, then hands out `device`
    pub fn busy_then(busy: usize, device: ScriptedDevice) -> Self {
        let mut opener = Self::new();
        for _ in 0..busy {
            opener = opener.step(OpenStep::Busy);
        }
        opener.step(OpenStep::Ready(device))
    }

    /// Queue an open outcome
    pub fn step(mut self, step: OpenStep) -> Self {
        self.steps.push_back(step);
        self
    }

    /// Handle on the attempt log
    pub fn log(&self) -> OpenLog {
        Rc::clone(&self.log)
    }
}

impl DeviceOpener for ScriptedOpener {
    type Device = ScriptedDevice;

    fn open(&mut self, path: &Path) -> io::Result<ScriptedDevice> {
        self.log.borrow_mut().push(path.to_path_buf());
        match self.steps.pop_front() {
            Some(OpenStep::Ready(device)) => Ok(device),
            Some(OpenStep::Busy) => Err(io::Error::from(io::ErrorKind::ResourceBusy)),
            Some(OpenStep::Fail(kind)) => Err(io::Error::from(kind)),
            None => Err(io::Error::from(io::ErrorKind::NotFound)),
        }
    }
}

// =============================================================================
// RECORDING DELAY
// =============================================================================

/// Delay that records instead of sleeping
#[derive(Debug, Default, Clone)]
pub struct RecordingDelay {
    delays: Rc<RefCell<Vec<Duration>>>,
}

impl RecordingDelay {
    /// Create a recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far
    pub fn recorded(&self) -> Vec<Duration> {
        self.delays.borrow().clone()
    }
}

impl Delay for RecordingDelay {
    fn delay(&mut self, duration: Duration) {
        self.delays.borrow_mut().push(duration);
    }
}
