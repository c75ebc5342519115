//! # Anchor TPM Transport
//!
//! Reliable request/response exchanges with a TPM character device.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  Orchestrator    │  builds commands, applies FailurePolicy│
//! ├───────────────────────────────────────────────────────────┤
//! │  TpmTransport    │  open retry │ write/read retry │ checks│
//! ├───────────────────────────────────────────────────────────┤
//! │  DeviceOpener / TpmDevice / Delay  (OS seams)             │
//! ├───────────────────────────────────────────────────────────┤
//! │  /dev/tpm0 (or TPM_DEVICE_PATH)  │  /dev/urandom          │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! The transport treats command buffers as opaque beyond the frame header
//! (tag and declared size). Transient conditions are retried a bounded number
//! of times with a fixed delay; everything else surfaces as a [`TpmError`].
//! Whether an error terminates the process is decided by the caller through
//! [`FailurePolicy`].

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod config;
pub mod device;
pub mod error;
pub mod frame;
pub mod random;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{FailurePolicy, TransportConfig};
pub use device::{CharDeviceOpener, Delay, DeviceOpener, ThreadDelay, TpmDevice};
pub use error::{TpmError, TpmResult};
pub use frame::{SessionCategory, TPM_MAX_COMMAND_SIZE};
pub use random::get_random;
pub use transport::{TpmTransport, TransportState};
