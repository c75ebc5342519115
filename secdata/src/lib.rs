//! # Anchor Secure Data Store
//!
//! Tamper-evident, version-controlled persistent state for the boot-time
//! trust chain. The firmware secure data record holds the rollback counter
//! and a handful of boot flags; it is persisted by the security chip and
//! validated here before any later boot stage may read it.
//!
//! ## Record Lifecycle
//!
//! 1. The orchestrator loads the raw record bytes into a [`BootContext`]
//! 2. [`firmware::init`] validates them (checksum first, then version)
//! 3. On failure the orchestrator decides whether to [`firmware::create`]
//! 4. Reads go through [`firmware::get`], writes through [`firmware::set`]
//! 5. A set dirty flag tells the orchestrator to persist the buffer
//!
//! Every accessor is gated on a successful `init`, so a corrupted or down-rev
//! record never reaches a consumer.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod context;
pub mod crc8;
pub mod error;
pub mod firmware;


pub use context::{BootContext, ContextFlags, SharedData, SharedStatus};
pub use crc8::crc8;
pub use error::{Result, SecdataError};
pub use firmware::{
    FirmwareParam, SecdataFirmware, SecdataFirmwareFlags, SECDATA_FIRMWARE_MIN_VERSION,
    SECDATA_FIRMWARE_SIZE, SECDATA_FIRMWARE_VERSION,
};
