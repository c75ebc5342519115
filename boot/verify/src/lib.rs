//! # Anchor Boot Verification
//!
//! Joins the secure record store and the TPM transport into the boot-time
//! verification flow.
//!
//! ## Flow
//!
//! ```text
//! start ──► open TPM ──► read record ──┬─ stored ──► init ──► verify_firmware ──► finish
//!                                      │              │             │               │
//!                                      │         bad CRC or    roll versions   persist if
//!                                      │         old version   forward         changed,
//!                                      │              ▼                        close TPM
//!                                      │         error: recovery
//!                                      └─ absent ──► create + init
//! ```
//!
//! A stored record that fails validation is never replaced implicitly;
//! [`BootSession::recreate_with`] is the explicit way to discard it.
//!
//! Store errors always come back as [`VerifyError`]. Transport errors pass
//! through the configured [`anchor_tpm::FailurePolicy`] first.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod error;
pub mod rollback;
pub mod session;
pub mod storage;

#[cfg(test)]
mod flow_tests;

pub use error::{Result, VerifyError};
pub use rollback::{combined_version, select_firmware, FirmwareSlot, Selection};
pub use session::{BootSession, MAX_NV_WRITES_PER_BOOT};
pub use storage::{FileStorage, MemoryStorage, RecordBytes, SecdataStorage};
