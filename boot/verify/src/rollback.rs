//! Firmware rollback selection
//!
//! Rollback counters combine a key version (upper 16 bits) and a firmware
//! version (lower 16 bits). A slot is bootable only if it verified and is not
//! older than the stored counter on either half.

use core::fmt;

use crate::error::{Result, VerifyError};

/// Firmware slot evaluated at boot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FirmwareSlot {
    /// Key block, preamble and body signatures all verified
    pub verified: bool,
    /// Data key version from the key block
    pub key_version: u16,
    /// Firmware version from the preamble
    pub firmware_version: u16,
}

impl FirmwareSlot {
    /// Verified slot carrying the given versions
    pub const fn verified(key_version: u16, firmware_version: u16) -> Self {
        Self {
            verified: true,
            key_version,
            firmware_version,
        }
    }

    /// Slot that failed signature verification
    pub const fn unverified() -> Self {
        Self {
            verified: false,
            key_version: 0,
            firmware_version: 0,
        }
    }

    /// Combined rollback counter value of this slot
    pub const fn combined_version(&self) -> u32 {
        combined_version(self.key_version, self.firmware_version)
    }
}

/// Pack key and firmware versions into one counter value
pub const fn combined_version(key_version: u16, firmware_version: u16) -> u32 {
    ((key_version as u32) << 16) | firmware_version as u32
}

/// Outcome of a successful selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Index of the slot to boot
    pub slot: usize,
    /// Lowest combined version among acceptable slots that were examined
    pub lowest_version: u32,
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {} (lowest {:#010x})", self.slot, self.lowest_version)
    }
}

/// Pick the firmware slot to boot
///
/// The first acceptable slot wins. Later slots are still examined so the
/// lowest acceptable version can be tracked, unless the chosen slot already
/// matches `stored_version` exactly.
pub fn select_firmware(candidates: &[FirmwareSlot], stored_version: u32) -> Result<Selection> {
    let stored_key_version = stored_version >> 16;
    let mut lowest_version = u32::MAX;
    let mut chosen = None;

    for (index, slot) in candidates.iter().enumerate() {
        if !slot.verified {
            log::debug!("firmware slot {}: verification failed", index);
            continue;
        }

        if u32::from(slot.key_version) < stored_key_version {
            log::warn!(
                "firmware slot {}: key rollback ({} < {})",
                index,
                slot.key_version,
                stored_key_version
            );
            continue;
        }

        let combined = slot.combined_version();
        if combined < stored_version {
            log::warn!(
                "firmware slot {}: version rollback ({:#010x} < {:#010x})",
                index,
                combined,
                stored_version
            );
            continue;
        }

        lowest_version = lowest_version.min(combined);

        if chosen.is_some() {
            continue;
        }

        log::debug!("firmware slot {} is valid", index);
        chosen = Some(index);

        if combined == stored_version {
            break;
        }
    }

    match chosen {
        Some(slot) => Ok(Selection {
            slot,
            lowest_version,
        }),
        None => {
            log::error!("no good firmware among {} slots", candidates.len());
            Err(VerifyError::NoGoodFirmware)
        }
    }
}
