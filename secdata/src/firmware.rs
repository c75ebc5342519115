//! Firmware secure data record
//!
//! Fixed 10-byte layout, multi-byte fields little-endian:
//!
//! ```text
//! ┌────────────────┬───────┬──────────────────┬──────────────┬──────┐
//! │ struct_version │ flags │ fw_versions (u32) │ reserved[3]  │ crc8 │
//! │       0        │   1   │       2..6        │     6..9     │  9   │
//! └────────────────┴───────┴──────────────────┴──────────────┴──────┘
//! ```
//!
//! The checksum covers every byte before it. A record is valid only if the
//! checksum matches and `struct_version` is at least
//! [`SECDATA_FIRMWARE_MIN_VERSION`].

use core::fmt;

use bitflags::bitflags;
use static_assertions::{const_assert, const_assert_eq};

use crate::context::{BootContext, SharedStatus};
use crate::crc8::crc8;
use crate::error::{Result, SecdataError};

// =============================================================================
// LAYOUT
// =============================================================================

/// Size of the firmware secure data record in bytes
pub const SECDATA_FIRMWARE_SIZE: usize = 10;

/// Structure version written by `create`
pub const SECDATA_FIRMWARE_VERSION: u8 = 2;

/// Oldest structure version this implementation accepts
pub const SECDATA_FIRMWARE_MIN_VERSION: u8 = 2;

/// Field offsets
pub mod offset {
    /// Structure version
    pub const STRUCT_VERSION: usize = 0;
    /// Flags
    pub const FLAGS: usize = 1;
    /// Rollback counter
    pub const FW_VERSIONS: usize = 2;
    /// Reserved bytes
    pub const RESERVED: usize = 6;
    /// Checksum
    pub const CRC8: usize = 9;
}

const_assert_eq!(offset::FW_VERSIONS + 4, offset::RESERVED);
const_assert_eq!(offset::RESERVED + 3, offset::CRC8);
const_assert_eq!(offset::CRC8 + 1, SECDATA_FIRMWARE_SIZE);
const_assert!(SECDATA_FIRMWARE_MIN_VERSION <= SECDATA_FIRMWARE_VERSION);

bitflags! {
    /// Flags stored in the firmware secure data record
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SecdataFirmwareFlags: u8 {
        /// Last boot was in developer mode
        const LAST_BOOT_DEVELOPER = 1 << 0;
        /// Developer mode is enabled
        const DEV_MODE = 1 << 1;
    }
}

/// Parameters reachable through [`get`] and [`set`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FirmwareParam {
    /// Flags byte
    Flags = 0,
    /// Rollback counter
    Versions = 1,
}

impl FirmwareParam {
    /// Raw parameter identifier
    pub const fn id(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for FirmwareParam {
    type Error = SecdataError;

    fn try_from(id: u32) -> Result<Self> {
        match id {
            0 => Ok(Self::Flags),
            1 => Ok(Self::Versions),
            _ => Err(SecdataError::UnknownParam),
        }
    }
}

// =============================================================================
// DECODED VIEW
// =============================================================================

/// Decoded copy of the record fields
///
/// Read-only snapshot for logging and inspection; it is not validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecdataFirmware {
    /// Structure version
    pub struct_version: u8,
    /// Flags
    pub flags: SecdataFirmwareFlags,
    /// Rollback counter
    pub fw_versions: u32,
    /// Stored checksum
    pub crc8: u8,
}

impl SecdataFirmware {
    /// Decode raw record bytes
    pub fn decode(bytes: &[u8; SECDATA_FIRMWARE_SIZE]) -> Self {
        Self {
            struct_version: bytes[offset::STRUCT_VERSION],
            flags: SecdataFirmwareFlags::from_bits_retain(bytes[offset::FLAGS]),
            fw_versions: read_fw_versions(bytes),
            crc8: bytes[offset::CRC8],
        }
    }

    /// Key version half of the rollback counter
    pub const fn key_version(&self) -> u16 {
        (self.fw_versions >> 16) as u16
    }

    /// Firmware version half of the rollback counter
    pub const fn firmware_version(&self) -> u16 {
        (self.fw_versions & 0xFFFF) as u16
    }
}

impl fmt::Display for SecdataFirmware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{} flags={:#04x} fw_versions={:#010x} crc8={:#04x}",
            self.struct_version,
            self.flags.bits(),
            self.fw_versions,
            self.crc8
        )
    }
}

fn read_fw_versions(bytes: &[u8; SECDATA_FIRMWARE_SIZE]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset::FW_VERSIONS..offset::RESERVED]);
    u32::from_le_bytes(raw)
}

fn write_fw_versions(bytes: &mut [u8; SECDATA_FIRMWARE_SIZE], value: u32) {
    bytes[offset::FW_VERSIONS..offset::RESERVED].copy_from_slice(&value.to_le_bytes());
}

fn compute_crc8(bytes: &[u8; SECDATA_FIRMWARE_SIZE]) -> u8 {
    crc8(&bytes[..offset::CRC8])
}

fn refresh_crc8(bytes: &mut [u8; SECDATA_FIRMWARE_SIZE]) {
    bytes[offset::CRC8] = compute_crc8(bytes);
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Validate the record held by `ctx`
///
/// The checksum is verified before the version, so a corrupted record always
/// reports [`SecdataError::Integrity`].
pub fn check(ctx: &BootContext) -> Result<()> {
    let sec = ctx.secdata_firmware();

    if sec[offset::CRC8] != compute_crc8(sec) {
        log::debug!("secdata_firmware: bad CRC");
        return Err(SecdataError::Integrity);
    }

    if sec[offset::STRUCT_VERSION] < SECDATA_FIRMWARE_MIN_VERSION {
        log::debug!(
            "secdata_firmware: version {} incompatible (min {})",
            sec[offset::STRUCT_VERSION],
            SECDATA_FIRMWARE_MIN_VERSION
        );
        return Err(SecdataError::Version);
    }

    Ok(())
}

/// Overwrite the record with a fresh, current-version one
///
/// Marks the context changed. Does not touch the init status, so the new
/// record still has to go through [`init`].
pub fn create(ctx: &mut BootContext) -> Result<()> {
    let sec = ctx.secdata_firmware_mut();
    *sec = [0; SECDATA_FIRMWARE_SIZE];
    sec[offset::STRUCT_VERSION] = SECDATA_FIRMWARE_VERSION;
    refresh_crc8(sec);

    ctx.mark_secdata_firmware_changed();
    log::debug!("secdata_firmware: created v{}", SECDATA_FIRMWARE_VERSION);
    Ok(())
}

/// Check the record and open it for access
///
/// Snapshots the rollback counter into the shared data once, so that
/// consumers can read it without going through the accessors.
pub fn init(ctx: &mut BootContext) -> Result<()> {
    check(ctx)?;

    ctx.shared_mut()
        .status
        .insert(SharedStatus::SECDATA_FIRMWARE_INIT);

    let versions = get(ctx, FirmwareParam::Versions)?;
    ctx.shared_mut().fw_version_secdata = versions;
    Ok(())
}

/// Read a record field
pub fn get(ctx: &BootContext, param: FirmwareParam) -> Result<u32> {
    get_raw(ctx, param.id())
}

/// Read a record field by raw identifier
pub fn get_raw(ctx: &BootContext, id: u32) -> Result<u32> {
    if !ctx.is_secdata_firmware_initialized() {
        return Err(SecdataError::Uninitialized);
    }

    let sec = ctx.secdata_firmware();
    match FirmwareParam::try_from(id)? {
        FirmwareParam::Flags => Ok(u32::from(sec[offset::FLAGS])),
        FirmwareParam::Versions => Ok(read_fw_versions(sec)),
    }
}

/// Write a record field
pub fn set(ctx: &mut BootContext, param: FirmwareParam, value: u32) -> Result<()> {
    set_raw(ctx, param.id(), value)
}

/// Write a record field by raw identifier
///
/// Writing the value a field already holds is a no-op: the checksum and the
/// dirty flag stay untouched, so no persist cycle is triggered.
pub fn set_raw(ctx: &mut BootContext, id: u32, value: u32) -> Result<()> {
    if !ctx.is_secdata_firmware_initialized() {
        return Err(SecdataError::Uninitialized);
    }

    if get_raw(ctx, id) == Ok(value) {
        return Ok(());
    }

    let param = FirmwareParam::try_from(id)?;
    let sec = ctx.secdata_firmware_mut();

    match param {
        FirmwareParam::Flags => {
            let flags = u8::try_from(value).map_err(|_| SecdataError::Range)?;
            log::debug!(
                "secdata_firmware flags updated from {:#x} to {:#x}",
                sec[offset::FLAGS],
                flags
            );
            sec[offset::FLAGS] = flags;
        }
        FirmwareParam::Versions => {
            log::debug!(
                "secdata_firmware versions updated from {:#x} to {:#x}",
                read_fw_versions(sec),
                value
            );
            write_fw_versions(sec, value);
        }
    }

    refresh_crc8(sec);
    ctx.mark_secdata_firmware_changed();
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
