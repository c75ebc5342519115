//! Boot context shared between the store and the orchestrator.
//!
//! The context owns the record buffer. Only the store's operations write into
//! it; the orchestrator loads raw bytes in, reads them back out for persisting,
//! and clears the dirty flag once the persist succeeded.

use bitflags::bitflags;

use crate::firmware::SECDATA_FIRMWARE_SIZE;

bitflags! {
    /// Context flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ContextFlags: u32 {
        /// Firmware secure data changed and must be persisted
        const SECDATA_FIRMWARE_CHANGED = 1 << 0;
    }
}

bitflags! {
    /// Shared boot state status bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SharedStatus: u32 {
        /// Firmware secure data was checked and initialized this boot
        const SECDATA_FIRMWARE_INIT = 1 << 0;
    }
}

/// State shared with later consumers of the boot flow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SharedData {
    /// Status bits
    pub status: SharedStatus,
    /// Rollback counter snapshotted at init
    pub fw_version_secdata: u32,
}

/// Boot verification context
#[derive(Debug, Clone)]
pub struct BootContext {
    secdata_firmware: [u8; SECDATA_FIRMWARE_SIZE],
    flags: ContextFlags,
    shared: SharedData,
}

impl BootContext {
    /// Create a context with an all-zero record buffer
    pub const fn new() -> Self {
        Self {
            secdata_firmware: [0; SECDATA_FIRMWARE_SIZE],
            flags: ContextFlags::empty(),
            shared: SharedData {
                status: SharedStatus::empty(),
                fw_version_secdata: 0,
            },
        }
    }

    /// Create a context holding raw record bytes read from storage
    pub fn with_secdata_firmware(bytes: [u8; SECDATA_FIRMWARE_SIZE]) -> Self {
        let mut ctx = Self::new();
        ctx.secdata_firmware = bytes;
        ctx
    }

    /// Replace the record buffer with freshly read bytes
    ///
    /// Drops the init status bit, so the new bytes are unreadable until they
    /// pass another check.
    pub fn load_secdata_firmware(&mut self, bytes: &[u8; SECDATA_FIRMWARE_SIZE]) {
        self.secdata_firmware = *bytes;
        self.shared.status.remove(SharedStatus::SECDATA_FIRMWARE_INIT);
    }

    /// Raw record bytes, for persisting
    pub fn secdata_firmware(&self) -> &[u8; SECDATA_FIRMWARE_SIZE] {
        &self.secdata_firmware
    }

    pub(crate) fn secdata_firmware_mut(&mut self) -> &mut [u8; SECDATA_FIRMWARE_SIZE] {
        &mut self.secdata_firmware
    }

    /// Context flags
    pub fn flags(&self) -> ContextFlags {
        self.flags
    }

    /// Whether the record must be persisted
    pub fn is_secdata_firmware_changed(&self) -> bool {
        self.flags.contains(ContextFlags::SECDATA_FIRMWARE_CHANGED)
    }

    pub(crate) fn mark_secdata_firmware_changed(&mut self) {
        self.flags.insert(ContextFlags::SECDATA_FIRMWARE_CHANGED);
    }

    /// Acknowledge a successful persist
    pub fn clear_secdata_firmware_changed(&mut self) {
        self.flags.remove(ContextFlags::SECDATA_FIRMWARE_CHANGED);
    }

    /// Shared boot state
    pub fn shared(&self) -> &SharedData {
        &self.shared
    }

    pub(crate) fn shared_mut(&mut self) -> &mut SharedData {
        &mut self.shared
    }

    /// Whether the record passed init this boot
    pub fn is_secdata_firmware_initialized(&self) -> bool {
        self.shared
            .status
            .contains(SharedStatus::SECDATA_FIRMWARE_INIT)
    }
}

impl Default for BootContext {
    fn default() -> Self {
        Self::new()
    }
}
