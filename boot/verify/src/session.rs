//! Boot verification session
//!
//! A session owns the boot context, the record storage and the TPM
//! transport for one boot. It loads and validates the secure record, picks
//! the firmware slot, rolls the stored versions forward and persists the
//! record when it changed.

use core::fmt;

use anchor_secdata::firmware::{self, FirmwareParam};
use anchor_secdata::{BootContext, SecdataFirmware};
use anchor_tpm::{
    CharDeviceOpener, Delay, DeviceOpener, FailurePolicy, ThreadDelay, TpmTransport,
    TransportConfig,
};

use crate::error::{Result, VerifyError};
use crate::rollback::{select_firmware, FirmwareSlot, Selection};
use crate::storage::{RecordBytes, SecdataStorage};

/// NV writes allowed per boot before an unowned TPM starts refusing them
pub const MAX_NV_WRITES_PER_BOOT: u32 = 64;

/// Boot verification session
pub struct BootSession<S, O = CharDeviceOpener, D = ThreadDelay>
where
    S: SecdataStorage,
    O: DeviceOpener,
    D: Delay,
{
    ctx: BootContext,
    storage: S,
    transport: TpmTransport<O, D>,
    policy: FailurePolicy,
    nv_writes: u32,
}

impl<S: SecdataStorage> BootSession<S> {
    /// Start a session on the OS TPM device
    pub fn start(config: TransportConfig, storage: S) -> Result<Self> {
        Self::start_with(TpmTransport::new(), config, storage)
    }

    /// Start a session on the OS TPM device with a fresh record
    pub fn recreate(config: TransportConfig, storage: S) -> Result<Self> {
        Self::recreate_with(TpmTransport::new(), config, storage)
    }
}

impl<S, O, D> BootSession<S, O, D>
where
    S: SecdataStorage,
    O: DeviceOpener,
    D: Delay,
{
    /// Start a session on an existing transport
    ///
    /// Opens the transport, loads the record and initializes it. Only a
    /// missing record is created here. A stored record that fails its
    /// checksum or version check ends the session with that error; replacing
    /// it is the caller's decision, through [`BootSession::recreate_with`].
    pub fn start_with(
        transport: TpmTransport<O, D>,
        config: TransportConfig,
        storage: S,
    ) -> Result<Self> {
        let (mut session, stored) = Self::connect(transport, config, storage)?;

        match stored {
            Some(bytes) => session.load(&bytes)?,
            None => {
                log::info!("no secure record stored, creating");
                session.recreate_secdata()?;
            }
        }

        log::info!(
            "secure record: {}",
            SecdataFirmware::decode(session.ctx.secdata_firmware())
        );
        Ok(session)
    }

    /// Start a session that replaces whatever record is stored
    ///
    /// The stored bytes are not checked. The new record is persisted by the
    /// next [`BootSession::persist`].
    pub fn recreate_with(
        transport: TpmTransport<O, D>,
        config: TransportConfig,
        storage: S,
    ) -> Result<Self> {
        let (mut session, stored) = Self::connect(transport, config, storage)?;

        if let Some(bytes) = stored {
            log::warn!(
                "discarding stored secure record: {}",
                SecdataFirmware::decode(&bytes)
            );
        }
        session.recreate_secdata()?;
        Ok(session)
    }

    fn connect(
        mut transport: TpmTransport<O, D>,
        config: TransportConfig,
        mut storage: S,
    ) -> Result<(Self, Option<RecordBytes>)> {
        let policy = config.failure_policy;
        policy.enforce(transport.init(config))?;

        let stored = storage.read().map_err(VerifyError::storage)?;

        let session = Self {
            ctx: BootContext::new(),
            storage,
            transport,
            policy,
            nv_writes: 0,
        };
        Ok((session, stored))
    }

    fn load(&mut self, bytes: &RecordBytes) -> Result<()> {
        self.ctx.load_secdata_firmware(bytes);
        firmware::init(&mut self.ctx).map_err(|err| {
            log::error!(
                "secure record rejected ({}): {}",
                err,
                SecdataFirmware::decode(bytes)
            );
            VerifyError::from(err)
        })
    }

    /// Replace the record in the context with a fresh one
    ///
    /// Resets the rollback counter and flags to zero and marks the record
    /// for persisting.
    pub fn recreate_secdata(&mut self) -> Result<()> {
        firmware::create(&mut self.ctx)?;
        firmware::init(&mut self.ctx)?;
        Ok(())
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Boot context
    pub fn context(&self) -> &BootContext {
        &self.ctx
    }

    /// Record storage
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Mutable record storage
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// TPM transport
    pub fn transport(&self) -> &TpmTransport<O, D> {
        &self.transport
    }

    /// Failure policy applied to transport errors
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Record writes performed this boot
    pub fn nv_writes(&self) -> u32 {
        self.nv_writes
    }

    /// Read a record field
    pub fn get(&self, param: FirmwareParam) -> Result<u32> {
        Ok(firmware::get(&self.ctx, param)?)
    }

    /// Write a record field
    pub fn set(&mut self, param: FirmwareParam, value: u32) -> Result<()> {
        Ok(firmware::set(&mut self.ctx, param, value)?)
    }

    // =========================================================================
    // BOOT FLOW
    // =========================================================================

    /// Exchange one command with the TPM under the session's failure policy
    pub fn send_command(&mut self, request: &[u8], response: &mut [u8]) -> Result<usize> {
        let result = self.transport.send_command(request, response);
        if let Err(err) = &result {
            if err.is_communication_error() {
                log::warn!("TPM exchange failed: {} ({:#x})", err, err.code());
            }
        }
        Ok(self.policy.enforce(result)?)
    }

    /// Select the slot to boot and roll the stored versions forward
    ///
    /// The stored counter only moves up, and only to the lowest version among
    /// the acceptable slots.
    pub fn verify_firmware(&mut self, candidates: &[FirmwareSlot]) -> Result<Selection> {
        let stored = firmware::get(&self.ctx, FirmwareParam::Versions)?;
        let selection = select_firmware(candidates, stored)?;

        if selection.lowest_version > stored {
            log::info!(
                "rolling firmware versions forward {:#010x} -> {:#010x}",
                stored,
                selection.lowest_version
            );
            firmware::set(&mut self.ctx, FirmwareParam::Versions, selection.lowest_version)?;
        }

        log::info!("booting firmware {}", selection);
        Ok(selection)
    }

    /// Write the record back if it changed
    ///
    /// Returns whether a write happened. The dirty flag is cleared only after
    /// the storage accepted the record.
    pub fn persist(&mut self) -> Result<bool> {
        if !self.ctx.is_secdata_firmware_changed() {
            return Ok(false);
        }

        if self.nv_writes >= MAX_NV_WRITES_PER_BOOT {
            log::error!(
                "secure record not persisted: {} writes this boot",
                self.nv_writes
            );
            return Err(VerifyError::WriteLimit);
        }

        self.storage
            .write(self.ctx.secdata_firmware())
            .map_err(VerifyError::storage)?;
        self.nv_writes += 1;
        self.ctx.clear_secdata_firmware_changed();

        log::debug!("secure record persisted ({} this boot)", self.nv_writes);
        Ok(true)
    }

    /// Persist pending changes and release the TPM
    ///
    /// The transport is closed even when persisting fails.
    pub fn finish(&mut self) -> Result<()> {
        let persisted = self.persist();
        self.transport.close();
        persisted.map(|_| ())
    }
}

impl<S, O, D> fmt::Debug for BootSession<S, O, D>
where
    S: SecdataStorage,
    O: DeviceOpener,
    D: Delay,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootSession")
            .field("ctx", &self.ctx)
            .field("transport", &self.transport)
            .field("policy", &self.policy)
            .field("nv_writes", &self.nv_writes)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
