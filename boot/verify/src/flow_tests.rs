//! Whole-boot scenarios
//!
//! Each test walks one or more boots through start, selection, persist and
//! finish, carrying the stored record from boot to boot.

use std::io;

use anchor_secdata::firmware::FirmwareParam;
use anchor_secdata::{SecdataError, SecdataFirmware, SecdataFirmwareFlags};
use anchor_tpm::frame::tag;
use anchor_tpm::testing::{
    build_frame, OpenStep, RecordingDelay, ScriptedDevice, ScriptedOpener,
};
use anchor_tpm::{FailurePolicy, TpmError, TpmTransport, TransportConfig};

use crate::{
    BootSession, FileStorage, FirmwareSlot, MemoryStorage, RecordBytes, SecdataStorage,
    VerifyError, MAX_NV_WRITES_PER_BOOT,
};

type Session<S> = BootSession<S, ScriptedOpener, RecordingDelay>;

fn config() -> TransportConfig {
    TransportConfig::from_lookup(|key| match key {
        "TPM_NO_EXIT" => Some("1".into()),
        "TPM_DEVICE_PATH" => Some("/dev/tpm-flow".into()),
        _ => None,
    })
}

fn transport(device: ScriptedDevice) -> TpmTransport<ScriptedOpener, RecordingDelay> {
    TpmTransport::with_backend(ScriptedOpener::busy_then(2, device), RecordingDelay::new())
}

fn boot<S: SecdataStorage>(storage: S) -> Session<S> {
    BootSession::start_with(transport(ScriptedDevice::new()), config(), storage)
        .expect("boot starts")
}

fn stored(session: &Session<MemoryStorage>) -> RecordBytes {
    *session.storage().record().expect("record persisted")
}

/// Record persisted by a first boot with the given rollback counter
fn provisioned(fw_versions: u32) -> RecordBytes {
    let mut session = boot(MemoryStorage::empty());
    session
        .set(FirmwareParam::Versions, fw_versions)
        .expect("initialized");
    session.finish().expect("finish");
    stored(&session)
}

#[test]
fn test_config_from_environment_lookup() {
    let config = config();
    assert_eq!(config.failure_policy, FailurePolicy::Return);
    assert_eq!(config.device_path.to_str(), Some("/dev/tpm-flow"));
}

#[test]
fn test_first_boot_then_update() {
    // First boot on empty storage: record is created and persisted.
    let mut session = boot(MemoryStorage::empty());
    session
        .verify_firmware(&[FirmwareSlot::verified(1, 1), FirmwareSlot::verified(1, 1)])
        .expect("good firmware");
    session.finish().expect("finish");
    let record = stored(&session);
    assert_eq!(session.storage().writes(), 1);
    assert_eq!(SecdataFirmware::decode(&record).fw_versions, 0x0001_0001);

    // Second boot: same firmware, nothing to write.
    let mut session = boot(MemoryStorage::new(record));
    session
        .verify_firmware(&[FirmwareSlot::verified(1, 1), FirmwareSlot::verified(1, 1)])
        .expect("good firmware");
    session.finish().expect("finish");
    assert_eq!(session.storage().writes(), 0);

    // Third boot: both slots updated, counter moves to the lower of the two.
    let mut session = boot(MemoryStorage::new(record));
    let selection = session
        .verify_firmware(&[FirmwareSlot::verified(2, 4), FirmwareSlot::verified(2, 3)])
        .expect("good firmware");
    assert_eq!(selection.slot, 0);
    session.finish().expect("finish");
    let decoded = SecdataFirmware::decode(&stored(&session));
    assert_eq!(decoded.key_version(), 2);
    assert_eq!(decoded.firmware_version(), 3);
}

#[test]
fn test_rollback_attempt_goes_to_recovery() {
    let record = provisioned(0x0003_0002);

    let mut session = boot(MemoryStorage::new(record));
    let err = session
        .verify_firmware(&[FirmwareSlot::verified(2, 9), FirmwareSlot::verified(3, 1)])
        .expect_err("both slots roll back");
    assert_eq!(err, VerifyError::NoGoodFirmware);
    assert!(err.requires_recovery());
    session.finish().expect("finish");
    assert_eq!(session.storage().writes(), 0);
}

#[test]
fn test_corrupt_record_keeps_rollback_protection() {
    let mut record = provisioned(0x0003_0002);
    record[7] ^= 0x01;
    let mut storage = MemoryStorage::new(record);

    // A damaged record stops the boot instead of being replaced.
    let err = BootSession::start_with(transport(ScriptedDevice::new()), config(), storage.clone())
        .expect_err("corrupt record");
    assert_eq!(err, VerifyError::Secdata(SecdataError::Integrity));
    assert!(err.requires_recovery());
    assert_eq!(storage.read().expect("read"), Some(record));

    // The stored counter is intact once the damage is repaired, so the old
    // firmware is still refused.
    record[7] ^= 0x01;
    let mut session = boot(MemoryStorage::new(record));
    assert_eq!(session.get(FirmwareParam::Versions), Ok(0x0003_0002));
    assert_eq!(
        session.verify_firmware(&[FirmwareSlot::verified(1, 0)]),
        Err(VerifyError::NoGoodFirmware)
    );
    session.finish().expect("finish");
    assert_eq!(session.storage().writes(), 0);
}

#[test]
fn test_explicit_recreate_after_rejection() {
    let mut record = provisioned(0x0003_0002);
    record[4] ^= 0x80;

    let err = BootSession::start_with(
        transport(ScriptedDevice::new()),
        config(),
        MemoryStorage::new(record),
    )
    .expect_err("corrupt record");
    assert!(err.requires_recovery());

    let mut session = BootSession::recreate_with(
        transport(ScriptedDevice::new()),
        config(),
        MemoryStorage::new(record),
    )
    .expect("recreate");
    session.finish().expect("finish");

    let session = boot(MemoryStorage::new(stored(&session)));
    assert_eq!(session.get(FirmwareParam::Versions), Ok(0));
}

#[test]
fn test_developer_flag_survives_reboot() {
    let mut session = boot(MemoryStorage::empty());
    let flags = SecdataFirmwareFlags::LAST_BOOT_DEVELOPER | SecdataFirmwareFlags::DEV_MODE;
    session
        .set(FirmwareParam::Flags, u32::from(flags.bits()))
        .expect("flags fit");
    session.finish().expect("finish");

    let session = boot(MemoryStorage::new(stored(&session)));
    assert_eq!(
        session.get(FirmwareParam::Flags),
        Ok(u32::from(flags.bits()))
    );
}

#[test]
fn test_persist_ceiling() {
    let mut session = boot(MemoryStorage::new(provisioned(0)));

    for n in 0..MAX_NV_WRITES_PER_BOOT {
        session
            .set(FirmwareParam::Flags, (n + 1) % 2)
            .expect("flags fit");
        assert_eq!(session.persist(), Ok(true));
    }
    assert_eq!(session.nv_writes(), MAX_NV_WRITES_PER_BOOT);

    session
        .set(FirmwareParam::Flags, (MAX_NV_WRITES_PER_BOOT + 1) % 2)
        .expect("flags fit");
    assert_eq!(session.persist(), Err(VerifyError::WriteLimit));
    assert!(session.context().is_secdata_firmware_changed());
    assert_eq!(session.storage().writes(), MAX_NV_WRITES_PER_BOOT as usize);

    assert_eq!(session.finish(), Err(VerifyError::WriteLimit));
    assert!(!session.transport().is_open());
}

#[test]
fn test_clean_record_does_not_count_against_ceiling() {
    let mut session = boot(MemoryStorage::new(provisioned(0)));
    for _ in 0..(MAX_NV_WRITES_PER_BOOT * 2) {
        session.set(FirmwareParam::Flags, 0).expect("unchanged");
        assert_eq!(session.persist(), Ok(false));
    }
    assert_eq!(session.nv_writes(), 0);
}

#[test]
fn test_command_exchange_through_session() {
    let request = build_frame(tag::RQU_COMMAND, 0x65, &[0, 0, 0, 5]);
    let reply = build_frame(tag::RSP_COMMAND, 0, &[0xAA; 4]);
    let device = ScriptedDevice::replying(reply.clone());
    let log = device.log();
    let mut session =
        BootSession::start_with(transport(device), config(), MemoryStorage::empty())
            .expect("boot starts");

    let mut response = [0u8; 64];
    let len = session
        .send_command(&request, &mut response)
        .expect("exchange");
    assert_eq!(&response[..len], reply.as_slice());
    assert_eq!(log.borrow().written, vec![request.clone()]);

    // A second command finds no scripted reply.
    assert_eq!(
        session.send_command(&request, &mut response),
        Err(VerifyError::Tpm(TpmError::ReadEmpty))
    );

    session.finish().expect("finish");
    assert_eq!(
        session.send_command(&request, &mut response),
        Err(VerifyError::Tpm(TpmError::NoDevice))
    );
}

#[test]
fn test_file_backed_boots() {
    let path = std::env::temp_dir().join(format!("anchor-flow-{}", std::process::id()));
    let _ = std::fs::remove_file(&path);

    let mut session = boot(FileStorage::new(&path));
    session
        .verify_firmware(&[FirmwareSlot::verified(4, 2)])
        .expect("good firmware");
    session.finish().expect("finish");

    let mut session = boot(FileStorage::new(&path));
    assert_eq!(session.get(FirmwareParam::Versions), Ok(0x0004_0002));
    assert!(!session.context().is_secdata_firmware_changed());
    session.finish().expect("finish");

    std::fs::write(&path, [0u8; 3]).expect("truncate record");
    let err = BootSession::start_with(
        transport(ScriptedDevice::new()),
        config(),
        FileStorage::new(&path),
    )
    .expect_err("short record");
    assert_eq!(err, VerifyError::Storage(io::ErrorKind::InvalidData));

    // An all-zero file is a stored record and fails its version check.
    std::fs::write(&path, [0u8; anchor_secdata::SECDATA_FIRMWARE_SIZE]).expect("zero record");
    let err = BootSession::start_with(
        transport(ScriptedDevice::new()),
        config(),
        FileStorage::new(&path),
    )
    .expect_err("zero record");
    assert_eq!(err, VerifyError::Secdata(SecdataError::Version));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_exit_policy_ends_boot_on_open_failure() {
    const CHILD_MARKER: &str = "ANCHOR_VERIFY_EXIT_CHILD";

    if std::env::var_os(CHILD_MARKER).is_some() {
        let transport = TpmTransport::with_backend(
            ScriptedOpener::new().step(OpenStep::Fail(io::ErrorKind::NotFound)),
            RecordingDelay::new(),
        );
        let config = TransportConfig::default().with_device_path("/dev/tpm-flow");
        let _ = BootSession::start_with(transport, config, MemoryStorage::empty());
        return;
    }

    let status = std::process::Command::new(std::env::current_exe().expect("test binary"))
        .args([
            "--exact",
            "flow_tests::test_exit_policy_ends_boot_on_open_failure",
            "--test-threads=1",
        ])
        .env(CHILD_MARKER, "1")
        .status()
        .expect("spawn test binary");
    assert_eq!(status.code(), Some(1));
}
