//! Error types for the boot verification flow

use core::fmt;
use std::io;

use anchor_secdata::SecdataError;
use anchor_tpm::TpmError;

/// Result type for verification operations
pub type Result<T> = core::result::Result<T, VerifyError>;

/// Base of the numeric codes owned by this crate
pub const VERIFY_ERROR_BASE: u32 = 0x1004_0000;

/// Boot verification error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    /// Secure record rejected an operation
    Secdata(SecdataError),
    /// TPM transport failure
    Tpm(TpmError),
    /// Record storage read or write failed
    Storage(io::ErrorKind),
    /// No firmware slot passed verification and rollback checks
    NoGoodFirmware,
    /// Per-boot NV write budget exhausted
    WriteLimit,
}

impl VerifyError {
    /// Get error name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Secdata(err) => err.name(),
            Self::Tpm(err) => err.name(),
            Self::Storage(_) => "VERIFY_STORAGE",
            Self::NoGoodFirmware => "VERIFY_NO_GOOD_FIRMWARE",
            Self::WriteLimit => "VERIFY_WRITE_LIMIT",
        }
    }

    /// Numeric error code
    pub const fn code(&self) -> u32 {
        match self {
            Self::Secdata(err) => err.code(),
            Self::Tpm(err) => err.code(),
            Self::Storage(_) => VERIFY_ERROR_BASE + 1,
            Self::NoGoodFirmware => VERIFY_ERROR_BASE + 2,
            Self::WriteLimit => VERIFY_ERROR_BASE + 3,
        }
    }

    /// Caller misused the record accessors
    pub const fn is_usage_error(&self) -> bool {
        match self {
            Self::Secdata(err) => err.is_usage_error(),
            _ => false,
        }
    }

    /// Boot must continue in recovery mode
    ///
    /// Everything except accessor misuse: an untrusted record, an unreachable
    /// TPM, failed storage, no bootable slot or an exhausted write budget.
    pub const fn requires_recovery(&self) -> bool {
        !self.is_usage_error()
    }

    pub(crate) fn storage(err: io::Error) -> Self {
        Self::Storage(err.kind())
    }
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Secdata(err) => write!(f, "{}", err),
            Self::Tpm(err) => write!(f, "TPM: {}", err),
            Self::Storage(kind) => write!(f, "secure record storage: {}", kind),
            Self::NoGoodFirmware => write!(f, "no good firmware found"),
            Self::WriteLimit => write!(f, "NV write limit reached for this boot"),
        }
    }
}

impl std::error::Error for VerifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tpm(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SecdataError> for VerifyError {
    fn from(err: SecdataError) -> Self {
        Self::Secdata(err)
    }
}

impl From<TpmError> for VerifyError {
    fn from(err: TpmError) -> Self {
        Self::Tpm(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_codes() {
        assert_eq!(
            VerifyError::from(SecdataError::Integrity).code(),
            SecdataError::Integrity.code()
        );
        assert_eq!(VerifyError::from(TpmError::ReadEmpty).code(), 0x5009);
        assert_eq!(VerifyError::WriteLimit.code(), 0x1004_0003);
    }

    #[test]
    fn test_recovery_classification() {
        assert!(VerifyError::NoGoodFirmware.requires_recovery());
        assert!(VerifyError::WriteLimit.requires_recovery());
        assert!(VerifyError::Tpm(TpmError::OpenFailed).requires_recovery());
        assert!(VerifyError::Storage(io::ErrorKind::Other).requires_recovery());
        assert!(VerifyError::Secdata(SecdataError::Integrity).requires_recovery());
        assert!(VerifyError::Secdata(SecdataError::Version).requires_recovery());

        for usage in [
            SecdataError::Uninitialized,
            SecdataError::Range,
            SecdataError::UnknownParam,
        ] {
            let err = VerifyError::Secdata(usage);
            assert!(err.is_usage_error());
            assert!(!err.requires_recovery());
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(
            VerifyError::Storage(io::ErrorKind::NotFound).to_string(),
            "secure record storage: entity not found"
        );
        assert_eq!(
            VerifyError::Tpm(TpmError::NoDevice).to_string(),
            "TPM: TPM device not opened"
        );
    }
}
