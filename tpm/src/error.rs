//! TPM transport error types

use core::fmt;

/// Result type for transport operations
pub type TpmResult<T> = Result<T, TpmError>;

// =============================================================================
// ERROR CODES
// =============================================================================

/// TPM response too large for the caller's buffer
pub const TPM_E_RESPONSE_TOO_LARGE: u32 = 0x0000_5005;
/// TPM device not opened
pub const TPM_E_NO_DEVICE: u32 = 0x0000_5006;
/// Command buffer empty
pub const TPM_E_INPUT_TOO_SMALL: u32 = 0x0000_5007;
/// Write to the TPM device failed
pub const TPM_E_WRITE_FAILURE: u32 = 0x0000_5008;
/// TPM device returned no data
pub const TPM_E_READ_EMPTY: u32 = 0x0000_5009;
/// Read from the TPM device failed
pub const TPM_E_READ_FAILURE: u32 = 0x0000_500A;
/// Generic failure
pub const ERROR_UNKNOWN: u32 = 0x1000_0001;

/// TPM transport error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpmError {
    /// Device handle not open
    NoDevice,
    /// Zero-length command
    InputTooSmall,
    /// Write failed or was short
    WriteFailure,
    /// Device returned zero bytes
    ReadEmpty,
    /// Read failed after retries
    ReadFailure,
    /// Reply larger than the output buffer
    ResponseTooLarge,
    /// Device could not be opened
    OpenFailed,
    /// Entropy source failure
    Unknown,
}

impl TpmError {
    /// Get error name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NoDevice => "TPM_E_NO_DEVICE",
            Self::InputTooSmall => "TPM_E_INPUT_TOO_SMALL",
            Self::WriteFailure => "TPM_E_WRITE_FAILURE",
            Self::ReadEmpty => "TPM_E_READ_EMPTY",
            Self::ReadFailure => "TPM_E_READ_FAILURE",
            Self::ResponseTooLarge => "TPM_E_RESPONSE_TOO_LARGE",
            Self::OpenFailed => "TPM_E_OPEN_FAILED",
            Self::Unknown => "ERROR_UNKNOWN",
        }
    }

    /// Numeric code reported to test harnesses
    pub const fn code(&self) -> u32 {
        match self {
            Self::NoDevice => TPM_E_NO_DEVICE,
            Self::InputTooSmall => TPM_E_INPUT_TOO_SMALL,
            Self::WriteFailure => TPM_E_WRITE_FAILURE,
            Self::ReadEmpty => TPM_E_READ_EMPTY,
            Self::ReadFailure => TPM_E_READ_FAILURE,
            Self::ResponseTooLarge => TPM_E_RESPONSE_TOO_LARGE,
            Self::OpenFailed | Self::Unknown => ERROR_UNKNOWN,
        }
    }

    /// Failure talking to an open device
    pub const fn is_communication_error(&self) -> bool {
        matches!(
            self,
            Self::WriteFailure | Self::ReadEmpty | Self::ReadFailure | Self::ResponseTooLarge
        )
    }
}

impl fmt::Display for TpmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDevice => write!(f, "TPM device not opened"),
            Self::InputTooSmall => write!(f, "TPM command is empty"),
            Self::WriteFailure => write!(f, "write failure to TPM device"),
            Self::ReadEmpty => write!(f, "null read from TPM device"),
            Self::ReadFailure => write!(f, "read failure from TPM device"),
            Self::ResponseTooLarge => write!(f, "TPM response too long for output buffer"),
            Self::OpenFailed => write!(f, "cannot open TPM device"),
            Self::Unknown => write!(f, "unknown error"),
        }
    }
}

impl std::error::Error for TpmError {}
