//! Error types for the secure data store
//!
//! Store errors are always handed back to the caller. Nothing here repairs a
//! record on its own; recreating a record is an orchestrator decision.

use core::fmt;

/// Result type for secure data operations
pub type Result<T> = core::result::Result<T, SecdataError>;

/// Base of the numeric error code range used by this crate
pub const SECDATA_ERROR_BASE: u32 = 0x1003_0000;

/// Secure data error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecdataError {
    /// Stored checksum does not match the record contents
    Integrity,
    /// Stored structure version is older than the minimum supported
    Version,
    /// Accessor called before the record was initialized this boot
    Uninitialized,
    /// Value outside the domain of the target field
    Range,
    /// Unrecognized field identifier
    UnknownParam,
}

impl SecdataError {
    /// Get error name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Integrity => "SECDATA_FIRMWARE_CRC",
            Self::Version => "SECDATA_FIRMWARE_VERSION",
            Self::Uninitialized => "SECDATA_FIRMWARE_UNINITIALIZED",
            Self::Range => "SECDATA_FIRMWARE_RANGE",
            Self::UnknownParam => "SECDATA_FIRMWARE_PARAM",
        }
    }

    /// Numeric error code, stable across releases
    pub const fn code(&self) -> u32 {
        SECDATA_ERROR_BASE
            + match self {
                Self::Integrity => 1,
                Self::Version => 2,
                Self::Uninitialized => 3,
                Self::Range => 4,
                Self::UnknownParam => 5,
            }
    }

    /// Record contents cannot be trusted and must be recreated before use
    pub const fn is_invalid_record(&self) -> bool {
        matches!(self, Self::Integrity | Self::Version)
    }

    /// Caller misused the accessor API
    pub const fn is_usage_error(&self) -> bool {
        matches!(self, Self::Uninitialized | Self::Range | Self::UnknownParam)
    }
}

impl fmt::Display for SecdataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integrity => write!(f, "secdata_firmware: bad CRC"),
            Self::Version => write!(f, "secdata_firmware: version incompatible"),
            Self::Uninitialized => write!(f, "secdata_firmware: not initialized"),
            Self::Range => write!(f, "secdata_firmware: value out of range"),
            Self::UnknownParam => write!(f, "secdata_firmware: unknown parameter"),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names() {
        assert_eq!(SecdataError::Integrity.name(), "SECDATA_FIRMWARE_CRC");
        assert_eq!(SecdataError::UnknownParam.name(), "SECDATA_FIRMWARE_PARAM");
    }

    #[test]
    fn test_error_codes_distinct() {
        let all = [
            SecdataError::Integrity,
            SecdataError::Version,
            SecdataError::Uninitialized,
            SecdataError::Range,
            SecdataError::UnknownParam,
        ];
        for (i, a) in all.iter().enumerate() {
            assert!(a.code() > SECDATA_ERROR_BASE);
            for b in &all[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
    }

    #[test]
    fn test_error_categories() {
        assert!(SecdataError::Integrity.is_invalid_record());
        assert!(SecdataError::Version.is_invalid_record());
        assert!(!SecdataError::Range.is_invalid_record());
        assert!(SecdataError::Uninitialized.is_usage_error());
    }
}
