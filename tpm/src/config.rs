//! Transport configuration
//!
//! The transport never inspects the process environment itself. Callers
//! build a [`TransportConfig`], usually through [`TransportConfig::from_env`],
//! and hand it to [`crate::TpmTransport::init`].

use std::path::PathBuf;
use std::time::Duration;

use crate::error::TpmResult;

/// Default TPM character device
pub const TPM_DEVICE_PATH: &str = "/dev/tpm0";

/// Environment switch: non-zero returns errors instead of exiting
pub const ENV_NO_EXIT: &str = "TPM_NO_EXIT";

/// Environment override for the device path
pub const ENV_DEVICE_PATH: &str = "TPM_DEVICE_PATH";

/// Open attempts made while the device reports busy (5 s at 10 ms)
pub const OPEN_RETRY_MAX_NUM: u32 = 500;

/// Delay between busy open attempts
pub const OPEN_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Attempts per device write or read
pub const COMM_RETRY_MAX_NUM: u32 = 3;

/// Process exit status used by [`FailurePolicy::Exit`]
pub const FAILURE_EXIT_STATUS: i32 = 1;

// =============================================================================
// FAILURE POLICY
// =============================================================================

/// What the caller does with an unrecoverable transport error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Terminate the process
    #[default]
    Exit,
    /// Return the error to the caller
    Return,
}

impl FailurePolicy {
    /// Interpret a `TPM_NO_EXIT` value
    ///
    /// The leading integer decides: non-zero selects [`FailurePolicy::Return`],
    /// zero or no digits at all keep [`FailurePolicy::Exit`].
    pub fn from_no_exit(value: &str) -> Self {
        let value = value.trim_start();
        let digits = value
            .strip_prefix(['+', '-'])
            .unwrap_or(value);
        let end = digits
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(digits.len());

        if digits[..end].bytes().any(|b| b != b'0') {
            Self::Return
        } else {
            Self::Exit
        }
    }

    /// Apply the policy to a transport result
    ///
    /// Under [`FailurePolicy::Exit`] an error terminates the process with
    /// [`FAILURE_EXIT_STATUS`]; otherwise the result passes through.
    pub fn enforce<T>(self, result: TpmResult<T>) -> TpmResult<T> {
        match (self, result) {
            (Self::Exit, Err(err)) => {
                log::error!("TPM: fatal transport error: {} ({:#x})", err, err.code());
                std::process::exit(FAILURE_EXIT_STATUS)
            }
            (_, result) => result,
        }
    }
}

// =============================================================================
// TRANSPORT CONFIG
// =============================================================================

/// Transport configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Character device to open
    pub device_path: PathBuf,
    /// Error handling policy for callers
    pub failure_policy: FailurePolicy,
    /// Open attempts while the device is busy
    pub open_retry_max: u32,
    /// Delay between busy open attempts
    pub open_retry_delay: Duration,
    /// Attempts per write or read
    pub comm_retry_max: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from(TPM_DEVICE_PATH),
            failure_policy: FailurePolicy::Exit,
            open_retry_max: OPEN_RETRY_MAX_NUM,
            open_retry_delay: OPEN_RETRY_DELAY,
            comm_retry_max: COMM_RETRY_MAX_NUM,
        }
    }
}

impl TransportConfig {
    /// Build from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(no_exit) = lookup(ENV_NO_EXIT) {
            config.failure_policy = FailurePolicy::from_no_exit(&no_exit);
        }
        if let Some(path) = lookup(ENV_DEVICE_PATH) {
            config.device_path = PathBuf::from(path);
        }

        config
    }

    /// Set the device path
    pub fn with_device_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.device_path = path.into();
        self
    }

    /// Set the failure policy
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

// =============================================================================
// TESTS
// =============================================================================
