//! TPM frame header helpers
//!
//! Command and response buffers share one header shape:
//!
//! ```text
//!   0   1   2   3   4   5   6 ...
//! | TAG  |     SIZE      | ORDINAL / RETURN CODE | payload ...
//! ```
//!
//! Fields are big-endian. The transport reads only the tag and the size.

use core::fmt;

/// Maximum TPM command/response size
pub const TPM_MAX_COMMAND_SIZE: usize = 4096;

/// Bytes covered by tag and size
pub const TPM_FRAME_HEADER_SIZE: usize = 6;

/// Frame tags
pub mod tag {
    /// Request without authorization session
    pub const RQU_COMMAND: u16 = 0x00C1;
    /// Request with one authorization session
    pub const RQU_AUTH1_COMMAND: u16 = 0x00C2;
    /// Request with two authorization sessions
    pub const RQU_AUTH2_COMMAND: u16 = 0x00C3;
    /// Response without authorization session
    pub const RSP_COMMAND: u16 = 0x00C4;
    /// Response with one authorization session
    pub const RSP_AUTH1_COMMAND: u16 = 0x00C5;
    /// Response with two authorization sessions
    pub const RSP_AUTH2_COMMAND: u16 = 0x00C6;
}

// =============================================================================
// SESSION CATEGORY
// =============================================================================

/// Authentication-session category of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCategory {
    /// No authorization session
    None,
    /// One authorization session
    Single,
    /// Two authorization sessions
    Double,
}

impl SessionCategory {
    /// Category of a request tag
    pub const fn from_request_tag(value: u16) -> Option<Self> {
        match value {
            tag::RQU_COMMAND => Some(Self::None),
            tag::RQU_AUTH1_COMMAND => Some(Self::Single),
            tag::RQU_AUTH2_COMMAND => Some(Self::Double),
            _ => None,
        }
    }

    /// Category of a response tag
    pub const fn from_response_tag(value: u16) -> Option<Self> {
        match value {
            tag::RSP_COMMAND => Some(Self::None),
            tag::RSP_AUTH1_COMMAND => Some(Self::Single),
            tag::RSP_AUTH2_COMMAND => Some(Self::Double),
            _ => None,
        }
    }

    /// Request tag of this category
    pub const fn request_tag(self) -> u16 {
        match self {
            Self::None => tag::RQU_COMMAND,
            Self::Single => tag::RQU_AUTH1_COMMAND,
            Self::Double => tag::RQU_AUTH2_COMMAND,
        }
    }

    /// Response tag of this category
    pub const fn response_tag(self) -> u16 {
        match self {
            Self::None => tag::RSP_COMMAND,
            Self::Single => tag::RSP_AUTH1_COMMAND,
            Self::Double => tag::RSP_AUTH2_COMMAND,
        }
    }
}

/// Whether a request/response tag pair belongs to the same category
pub fn is_matching_tag_pair(request_tag: u16, response_tag: u16) -> bool {
    match SessionCategory::from_request_tag(request_tag) {
        Some(category) => category.response_tag() == response_tag,
        None => false,
    }
}

// =============================================================================
// HEADER FIELDS
// =============================================================================

/// Tag field of a frame
pub fn frame_tag(frame: &[u8]) -> Option<u16> {
    match frame {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

/// Declared size field of a frame
pub fn frame_size(frame: &[u8]) -> Option<u32> {
    let raw = frame.get(2..TPM_FRAME_HEADER_SIZE)?;
    Some(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

/// Frame consistency of a completed exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCheck {
    /// Tags pair up and the declared size matches the received length
    Consistent,
    /// Request/response tags do not share a session category
    TagMismatch {
        /// Request tag (if present)
        request: Option<u16>,
        /// Response tag (if present)
        response: Option<u16>,
    },
    /// Declared response size differs from the bytes received
    SizeMismatch {
        /// Size field of the response
        declared: Option<u32>,
        /// Bytes actually received
        received: usize,
    },
}

/// Compare request and response headers
pub fn check_exchange(request: &[u8], response: &[u8]) -> FrameCheck {
    let request_tag = frame_tag(request);
    let response_tag = frame_tag(response);
    let paired = match (request_tag, response_tag) {
        (Some(rq), Some(rsp)) => is_matching_tag_pair(rq, rsp),
        _ => false,
    };
    if !paired {
        return FrameCheck::TagMismatch {
            request: request_tag,
            response: response_tag,
        };
    }

    let declared = frame_size(response);
    if declared != u32::try_from(response.len()).ok() {
        return FrameCheck::SizeMismatch {
            declared,
            received: response.len(),
        };
    }

    FrameCheck::Consistent
}

cfg_if::cfg_if! {
    if #[cfg(debug_assertions)] {
        /// Assert framing integrity of a completed exchange
        ///
        /// A mismatch means the byte stream itself is corrupted; it is a
        /// programming/security fault, never a recoverable result.
        pub(crate) fn assert_exchange(request: &[u8], response: &[u8]) {
            let outcome = check_exchange(request, response);
            assert!(
                outcome == FrameCheck::Consistent,
                "TPM framing corrupted: {:?}",
                outcome
            );
        }
    } else {
        #[inline(always)]
        pub(crate) fn assert_exchange(_request: &[u8], _response: &[u8]) {}
    }
}

// =============================================================================
// HEX DUMP
// =============================================================================

/// Hex dump of a byte slice, 16 bytes per line
#[derive(Debug, Clone, Copy)]
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.0.chunks(16).enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            for (j, byte) in line.iter().enumerate() {
                if j > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{:02x}", byte)?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: u16, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        out[..2].copy_from_slice(&tag.to_be_bytes());
        out[2..6].copy_from_slice(&(len as u32).to_be_bytes());
        out
    }

    #[test]
    fn test_header_fields() {
        let f = frame(tag::RQU_COMMAND, 10);
        assert_eq!(frame_tag(&f), Some(0x00C1));
        assert_eq!(frame_size(&f), Some(10));
        assert_eq!(frame_tag(&[0x00]), None);
        assert_eq!(frame_size(&[0x00, 0xC1, 0x00]), None);
    }

    #[test]
    fn test_tag_pairs() {
        for category in [SessionCategory::None, SessionCategory::Single, SessionCategory::Double] {
            assert!(is_matching_tag_pair(category.request_tag(), category.response_tag()));
            assert_eq!(
                SessionCategory::from_request_tag(category.request_tag()),
                Some(category)
            );
            assert_eq!(
                SessionCategory::from_response_tag(category.response_tag()),
                Some(category)
            );
        }
        assert!(!is_matching_tag_pair(tag::RQU_COMMAND, tag::RSP_AUTH1_COMMAND));
        assert!(!is_matching_tag_pair(tag::RSP_COMMAND, tag::RSP_COMMAND));
    }

    #[test]
    fn test_check_exchange() {
        let request = frame(tag::RQU_AUTH2_COMMAND, 14);
        assert_eq!(
            check_exchange(&request, &frame(tag::RSP_AUTH2_COMMAND, 10)),
            FrameCheck::Consistent
        );
        assert!(matches!(
            check_exchange(&request, &frame(tag::RSP_COMMAND, 10)),
            FrameCheck::TagMismatch { .. }
        ));

        let mut truncated = frame(tag::RSP_AUTH2_COMMAND, 12);
        truncated.truncate(10);
        assert_eq!(
            check_exchange(&request, &truncated),
            FrameCheck::SizeMismatch {
                declared: Some(12),
                received: 10
            }
        );
    }

    #[test]
    fn test_hex_dump() {
        let bytes: Vec<u8> = (0u8..18).collect();
        let dump = HexDump(&bytes).to_string();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00 01 02"));
        assert_eq!(lines[1], "10 11");
    }
}
