//! Error types for the binary wire protocol

use std::io;
use thiserror::Error;

/// Result type alias for wire protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Framing and body errors of the binary protocol
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Not enough bytes to decode the value
    #[error("Insufficient data: need {needed} bytes, have {available}")]
    InsufficientData {
        /// Bytes required
        needed: usize,
        /// Bytes available
        available: usize,
    },

    /// Header CRC does not match the header bytes
    #[error("Header checksum mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Checksum carried by the header
        expected: u32,
        /// Checksum computed over the header bytes
        computed: u32,
    },

    /// Opcode byte is not a known opcode
    #[error("Unknown opcode: {0}")]
    UnknownOpcode(u8),

    /// Header version is not the one this side speaks
    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Declared body length exceeds the configured limit
    #[error("Body of {length} bytes exceeds limit of {max}")]
    BodyTooLarge {
        /// Declared body length
        length: u32,
        /// Configured maximum
        max: u32,
    },

    /// Body does not match the layout its opcode requires
    #[error("Malformed body: {0}")]
    MalformedBody(String),

    /// Transport failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    /// Whether frame boundaries can no longer be trusted after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::ChecksumMismatch { .. }
                | ProtocolError::BodyTooLarge { .. }
                | ProtocolError::Io(_)
        )
    }
}
