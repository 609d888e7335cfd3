//! Error types for tidelog
//!
//! Every item-level operation (writes, reads, replication appends) reports
//! its outcome through a completion signal carrying this error type.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use crate::types::{Offset, SegmentId};
use std::io;
use thiserror::Error;

/// Result type alias for tidelog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the broker storage core
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (segment or index file operations)
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// Stored checksum does not match the bytes it covers
    #[error("Checksum mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Checksum read from disk
        expected: u32,
        /// Checksum computed over the bytes read
        computed: u32,
    },

    /// Data corruption detected (structurally invalid on-disk data)
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// A replicated chunk does not start where the local log ends
    #[error("Offset mismatch: expected {expected}, got {actual}")]
    OffsetMismatch {
        /// Next offset of the local log
        expected: Offset,
        /// Start offset carried by the chunk
        actual: Offset,
    },

    /// A replicated chunk targets a segment other than the active one
    #[error("Segment mismatch: active segment {active}, got {actual}")]
    SegmentMismatch {
        /// Active segment of the local log
        active: SegmentId,
        /// Segment id carried by the item
        actual: SegmentId,
    },

    /// Requested segment does not exist in the log directory
    #[error("Segment not found: {0}")]
    SegmentNotFound(SegmentId),

    /// A read scanned past its bound without reaching the requested offset
    #[error("Offset {offset} not reached after scanning {scanned} bytes")]
    ScanLimitExceeded {
        /// Requested offset
        offset: Offset,
        /// Bytes scanned from the nearest index entry
        scanned: u64,
    },

    /// A closed segment ends before the requested offset; the offset lives
    /// in a later segment
    #[error("Offset out of segment {segment_id}: segment ends at offset {end}")]
    OffsetOutOfSegment {
        /// Segment that was read
        segment_id: SegmentId,
        /// First offset after the segment's last chunk
        end: Offset,
    },

    /// The writer or reader servicing the item has shut down
    #[error("Writer closed")]
    WriterClosed,

    /// The enqueuing task was cancelled before the item reached the queue
    #[error("Enqueue cancelled")]
    Cancelled,

    /// Fan-out to followers failed under an ack policy that requires it
    #[error("Replication error: {0}")]
    Replication(String),

    /// Invalid operation or state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl Error {
    /// Whether this error reports damaged on-disk data.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::ChecksumMismatch { .. } | Error::Corruption(_))
    }
}
