//! Segment chunks
//!
//! A chunk is a contiguous, already-validated run of messages: the atomic
//! unit appended to a segment file and handed back to readers.

use crate::types::Offset;
use bytes::Bytes;

/// Contiguous batch of messages read from, or destined for, a segment.
///
/// Chunks are immutable once constructed. A chunk holds zero messages
/// exactly when its buffer is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentChunk {
    buffer: Bytes,
    start: Offset,
    length: u32,
}

impl SegmentChunk {
    /// Create a chunk of `length` messages starting at `start`.
    ///
    /// Returns `None` if exactly one of `buffer` and `length` is empty.
    pub fn new(buffer: Bytes, start: Offset, length: u32) -> Option<Self> {
        if buffer.is_empty() != (length == 0) {
            return None;
        }
        Some(SegmentChunk {
            buffer,
            start,
            length,
        })
    }

    /// Sentinel for "no message available at or after `start`".
    ///
    /// Shares the static empty buffer, so this never allocates.
    pub fn empty(start: Offset) -> Self {
        SegmentChunk {
            buffer: Bytes::new(),
            start,
            length: 0,
        }
    }

    /// Raw message bytes.
    pub fn data_block(&self) -> &Bytes {
        &self.buffer
    }

    /// Offset of the first message.
    pub fn start_offset(&self) -> Offset {
        self.start
    }

    /// Number of messages in the chunk.
    pub fn record_length(&self) -> u32 {
        self.length
    }

    /// Offset one past the last message.
    pub fn end_offset(&self) -> Offset {
        self.start + self.length as u64
    }

    /// Whether this is the empty sentinel.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Whether `offset` falls inside this chunk.
    pub fn contains(&self, offset: Offset) -> bool {
        offset >= self.start && offset < self.end_offset()
    }
}
