//! Committed tail of a partition log, published by the segment writer.
//!
//! Readers use it to tell "caught up, no data yet" apart from a missing
//! chunk, and to bound scans of the active segment to fully written bytes.

use parking_lot::RwLock;
use tidelog_core::{Offset, SegmentId};

/// Point-in-time view of the log tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailState {
    /// Segment currently accepting appends
    pub active_segment: SegmentId,
    /// Offset the next appended message will get
    pub next_offset: Offset,
    /// Bytes of the active segment holding complete chunks
    pub committed_len: u64,
}

/// Shared, writer-published tail state.
#[derive(Debug)]
pub struct LogTail {
    state: RwLock<TailState>,
}

impl LogTail {
    /// Create a tail at the given position.
    pub fn new(state: TailState) -> Self {
        LogTail {
            state: RwLock::new(state),
        }
    }

    /// Current tail.
    pub fn snapshot(&self) -> TailState {
        *self.state.read()
    }

    /// Offset the next appended message will get.
    pub fn next_offset(&self) -> Offset {
        self.state.read().next_offset
    }

    /// Segment currently accepting appends.
    pub fn active_segment(&self) -> SegmentId {
        self.state.read().active_segment
    }

    pub(crate) fn publish(&self, state: TailState) {
        *self.state.write() = state;
    }
}
