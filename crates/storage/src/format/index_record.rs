//! Offset index record format.
//!
//! Index files are a flat sequence of fixed-size records, one per indexed
//! chunk, in non-decreasing offset order.
//!
//! # Record Layout
//!
//! ```text
//! ┌────────────┬────────────────┬────────────────┬──────────┐
//! │ Offset (8) │ FileOffset (8) │ TailOffset (8) │ CRC32 (4)│
//! └────────────┴────────────────┴────────────────┴──────────┘
//! ```

use byteorder::ByteOrder;
use tidelog_core::{Endianness, Offset};

/// Size of one index record in bytes
pub const INDEX_RECORD_SIZE: usize = 28;

/// Maps a chunk's first offset to its position in the segment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    /// Offset of the first message of the chunk
    pub offset: Offset,
    /// Position of the chunk header within the segment file
    pub file_offset: u64,
    /// Last offset written to the segment when this record was produced
    pub tail_offset: Offset,
}

impl IndexRecord {
    /// Serialize record to bytes.
    pub fn to_bytes(&self) -> [u8; INDEX_RECORD_SIZE] {
        let mut bytes = [0u8; INDEX_RECORD_SIZE];
        Endianness::write_u64(&mut bytes[0..8], self.offset);
        Endianness::write_u64(&mut bytes[8..16], self.file_offset);
        Endianness::write_u64(&mut bytes[16..24], self.tail_offset);
        let crc = crc32fast::hash(&bytes[..24]);
        Endianness::write_u32(&mut bytes[24..28], crc);
        bytes
    }

    /// Deserialize record from bytes.
    ///
    /// Returns `None` if the checksum does not match.
    pub fn from_bytes(bytes: &[u8; INDEX_RECORD_SIZE]) -> Option<Self> {
        let stored = Endianness::read_u32(&bytes[24..28]);
        if crc32fast::hash(&bytes[..24]) != stored {
            return None;
        }
        Some(IndexRecord {
            offset: Endianness::read_u64(&bytes[0..8]),
            file_offset: Endianness::read_u64(&bytes[8..16]),
            tail_offset: Endianness::read_u64(&bytes[16..24]),
        })
    }
}

/// Parse records from a raw index file, stopping at the first torn or
/// invalid record.
pub fn parse_index(bytes: &[u8]) -> Vec<IndexRecord> {
    let mut records = Vec::with_capacity(bytes.len() / INDEX_RECORD_SIZE);
    for raw in bytes.chunks_exact(INDEX_RECORD_SIZE) {
        let mut buf = [0u8; INDEX_RECORD_SIZE];
        buf.copy_from_slice(raw);
        match IndexRecord::from_bytes(&buf) {
            Some(record) => records.push(record),
            None => break,
        }
    }
    records
}

/// Find the last record whose offset is at or before `target`.
///
/// Records must be sorted by offset.
pub fn floor_entry(records: &[IndexRecord], target: Offset) -> Option<&IndexRecord> {
    let idx = records.partition_point(|r| r.offset <= target);
    if idx == 0 {
        None
    } else {
        records.get(idx - 1)
    }
}
