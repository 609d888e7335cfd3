//! Chunk record format.
//!
//! Every chunk appended to a segment is a fixed-size header followed by the
//! message bytes.
//!
//! # Chunk Layout
//!
//! ```text
//! ┌──────────┬───────────────┬───────────┬────────────────┬──────────┬──────────────┐
//! │ Flags (1)│ BodyLength (4)│ Start (8) │ RecordLength(4)│ CRC32 (4)│ Body (var)   │
//! └──────────┴───────────────┴───────────┴────────────────┴──────────┴──────────────┘
//! ```
//!
//! The CRC is CRC-32 (IEEE) over the 17 header bytes before the CRC field
//! followed by the whole body, stored as the `i32` bit pattern of the sum.
//! Encoding writes a zero placeholder, computes the sum, then patches it in.

use bytes::Bytes;
use byteorder::ByteOrder;
use crc32fast::Hasher;
use tidelog_core::{Endianness, Error, SegmentChunk};

/// Size of the chunk header in bytes
pub const CHUNK_HEADER_SIZE: usize = 21;

/// Position of the CRC field inside the header
const CRC_POSITION: usize = 17;

/// Header preceding every chunk body on disk. Field order is the
/// serialization order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkHeader {
    /// Reserved flag bits
    pub flags: u8,
    /// Number of body bytes following the header
    pub body_length: u32,
    /// Offset of the first message
    pub start: u64,
    /// Number of messages in the chunk
    pub record_length: u32,
    /// Checksum over header fields and body
    pub crc: i32,
}

impl ChunkHeader {
    /// Serialize header to bytes, CRC field included as stored.
    pub fn to_bytes(&self) -> [u8; CHUNK_HEADER_SIZE] {
        let mut bytes = [0u8; CHUNK_HEADER_SIZE];
        bytes[0] = self.flags;
        Endianness::write_u32(&mut bytes[1..5], self.body_length);
        Endianness::write_u64(&mut bytes[5..13], self.start);
        Endianness::write_u32(&mut bytes[13..17], self.record_length);
        Endianness::write_i32(&mut bytes[17..21], self.crc);
        bytes
    }

    /// Deserialize header from bytes without verifying the CRC.
    pub fn from_bytes(bytes: &[u8; CHUNK_HEADER_SIZE]) -> Self {
        ChunkHeader {
            flags: bytes[0],
            body_length: Endianness::read_u32(&bytes[1..5]),
            start: Endianness::read_u64(&bytes[5..13]),
            record_length: Endianness::read_u32(&bytes[13..17]),
            crc: Endianness::read_i32(&bytes[17..21]),
        }
    }

    /// Total encoded size of the chunk this header describes.
    pub fn chunk_size(&self) -> usize {
        CHUNK_HEADER_SIZE + self.body_length as usize
    }

    /// Verify the stored CRC against the header bytes and body.
    pub fn verify(&self, body: &[u8]) -> Result<(), ChunkFormatError> {
        let bytes = self.to_bytes();
        let computed = compute_crc(&bytes[..CRC_POSITION], body);
        let expected = self.crc as u32;
        if computed != expected {
            return Err(ChunkFormatError::ChecksumMismatch { expected, computed });
        }
        Ok(())
    }
}

fn compute_crc(header: &[u8], body: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(header);
    hasher.update(body);
    hasher.finalize()
}

/// Encode a chunk as header + body, ready to append to a segment.
pub fn encode_chunk(chunk: &SegmentChunk) -> Vec<u8> {
    let body = chunk.data_block();
    let header = ChunkHeader {
        flags: 0,
        body_length: body.len() as u32,
        start: chunk.start_offset(),
        record_length: chunk.record_length(),
        crc: 0,
    };

    let mut buf = Vec::with_capacity(CHUNK_HEADER_SIZE + body.len());
    buf.extend_from_slice(&header.to_bytes());
    buf.extend_from_slice(body);

    let crc = compute_crc(&buf[..CRC_POSITION], &buf[CHUNK_HEADER_SIZE..]);
    Endianness::write_i32(&mut buf[CRC_POSITION..CHUNK_HEADER_SIZE], crc as i32);
    buf
}

/// Decode one chunk from the front of `bytes`.
///
/// Returns (chunk, bytes_consumed) on success. The CRC is verified before
/// any field is trusted; a mismatch never yields a partial chunk.
pub fn decode_chunk(bytes: &[u8]) -> Result<(SegmentChunk, usize), ChunkFormatError> {
    if bytes.len() < CHUNK_HEADER_SIZE {
        return Err(ChunkFormatError::InsufficientData);
    }
    let mut header_bytes = [0u8; CHUNK_HEADER_SIZE];
    header_bytes.copy_from_slice(&bytes[..CHUNK_HEADER_SIZE]);
    let header = ChunkHeader::from_bytes(&header_bytes);

    let size = header.chunk_size();
    if bytes.len() < size {
        return Err(ChunkFormatError::InsufficientData);
    }
    let body = &bytes[CHUNK_HEADER_SIZE..size];
    header.verify(body)?;

    let chunk = chunk_from_verified(&header, Bytes::copy_from_slice(body))?;
    Ok((chunk, size))
}

/// Build a chunk from a header whose CRC has already been verified.
pub(crate) fn chunk_from_verified(
    header: &ChunkHeader,
    body: Bytes,
) -> Result<SegmentChunk, ChunkFormatError> {
    SegmentChunk::new(body, header.start, header.record_length).ok_or(
        ChunkFormatError::InvalidFormat {
            body_length: header.body_length,
            record_length: header.record_length,
        },
    )
}

/// Chunk parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkFormatError {
    /// Not enough data to parse the chunk (torn write or short buffer)
    #[error("Insufficient data to parse chunk")]
    InsufficientData,

    /// Checksum verification failed
    #[error("Checksum mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the header
        expected: u32,
        /// Checksum computed over the bytes read
        computed: u32,
    },

    /// Checksum valid but the message count disagrees with the body
    #[error("Invalid chunk: {record_length} records in {body_length} body bytes")]
    InvalidFormat {
        /// Declared body length
        body_length: u32,
        /// Declared message count
        record_length: u32,
    },
}

impl From<ChunkFormatError> for Error {
    fn from(e: ChunkFormatError) -> Self {
        match e {
            ChunkFormatError::ChecksumMismatch { expected, computed } => {
                Error::ChecksumMismatch { expected, computed }
            }
            other => Error::Corruption(other.to_string()),
        }
    }
}
