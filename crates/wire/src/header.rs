//! Binary frame header.
//!
//! # Header Layout
//!
//! ```text
//! ┌────────────┬──────────┬──────────────┬────────────┬───────────────┬──────────┐
//! │ Version (1)│ Flags (1)│ StreamId (2) │ Opcode (1) │ BodyLength (4)│ CRC32 (4)│
//! └────────────┴──────────┴──────────────┴────────────┴───────────────┴──────────┘
//! ```
//!
//! The CRC is CRC-32 (IEEE) over the 9 bytes before it. The body follows the
//! header and is not covered.

use crate::buffer::BufferBackedWriter;
use crate::error::{ProtocolError, Result};
use byteorder::ByteOrder;
use std::fmt;
use std::ops::BitOr;
use tidelog_core::Endianness;

/// Size of the frame header in bytes
pub const HEADER_SIZE: usize = 13;

/// Protocol version written by this implementation
pub const MESSAGE_VERSION: u8 = 1;

/// Position of the CRC field inside the header
const CRC_POSITION: usize = 9;

/// Frame opcodes.
///
/// Values are part of the protocol and never follow declaration order.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Client handshake
    Startup = 1,
    /// Handshake accepted
    Ready = 2,
    /// Request failed; body is the message
    Error = 3,
    /// Append messages to the partition log
    Produce = 4,
    /// Produce accepted
    ProduceResponse = 5,
}

impl Opcode {
    /// Wire value of the opcode.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> std::result::Result<Self, ProtocolError> {
        match value {
            1 => Ok(Opcode::Startup),
            2 => Ok(Opcode::Ready),
            3 => Ok(Opcode::Error),
            4 => Ok(Opcode::Produce),
            5 => Ok(Opcode::ProduceResponse),
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Opcode::Startup => "startup",
            Opcode::Ready => "ready",
            Opcode::Error => "error",
            Opcode::Produce => "produce",
            Opcode::ProduceResponse => "produceResponse",
        };
        f.write_str(name)
    }
}

/// Header flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u8);

impl Flags {
    /// Produce body starts with a timestamp
    pub const WITH_TIMESTAMP: Flags = Flags(0x01);

    /// No flags set.
    pub const fn empty() -> Self {
        Flags(0)
    }

    /// Flags from their wire value. Unknown bits are kept.
    pub const fn from_bits(bits: u8) -> Self {
        Flags(bits)
    }

    /// Wire value.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether every bit of `other` is set.
    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

/// Frame header. Field order is the serialization order.
///
/// The opcode is kept as its raw byte so that a frame with an unknown
/// opcode can still be answered on its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryHeader {
    /// Protocol version
    pub version: u8,
    /// Flag bits
    pub flags: Flags,
    /// Client-chosen correlation id echoed in the response
    pub stream_id: u16,
    /// Raw opcode byte
    pub opcode: u8,
    /// Number of body bytes following the header
    pub body_length: u32,
    /// Checksum over the preceding header bytes
    pub crc: u32,
}

impl BinaryHeader {
    /// Header for a frame of the current version. The CRC is filled in when
    /// the header is written.
    pub fn new(stream_id: u16, opcode: Opcode, flags: Flags, body_length: u32) -> Self {
        BinaryHeader {
            version: MESSAGE_VERSION,
            flags,
            stream_id,
            opcode: opcode.as_u8(),
            body_length,
            crc: 0,
        }
    }

    /// Parsed opcode.
    pub fn op(&self) -> Result<Opcode> {
        Opcode::try_from(self.opcode)
    }

    fn fields(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0] = self.version;
        bytes[1] = self.flags.bits();
        Endianness::write_u16(&mut bytes[2..4], self.stream_id);
        bytes[4] = self.opcode;
        Endianness::write_u32(&mut bytes[5..9], self.body_length);
        Endianness::write_u32(&mut bytes[9..13], self.crc);
        bytes
    }

    /// Parse a header without checking its CRC.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(ProtocolError::InsufficientData {
                needed: HEADER_SIZE,
                available: bytes.len(),
            });
        }
        Ok(BinaryHeader {
            version: bytes[0],
            flags: Flags::from_bits(bytes[1]),
            stream_id: Endianness::read_u16(&bytes[2..4]),
            opcode: bytes[4],
            body_length: Endianness::read_u32(&bytes[5..9]),
            crc: Endianness::read_u32(&bytes[9..13]),
        })
    }

    /// Decode a header from the front of `bytes` and verify its CRC.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = Self::parse(bytes)?;
        let computed = crc32fast::hash(&bytes[..CRC_POSITION]);
        if computed != header.crc {
            return Err(ProtocolError::ChecksumMismatch {
                expected: header.crc,
                computed,
            });
        }
        Ok(header)
    }
}

/// Append `header` to `sink`, then overwrite its CRC field with the CRC of
/// the header bytes just written.
///
/// The `crc` field of `header` is ignored.
pub fn write_header<W: BufferBackedWriter + ?Sized>(sink: &mut W, header: &BinaryHeader) {
    let start = sink.written().len();
    sink.append(&BinaryHeader { crc: 0, ..*header }.fields());

    let written = &mut sink.written_mut()[start..start + HEADER_SIZE];
    let crc = crc32fast::hash(&written[..CRC_POSITION]);
    Endianness::write_u32(&mut written[CRC_POSITION..], crc);
}
