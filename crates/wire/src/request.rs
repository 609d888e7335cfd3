//! Produce request body.
//!
//! ```text
//! [timestamp i64, if WITH_TIMESTAMP] | message_count u32 | messages
//! message = length u32 | bytes
//! ```
//!
//! The messages section is stored verbatim as the chunk body.

use crate::buffer::BufferBackedWriter;
use crate::error::{ProtocolError, Result};
use crate::header::{write_header, BinaryHeader, Flags, Opcode};
use byteorder::ByteOrder;
use bytes::Bytes;
use tidelog_core::Endianness;

/// Decoded `produce` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceRequest {
    /// Producer timestamp, when the request carries one
    pub timestamp: Option<i64>,
    /// Number of messages
    pub message_count: u32,
    /// Length-prefixed messages
    pub messages: Bytes,
}

impl ProduceRequest {
    /// Build a request from individual messages.
    pub fn from_messages<M: AsRef<[u8]>>(timestamp: Option<i64>, messages: &[M]) -> Self {
        let mut buf = Vec::new();
        for message in messages {
            let message = message.as_ref();
            let mut len = [0u8; 4];
            Endianness::write_u32(&mut len, message.len() as u32);
            buf.extend_from_slice(&len);
            buf.extend_from_slice(message);
        }
        ProduceRequest {
            timestamp,
            message_count: messages.len() as u32,
            messages: Bytes::from(buf),
        }
    }

    /// Decode a `produce` body sent with `flags`.
    ///
    /// The declared messages must fill the body exactly.
    pub fn decode(flags: Flags, body: Bytes) -> Result<Self> {
        let mut pos = 0;
        let timestamp = if flags.contains(Flags::WITH_TIMESTAMP) {
            ensure(&body, pos, 8, "timestamp")?;
            pos += 8;
            Some(Endianness::read_i64(&body[..8]))
        } else {
            None
        };

        ensure(&body, pos, 4, "message count")?;
        let message_count = Endianness::read_u32(&body[pos..pos + 4]);
        pos += 4;
        if message_count == 0 {
            return Err(ProtocolError::MalformedBody(
                "produce request holds no messages".to_string(),
            ));
        }

        let messages_start = pos;
        for index in 0..message_count {
            ensure(&body, pos, 4, "message length")?;
            let len = Endianness::read_u32(&body[pos..pos + 4]) as usize;
            pos += 4;
            if body.len() - pos < len {
                return Err(ProtocolError::MalformedBody(format!(
                    "message {} declares {} bytes, {} left",
                    index,
                    len,
                    body.len() - pos
                )));
            }
            pos += len;
        }
        if pos != body.len() {
            return Err(ProtocolError::MalformedBody(format!(
                "{} trailing bytes after {} messages",
                body.len() - pos,
                message_count
            )));
        }

        Ok(ProduceRequest {
            timestamp,
            message_count,
            messages: body.slice(messages_start..),
        })
    }

    /// Flags describing this body.
    pub fn flags(&self) -> Flags {
        if self.timestamp.is_some() {
            Flags::WITH_TIMESTAMP
        } else {
            Flags::empty()
        }
    }

    /// Encoded body length.
    pub fn body_length(&self) -> usize {
        let timestamp = if self.timestamp.is_some() { 8 } else { 0 };
        timestamp + 4 + self.messages.len()
    }

    /// Append the body to `sink`.
    pub fn encode_body<W: BufferBackedWriter + ?Sized>(&self, sink: &mut W) {
        if let Some(timestamp) = self.timestamp {
            let mut buf = [0u8; 8];
            Endianness::write_i64(&mut buf, timestamp);
            sink.append(&buf);
        }
        let mut count = [0u8; 4];
        Endianness::write_u32(&mut count, self.message_count);
        sink.append(&count);
        sink.append(&self.messages);
    }

    /// Append a complete `produce` frame on `stream_id` to `sink`.
    pub fn marshal<W: BufferBackedWriter + ?Sized>(&self, stream_id: u16, sink: &mut W) {
        let header = BinaryHeader::new(
            stream_id,
            Opcode::Produce,
            self.flags(),
            self.body_length() as u32,
        );
        write_header(sink, &header);
        self.encode_body(sink);
    }
}

fn ensure(body: &[u8], pos: usize, needed: usize, what: &str) -> Result<()> {
    if body.len() < pos + needed {
        return Err(ProtocolError::MalformedBody(format!(
            "body too short for {}",
            what
        )));
    }
    Ok(())
}
