//! Frame splitting over a byte stream.
//!
//! Bytes arrive in arbitrary pieces; [`FrameDecoder`] buffers them and hands
//! out one complete (header, body) frame at a time.

use crate::error::ProtocolError;
use crate::header::{BinaryHeader, HEADER_SIZE};
use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;

/// One request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Verified header
    pub header: BinaryHeader,
    /// `header.body_length` bytes of body
    pub body: Bytes,
}

/// A frame could not be split off the stream.
///
/// Carries the stream id read from the offending header, so the error can
/// still be answered on it.
#[derive(Debug, Error)]
#[error("stream {stream_id}: {source}")]
pub struct FrameError {
    /// Stream id of the offending header
    pub stream_id: u16,
    /// What went wrong
    #[source]
    pub source: ProtocolError,
}

/// Incremental frame decoder.
pub struct FrameDecoder {
    buf: BytesMut,
    max_body_length: u32,
}

impl FrameDecoder {
    /// Decoder refusing bodies larger than `max_body_length`.
    pub fn new(max_body_length: u32) -> Self {
        FrameDecoder {
            buf: BytesMut::with_capacity(4096),
            max_body_length,
        }
    }

    /// Add received bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Receive buffer, for reading straight from a stream.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Whether no partial frame is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Split off the next complete frame.
    ///
    /// Returns `Ok(None)` until a whole frame is buffered. Errors are fatal
    /// for the stream: after a bad header CRC or an oversized body the frame
    /// boundaries are lost.
    pub fn decode(&mut self) -> Result<Option<Frame>, FrameError> {
        if self.buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        let header = BinaryHeader::decode(&self.buf[..HEADER_SIZE]).map_err(|source| {
            let stream_id = BinaryHeader::parse(&self.buf[..HEADER_SIZE])
                .map_or(0, |raw| raw.stream_id);
            FrameError { stream_id, source }
        })?;

        if header.body_length > self.max_body_length {
            return Err(FrameError {
                stream_id: header.stream_id,
                source: ProtocolError::BodyTooLarge {
                    length: header.body_length,
                    max: self.max_body_length,
                },
            });
        }

        let total = HEADER_SIZE + header.body_length as usize;
        if self.buf.len() < total {
            self.buf.reserve(total - self.buf.len());
            return Ok(None);
        }

        self.buf.advance(HEADER_SIZE);
        let body = self.buf.split_to(header.body_length as usize).freeze();
        Ok(Some(Frame { header, body }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{write_header, Flags, Opcode};
    use crate::request::ProduceRequest;

    fn produce_frame(stream_id: u16, message: &str) -> Vec<u8> {
        let mut sink = Vec::new();
        ProduceRequest::from_messages(None, &[message]).marshal(stream_id, &mut sink);
        sink
    }

    #[test]
    fn test_decode_byte_by_byte() {
        let bytes = produce_frame(5, "hello");
        let mut decoder = FrameDecoder::new(1024);

        for (i, byte) in bytes.iter().enumerate() {
            assert!(decoder.decode().unwrap().is_none(), "frame early at {}", i);
            decoder.extend(&[*byte]);
        }
        let frame = decoder.decode().unwrap().unwrap();
        assert_eq!(frame.header.stream_id, 5);
        assert_eq!(frame.body.len(), bytes.len() - HEADER_SIZE);
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_decode_back_to_back_frames() {
        let mut bytes = produce_frame(1, "a");
        let mut startup = Vec::new();
        write_header(
            &mut startup,
            &BinaryHeader::new(2, Opcode::Startup, Flags::empty(), 0),
        );
        bytes.extend_from_slice(&startup);
        bytes.extend_from_slice(&produce_frame(3, "c"));

        let mut decoder = FrameDecoder::new(1024);
        decoder.extend(&bytes);
        let streams: Vec<u16> = std::iter::from_fn(|| decoder.decode().unwrap())
            .map(|f| f.header.stream_id)
            .collect();
        assert_eq!(streams, vec![1, 2, 3]);
    }

    #[test]
    fn test_bad_header_crc_reports_stream() {
        let mut bytes = produce_frame(77, "x");
        bytes[10] ^= 0xFF;
        let mut decoder = FrameDecoder::new(1024);
        decoder.extend(&bytes);

        let err = decoder.decode().unwrap_err();
        assert_eq!(err.stream_id, 77);
        assert!(matches!(err.source, ProtocolError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_oversized_body() {
        let bytes = produce_frame(4, "too long for the limit");
        let mut decoder = FrameDecoder::new(8);
        decoder.extend(&bytes[..HEADER_SIZE]);

        let err = decoder.decode().unwrap_err();
        assert_eq!(err.stream_id, 4);
        assert!(matches!(err.source, ProtocolError::BodyTooLarge { max: 8, .. }));
    }
}
