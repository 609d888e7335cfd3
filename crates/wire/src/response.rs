//! Responses sent back to clients.
//!
//! Every response echoes the stream id of the request it answers, so each
//! constructor takes the request header.

use crate::buffer::BufferBackedWriter;
use crate::header::{write_header, BinaryHeader, Flags, Opcode};

/// A response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryResponse {
    /// Header only, no body
    Empty {
        /// Stream of the request
        stream_id: u16,
        /// Response opcode
        opcode: Opcode,
    },
    /// Failure; the body is the message bytes
    Error {
        /// Stream of the request
        stream_id: u16,
        /// Human readable reason
        message: String,
    },
}

impl BinaryResponse {
    /// Empty response with `opcode` to `request`.
    pub fn empty(request: &BinaryHeader, opcode: Opcode) -> Self {
        BinaryResponse::Empty {
            stream_id: request.stream_id,
            opcode,
        }
    }

    /// Error response to `request`.
    pub fn error(request: &BinaryHeader, message: impl Into<String>) -> Self {
        BinaryResponse::Error {
            stream_id: request.stream_id,
            message: message.into(),
        }
    }

    /// Answer to a `startup` handshake.
    pub fn ready(request: &BinaryHeader) -> Self {
        Self::empty(request, Opcode::Ready)
    }

    /// Answer to an accepted `produce`.
    pub fn produce_response(request: &BinaryHeader) -> Self {
        Self::empty(request, Opcode::ProduceResponse)
    }

    /// Stream the response belongs to.
    pub fn stream_id(&self) -> u16 {
        match self {
            BinaryResponse::Empty { stream_id, .. } | BinaryResponse::Error { stream_id, .. } => {
                *stream_id
            }
        }
    }

    /// Opcode written in the response header.
    pub fn opcode(&self) -> Opcode {
        match self {
            BinaryResponse::Empty { opcode, .. } => *opcode,
            BinaryResponse::Error { .. } => Opcode::Error,
        }
    }

    fn body(&self) -> &[u8] {
        match self {
            BinaryResponse::Empty { .. } => &[],
            BinaryResponse::Error { message, .. } => message.as_bytes(),
        }
    }

    /// Size of the marshaled response.
    pub fn encoded_len(&self) -> usize {
        crate::header::HEADER_SIZE + self.body().len()
    }

    /// Write header and body to `sink`.
    pub fn marshal<W: BufferBackedWriter + ?Sized>(&self, sink: &mut W) {
        let body = self.body();
        let header = BinaryHeader::new(
            self.stream_id(),
            self.opcode(),
            Flags::empty(),
            body.len() as u32,
        );
        write_header(sink, &header);
        sink.append(body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HEADER_SIZE;
    use bytes::BytesMut;

    fn request(stream_id: u16) -> BinaryHeader {
        BinaryHeader::new(stream_id, Opcode::Produce, Flags::empty(), 0)
    }

    #[test]
    fn test_empty_response_is_header_only() {
        for opcode in [Opcode::Ready, Opcode::ProduceResponse, Opcode::Startup] {
            let mut sink = Vec::new();
            BinaryResponse::empty(&request(17), opcode).marshal(&mut sink);

            assert_eq!(sink.len(), HEADER_SIZE);
            let header = BinaryHeader::decode(&sink).unwrap();
            assert_eq!(header.stream_id, 17);
            assert_eq!(header.body_length, 0);
            assert_eq!(header.op().unwrap(), opcode);
        }
    }

    #[test]
    fn test_error_response_carries_message() {
        let mut sink = BytesMut::new();
        let response = BinaryResponse::error(&request(300), "boom");
        response.marshal(&mut sink);

        assert_eq!(sink.len(), HEADER_SIZE + 4);
        assert_eq!(response.encoded_len(), sink.len());
        let header = BinaryHeader::decode(&sink).unwrap();
        assert_eq!(header.stream_id, 300);
        assert_eq!(header.op().unwrap(), Opcode::Error);
        assert_eq!(header.body_length, 4);
        assert_eq!(&sink[HEADER_SIZE..], b"boom");
    }

    #[test]
    fn test_constructors_echo_stream() {
        let req = request(9);
        assert_eq!(BinaryResponse::ready(&req).opcode(), Opcode::Ready);
        assert_eq!(
            BinaryResponse::produce_response(&req).opcode(),
            Opcode::ProduceResponse
        );
        assert_eq!(BinaryResponse::error(&req, "x").stream_id(), 9);
    }
}
