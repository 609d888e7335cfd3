//! Binary wire protocol for tidelog producers
//!
//! Frames are a 13-byte header followed by an opcode-specific body:
//! - `header`: header layout, opcodes, flags, CRC patch-back
//! - `response`: empty and error responses built from a request header
//! - `request`: produce request body
//! - `frame`: incremental frame splitting over a byte stream
//! - `handler`: per-connection request handling on top of a `SegmentWriter`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod config;
pub mod error;
pub mod frame;
pub mod handler;
pub mod header;
pub mod request;
pub mod response;

pub use buffer::BufferBackedWriter;
pub use config::{WireConfig, WireConfigError};
pub use error::{ProtocolError, Result};
pub use frame::{Frame, FrameDecoder, FrameError};
pub use handler::{serve_connection, ProducerHandler};
pub use header::{write_header, BinaryHeader, Flags, Opcode, HEADER_SIZE, MESSAGE_VERSION};
pub use request::ProduceRequest;
pub use response::BinaryResponse;
