//! Core types for tidelog
//!
//! This crate defines the foundational types shared by the storage and wire
//! layers:
//! - SegmentChunk: an immutable batch of messages plus its offset range
//! - Offset / SegmentId / PeerId: identifiers
//! - Endianness: the single byte order used on disk and on the wire
//! - Error: the error type delivered through item completions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunk;
pub mod error;
pub mod types;

pub use chunk::SegmentChunk;
pub use error::{Error, Result};
pub use types::{Endianness, Offset, PeerId, SegmentId};
