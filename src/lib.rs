//! Tidelog - storage and transport core of a log-based message broker
//!
//! A partition log is a directory of append-only segments. Producers talk a
//! small binary protocol; their messages are batched into checksummed chunks
//! and appended by a single writer per partition.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tidelog::storage::{NoopDispatcher, SegmentReader, SegmentWriter, StorageConfig};
//! use tidelog::wire::{serve_connection, ProducerHandler, WireConfig};
//!
//! let writer = SegmentWriter::open("/var/lib/tidelog/p0", StorageConfig::default(), Arc::new(NoopDispatcher))?;
//! let reader = SegmentReader::spawn("/var/lib/tidelog/p0", writer.tail(), StorageConfig::default())?;
//!
//! let handler = ProducerHandler::new(writer, WireConfig::default());
//! serve_connection(socket, &handler).await?;
//!
//! let chunk = reader.read(0, 0).await?;
//! ```
//!
//! # Architecture
//!
//! - `tidelog_core`: errors, offsets and the in-memory chunk, re-exported at the root
//! - [`storage`]: segment files, writer and index threads, reads, recovery
//! - [`wire`]: frame header, responses and the connection handler

pub use tidelog_storage as storage;
pub use tidelog_wire as wire;

pub use tidelog_core::{Error, Offset, Result, SegmentChunk, SegmentId};
