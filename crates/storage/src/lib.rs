//! Segment storage for tidelog partition logs
//!
//! This crate implements the on-disk half of the broker:
//! - SegmentWriter: the single serializing writer of a partition log
//! - SegmentReader: offset lookups through sparse indexes and forward scans
//! - Index writer thread appending offset index records
//! - Crash recovery of the last segment
//! - Replication fan-out of locally written chunks
//!
//! # Layout
//!
//! A partition log is a directory of segments. Segment `N` holds offsets
//! starting at `N` in `N.dlog` (zero-padded), with its sparse index in
//! `N.index`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod format;
pub mod index;
pub mod items;
pub mod reader;
pub mod recovery;
pub mod replication;
pub mod segment;
pub mod tail;
pub mod writer;

pub use config::{StorageConfig, StorageConfigError};
pub use index::{read_index, IndexFile};
pub use items::{
    completion, AckPolicy, Completion, IndexFileItem, LocalWriteItem, Pending, ReadItem,
    ReplicationDataItem, ReplicationInfo, WriteItem,
};
pub use reader::{resolve_read, SegmentReader};
pub use recovery::{recover_log, RecoveredLog};
pub use replication::{ChannelDispatcher, NoopDispatcher, ReplicationDispatcher, ReplicationRequest};
pub use segment::{data_path, index_path, list_segments, SegmentFile};
pub use tail::{LogTail, TailState};
pub use writer::SegmentWriter;
