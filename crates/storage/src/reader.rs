//! Segment reads.
//!
//! A read locates the chunk holding the requested offset through the
//! segment's index, then scans forward chunk by chunk from the nearest
//! entry. The index may lag behind the data (index records are appended
//! asynchronously), so the scan is what guarantees freshness; the index
//! only shortens it.

use crate::config::StorageConfig;
use crate::format::{chunk_header::chunk_from_verified, floor_entry, ChunkHeader, CHUNK_HEADER_SIZE};
use crate::index::read_index;
use crate::items::{hand_off, ReadItem};
use crate::segment::data_path;
use crate::tail::LogTail;
use bytes::Bytes;
use std::fs::File;
use std::future::Future;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tidelog_core::{Error, Offset, Result, SegmentChunk, SegmentId};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Read and verify the chunk at `position`, which must end by `limit`.
///
/// Returns the chunk and the position right after it. A chunk that does
/// not fit before `limit` or fails its checksum is reported as corruption.
pub(crate) fn read_chunk_at(
    file: &mut File,
    position: u64,
    limit: u64,
) -> Result<(SegmentChunk, u64)> {
    if position + CHUNK_HEADER_SIZE as u64 > limit {
        return Err(Error::Corruption(format!(
            "truncated chunk header at position {}",
            position
        )));
    }

    let mut header_bytes = [0u8; CHUNK_HEADER_SIZE];
    file.seek(SeekFrom::Start(position))?;
    file.read_exact(&mut header_bytes)?;
    let header = ChunkHeader::from_bytes(&header_bytes);

    let end = position + header.chunk_size() as u64;
    if end > limit {
        return Err(Error::Corruption(format!(
            "chunk at position {} ends at {}, past {}",
            position, end, limit
        )));
    }

    let mut body = vec![0u8; header.body_length as usize];
    file.read_exact(&mut body)?;
    header.verify(&body)?;

    let chunk = chunk_from_verified(&header, Bytes::from(body))?;
    Ok((chunk, end))
}

/// Resolve a read of `offset` in segment `segment_id`.
///
/// - At or beyond the committed tail: the empty chunk, not an error.
/// - Beyond the end of a closed segment but before the tail:
///   [`Error::OffsetOutOfSegment`], naming where the segment ends.
/// - Damaged data on the way: a corruption error, never a partial chunk.
pub fn resolve_read(
    dir: &Path,
    tail: &LogTail,
    config: &StorageConfig,
    segment_id: SegmentId,
    offset: Offset,
) -> Result<SegmentChunk> {
    let state = tail.snapshot();
    if segment_id > state.active_segment {
        return Err(Error::SegmentNotFound(segment_id));
    }
    if offset >= state.next_offset {
        return Ok(SegmentChunk::empty(offset));
    }
    let active = segment_id == state.active_segment;
    if offset < segment_id {
        return Err(Error::InvalidOperation(format!(
            "offset {} precedes segment {}",
            offset, segment_id
        )));
    }

    let mut file = match File::open(data_path(dir, segment_id)) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::SegmentNotFound(segment_id))
        }
        Err(e) => return Err(e.into()),
    };
    let limit = if active {
        state.committed_len
    } else {
        file.metadata()?.len()
    };

    // Index records can be newer than the tail snapshot.
    let mut index = read_index(dir, segment_id)?;
    index.retain(|r| r.file_offset < limit);
    let start = floor_entry(&index, offset).map_or(0, |r| r.file_offset);

    let mut position = start;
    let mut end = segment_id;
    while position < limit {
        let (chunk, next) = read_chunk_at(&mut file, position, limit)?;
        end = chunk.end_offset();
        if chunk.contains(offset) {
            debug!(
                segment_id,
                offset,
                position,
                scanned = position - start,
                "Chunk located"
            );
            return Ok(chunk);
        }
        if chunk.start_offset() > offset {
            return Err(Error::Corruption(format!(
                "offset {} missing from segment {}",
                offset, segment_id
            )));
        }

        let scanned = next - start;
        if scanned > config.max_scan_bytes {
            return Err(Error::ScanLimitExceeded { offset, scanned });
        }
        position = next;
    }

    // The committed length of the active segment covers every offset below
    // the tail, so only a closed segment can run out here.
    if active {
        return Err(Error::Corruption(format!(
            "offset {} missing from active segment {}",
            offset, segment_id
        )));
    }
    Err(Error::OffsetOutOfSegment { segment_id, end })
}

/// Handle to the thread serving [`ReadItem`]s for one partition log.
///
/// Cloning the handle shares the same reader thread. The thread exits once
/// every handle is dropped.
#[derive(Clone)]
pub struct SegmentReader {
    tx: mpsc::Sender<ReadItem>,
}

impl SegmentReader {
    /// Spawn a reader over `dir`, bounded by the writer-published `tail`.
    pub fn spawn(
        dir: impl Into<PathBuf>,
        tail: Arc<LogTail>,
        config: StorageConfig,
    ) -> Result<Self> {
        let dir = dir.into();
        let (tx, mut rx) = mpsc::channel::<ReadItem>(config.queue_capacity);

        std::thread::Builder::new()
            .name("tidelog-reader".to_string())
            .spawn(move || {
                while let Some(item) = rx.blocking_recv() {
                    let result =
                        resolve_read(&dir, &tail, &config, item.segment_id(), item.offset());
                    if let Err(e) = &result {
                        if e.is_corruption() {
                            warn!(
                                segment_id = item.segment_id(),
                                offset = item.offset(),
                                error = %e,
                                "Corrupted chunk"
                            );
                        }
                    }
                    item.complete(result);
                }
            })?;

        Ok(SegmentReader { tx })
    }

    /// Queue a read. The item is completed with an error if the reader has
    /// stopped or the returned future is dropped before the item is queued.
    pub fn enqueue(&self, item: ReadItem) -> impl Future<Output = ()> + '_ {
        hand_off(&self.tx, item, |item, e| item.complete(Err(e)))
    }

    /// Read the chunk containing `offset` from segment `segment_id`.
    pub async fn read(&self, segment_id: SegmentId, offset: Offset) -> Result<SegmentChunk> {
        let (item, pending) = ReadItem::new(segment_id, offset);
        self.enqueue(item).await;
        pending.await
    }
}
