//! Segment writer: the single serializer of a partition log.
//!
//! ```text
//! producers ─→ [mpsc channel] ─→ writer thread ─→ append chunk ─→ publish tail
//!                                     │                 │
//!                                     │                 └─→ IndexFileItem ─→ index thread
//!                                     └─→ ReplicationDispatcher (local items only)
//! ```
//!
//! Any number of tasks may hold a [`SegmentWriter`] and enqueue items
//! concurrently; the channel fixes their order, and the thread appends them
//! in exactly that order. The thread blocks only on file I/O.

use crate::config::StorageConfig;
use crate::format::encode_chunk;
use crate::index::{spawn_index_writer, IndexCmd};
use crate::items::{
    completion, hand_off, AckPolicy, Completion, IndexFileItem, LocalWriteItem, ReplicationDataItem,
    ReplicationInfo, WriteItem,
};
use crate::recovery::recover_log;
use crate::replication::ReplicationDispatcher;
use crate::segment::SegmentFile;
use crate::tail::{LogTail, TailState};
use bytes::Bytes;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use tidelog_core::{Error, Offset, Result, SegmentChunk, SegmentId};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Commands sent to the writer thread via mpsc channel
enum WriterCmd {
    /// Append a chunk
    Write(WriteItem),
    /// Sync segment and index, then notify
    Sync(Completion<()>),
    /// Sync, stop the index writer and exit
    Shutdown(Completion<()>),
}

impl WriterCmd {
    fn reject(self, error: Error) {
        match self {
            WriterCmd::Write(item) => item.complete(Err(error)),
            WriterCmd::Sync(completion) | WriterCmd::Shutdown(completion) => {
                completion.complete(Err(error))
            }
        }
    }
}

/// Handle to the writer thread of one partition log.
///
/// Cheap to clone; every clone feeds the same ordered queue.
#[derive(Clone)]
pub struct SegmentWriter {
    tx: mpsc::Sender<WriterCmd>,
    tail: Arc<LogTail>,
    dir: PathBuf,
}

impl SegmentWriter {
    /// Open the log in `dir`, starting at offset 0 if it is empty.
    pub fn open(
        dir: impl Into<PathBuf>,
        config: StorageConfig,
        dispatcher: Arc<dyn ReplicationDispatcher>,
    ) -> Result<Self> {
        Self::open_at(dir, 0, config, dispatcher)
    }

    /// Open the log in `dir`, starting at `base_offset` if it is empty.
    ///
    /// An existing log is recovered first: a torn tail is truncated and the
    /// writer resumes after the last valid chunk.
    pub fn open_at(
        dir: impl Into<PathBuf>,
        base_offset: Offset,
        config: StorageConfig,
        dispatcher: Arc<dyn ReplicationDispatcher>,
    ) -> Result<Self> {
        let dir = dir.into();
        config
            .validate()
            .map_err(|e| Error::InvalidOperation(e.to_string()))?;
        std::fs::create_dir_all(&dir)?;

        let (segment, next_offset, last_indexed, last_chunk) = match recover_log(&dir)? {
            Some(recovered) => (
                SegmentFile::open_append(&dir, recovered.segment_id)?,
                recovered.next_offset,
                recovered.last_indexed,
                recovered.last_chunk,
            ),
            None => (SegmentFile::create(&dir, base_offset)?, base_offset, None, None),
        };

        let tail = Arc::new(LogTail::new(TailState {
            active_segment: segment.segment_id(),
            next_offset,
            committed_len: segment.size(),
        }));

        let (index_tx, index_handle) = spawn_index_writer(dir.clone())?;
        let (tx, rx) = mpsc::channel(config.queue_capacity);

        info!(
            dir = ?dir,
            segment_id = segment.segment_id(),
            next_offset,
            "Segment writer opened"
        );

        let writer = WriterLoop {
            dir: dir.clone(),
            config,
            segment,
            next_offset,
            last_indexed,
            last_chunk,
            index_tx,
            index_handle: Some(index_handle),
            dispatcher,
            tail: Arc::clone(&tail),
            unavailable: false,
        };
        std::thread::Builder::new()
            .name("tidelog-writer".to_string())
            .spawn(move || writer.run(rx))?;

        Ok(SegmentWriter { tx, tail, dir })
    }

    /// Queue an item for appending.
    ///
    /// Waits only for queue space, not for the append. The item's own
    /// completion reports the outcome; if the writer has stopped it is
    /// completed with [`Error::WriterClosed`], and if the returned future is
    /// dropped before the item is queued, with [`Error::Cancelled`].
    pub fn enqueue(&self, item: impl Into<WriteItem>) -> impl Future<Output = ()> + '_ {
        self.send(WriterCmd::Write(item.into()))
    }

    /// Append `record_length` messages held in `data` and wait for the
    /// result.
    pub async fn write(
        &self,
        data: Bytes,
        record_length: u32,
        replication: ReplicationInfo,
    ) -> Result<()> {
        let (item, pending) = LocalWriteItem::new(data, record_length, replication);
        self.enqueue(item).await;
        pending.await
    }

    /// Append a chunk received from the leader and wait for the result.
    pub async fn replicate(&self, segment_id: SegmentId, chunk: SegmentChunk) -> Result<()> {
        let (item, pending) = ReplicationDataItem::new(segment_id, chunk);
        self.enqueue(item).await;
        pending.await
    }

    /// Sync the active segment and its index to disk.
    ///
    /// Resolves after every item queued before it has been appended and
    /// every resulting index record has been written.
    pub async fn sync(&self) -> Result<()> {
        let (c, pending) = completion();
        self.send(WriterCmd::Sync(c)).await;
        pending.await
    }

    /// Drain queued items, sync, and stop the writer.
    ///
    /// Items queued afterwards complete with [`Error::WriterClosed`].
    pub async fn shutdown(&self) -> Result<()> {
        let (c, pending) = completion();
        self.send(WriterCmd::Shutdown(c)).await;
        pending.await
    }

    /// Tail published by this writer.
    pub fn tail(&self) -> Arc<LogTail> {
        Arc::clone(&self.tail)
    }

    /// Log directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn send(&self, cmd: WriterCmd) -> impl Future<Output = ()> + '_ {
        hand_off(&self.tx, cmd, WriterCmd::reject)
    }
}

/// State owned by the writer thread.
struct WriterLoop {
    dir: PathBuf,
    config: StorageConfig,
    /// Active segment; only this thread writes to it
    segment: SegmentFile,
    next_offset: Offset,
    /// Position of the last chunk sent to the index writer
    last_indexed: Option<u64>,
    /// First offset and position of the last appended chunk
    last_chunk: Option<(Offset, u64)>,
    index_tx: mpsc::UnboundedSender<IndexCmd>,
    index_handle: Option<JoinHandle<()>>,
    dispatcher: Arc<dyn ReplicationDispatcher>,
    tail: Arc<LogTail>,
    /// Set when a failed append could not be rolled back
    unavailable: bool,
}

impl WriterLoop {
    fn run(mut self, mut rx: mpsc::Receiver<WriterCmd>) {
        let mut shutdown = None;
        while let Some(cmd) = rx.blocking_recv() {
            match cmd {
                WriterCmd::Write(item) => self.handle(item),
                WriterCmd::Sync(completion) => match self.segment.sync() {
                    // The index thread completes it once earlier records are synced.
                    Ok(()) => self.send_index(IndexCmd::Flush(completion)),
                    Err(e) => completion.complete(Err(e.into())),
                },
                WriterCmd::Shutdown(completion) => {
                    shutdown = Some(completion);
                    break;
                }
            }
        }

        rx.close();
        while let Ok(cmd) = rx.try_recv() {
            cmd.reject(Error::WriterClosed);
        }

        let result = self.close();
        match shutdown {
            Some(completion) => completion.complete(result),
            None => {
                if let Err(e) = result {
                    error!(segment_id = self.segment.segment_id(), error = %e, "Segment writer close failed");
                }
            }
        }
        info!(
            segment_id = self.segment.segment_id(),
            next_offset = self.next_offset,
            "Segment writer stopped"
        );
    }

    fn handle(&mut self, item: WriteItem) {
        if self.unavailable {
            let segment_id = self.segment.segment_id();
            item.complete(Err(Error::InvalidOperation(format!(
                "segment {} unavailable after I/O failure",
                segment_id
            ))));
            return;
        }

        match item {
            WriteItem::Local(item) => self.write_local(item),
            WriteItem::Replication(item) => {
                let (segment_id, chunk, completion) = item.into_parts();
                completion.complete(self.write_replicated(segment_id, &chunk));
            }
        }
    }

    fn write_local(&mut self, item: LocalWriteItem) {
        let (data, record_length, replication, completion) = item.into_parts();
        let Some(chunk) =
            SegmentChunk::new(data, self.next_offset, record_length).filter(|c| !c.is_empty())
        else {
            completion.complete(Err(Error::InvalidOperation(format!(
                "chunk must hold at least one message, got {} records",
                record_length
            ))));
            return;
        };

        match self.append_chunk(&chunk, true) {
            Ok(segment_id) => completion.complete(self.fan_out(segment_id, &chunk, &replication)),
            Err(e) => completion.complete(Err(e)),
        }
    }

    /// Leader-assigned offsets and segment ids are the source of truth for
    /// replicated chunks: they must line up exactly with the local log.
    fn write_replicated(&mut self, segment_id: SegmentId, chunk: &SegmentChunk) -> Result<()> {
        if chunk.is_empty() {
            return Err(Error::InvalidOperation(
                "replicated chunk holds no messages".to_string(),
            ));
        }
        if chunk.start_offset() != self.next_offset {
            return Err(Error::OffsetMismatch {
                expected: self.next_offset,
                actual: chunk.start_offset(),
            });
        }

        let active = self.segment.segment_id();
        if segment_id != active {
            let leader_rotated =
                segment_id == self.next_offset && segment_id > active && self.segment.size() > 0;
            if !leader_rotated {
                return Err(Error::SegmentMismatch {
                    active,
                    actual: segment_id,
                });
            }
            self.rotate()?;
        }

        self.append_chunk(chunk, false).map(|_| ())
    }

    fn append_chunk(&mut self, chunk: &SegmentChunk, may_rotate: bool) -> Result<SegmentId> {
        let body_len = chunk.data_block().len();
        if body_len > self.config.max_chunk_body {
            return Err(Error::InvalidOperation(format!(
                "chunk body of {} bytes exceeds limit of {}",
                body_len, self.config.max_chunk_body
            )));
        }

        let encoded = encode_chunk(chunk);
        if may_rotate
            && self.segment.size() > 0
            && self.segment.size() + encoded.len() as u64 > self.config.max_segment_size
        {
            self.rotate()?;
        }

        let segment_id = self.segment.segment_id();
        let position = match self.segment.append(&encoded) {
            Ok(position) => position,
            Err(e) => {
                error!(segment_id, offset = chunk.start_offset(), error = %e, "Segment append failed");
                self.roll_back(self.segment.size());
                return Err(e.into());
            }
        };
        if self.config.sync_on_write {
            if let Err(e) = self.segment.sync() {
                error!(segment_id, offset = chunk.start_offset(), error = %e, "Segment sync failed");
                self.roll_back(position);
                return Err(e.into());
            }
        }

        self.next_offset = chunk.end_offset();
        self.last_chunk = Some((chunk.start_offset(), position));
        self.tail.publish(TailState {
            active_segment: segment_id,
            next_offset: self.next_offset,
            committed_len: self.segment.size(),
        });

        if self.should_index(position) {
            self.last_indexed = Some(position);
            self.send_index(IndexCmd::Append(IndexFileItem {
                segment_id,
                offset: chunk.start_offset(),
                file_offset: position,
                tail_offset: self.next_offset - 1,
                to_close: false,
            }));
        }

        debug!(
            segment_id,
            offset = chunk.start_offset(),
            records = chunk.record_length(),
            position,
            "Chunk appended"
        );
        Ok(segment_id)
    }

    fn should_index(&self, position: u64) -> bool {
        match self.last_indexed {
            None => true,
            Some(last) => position - last >= self.config.index_interval_bytes,
        }
    }

    /// Drop a partially written chunk. If that fails the segment can no
    /// longer be trusted for appends.
    fn roll_back(&mut self, position: u64) {
        if let Err(e) = self.segment.truncate(position) {
            error!(
                segment_id = self.segment.segment_id(),
                position,
                error = %e,
                "Rollback failed, segment marked unavailable"
            );
            self.unavailable = true;
        }
    }

    fn rotate(&mut self) -> Result<()> {
        let previous = self.segment.segment_id();
        self.segment.close()?;

        if let Some((offset, file_offset)) = self.last_chunk {
            self.send_index(IndexCmd::Append(IndexFileItem {
                segment_id: previous,
                offset,
                file_offset,
                tail_offset: self.next_offset - 1,
                to_close: true,
            }));
        }

        let segment = match SegmentFile::create(&self.dir, self.next_offset) {
            Ok(segment) => segment,
            Err(e) => {
                error!(segment_id = self.next_offset, error = %e, "Segment creation failed");
                self.unavailable = true;
                return Err(e.into());
            }
        };

        info!(
            previous,
            segment_id = segment.segment_id(),
            path = ?segment.path(),
            "Segment rotated"
        );
        self.segment = segment;
        self.last_indexed = None;
        self.last_chunk = None;
        self.tail.publish(TailState {
            active_segment: self.segment.segment_id(),
            next_offset: self.next_offset,
            committed_len: 0,
        });
        Ok(())
    }

    fn fan_out(
        &self,
        segment_id: SegmentId,
        chunk: &SegmentChunk,
        info: &ReplicationInfo,
    ) -> Result<()> {
        if info.followers.is_empty() {
            return Ok(());
        }

        match self.dispatcher.dispatch(segment_id, chunk, info) {
            Ok(()) => Ok(()),
            Err(e) => match info.acks {
                AckPolicy::Leader => {
                    warn!(
                        segment_id,
                        offset = chunk.start_offset(),
                        error = %e,
                        "Replication dispatch failed"
                    );
                    Ok(())
                }
                AckPolicy::All => Err(match e {
                    Error::Replication(_) => e,
                    other => Error::Replication(other.to_string()),
                }),
            },
        }
    }

    fn send_index(&self, cmd: IndexCmd) {
        if let Err(mpsc::error::SendError(cmd)) = self.index_tx.send(cmd) {
            error!(
                segment_id = self.segment.segment_id(),
                "Index writer stopped"
            );
            cmd.reject();
        }
    }

    fn close(&mut self) -> Result<()> {
        let synced = self.segment.sync();

        let (c, pending) = completion();
        self.send_index(IndexCmd::Shutdown(c));
        let index_result = pending.blocking_wait();
        let joined = match self.index_handle.take() {
            Some(handle) => join_index_writer(handle),
            None => Ok(()),
        };

        synced?;
        joined?;
        index_result
    }
}

fn join_index_writer(handle: JoinHandle<()>) -> Result<()> {
    handle.join().map_err(|_| {
        error!("Index writer thread panicked");
        Error::InvalidOperation("index writer thread panicked".to_string())
    })
}
