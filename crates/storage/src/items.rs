//! Queued units of work for the segment writer, index writer and reader.
//!
//! Callers never wait on the file handles directly. They enqueue an item
//! and await its [`Pending`] half; the thread that owns the file resolves
//! the item's [`Completion`] exactly once.
//!
//! ```text
//! producer ─→ WriteItem::Local ─────┐
//!                                   ├─→ writer thread ─→ IndexFileItem ─→ index thread
//! follower ─→ WriteItem::Replication┘         │
//!                                             └─→ ReplicationDispatcher
//! consumer ─→ ReadItem ─→ reader thread
//! ```

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tidelog_core::{Error, Offset, PeerId, Result, SegmentChunk, SegmentId};
use tokio::sync::{mpsc, oneshot};

/// Sending half of a completion signal.
///
/// Consumed by [`Completion::complete`], so a result can be delivered at
/// most once. Dropping it without a result is a defect: it panics in debug
/// builds and is logged in release builds, and the waiter observes
/// [`Error::WriterClosed`].
#[must_use = "a completion must be resolved exactly once"]
pub struct Completion<T> {
    tx: Option<oneshot::Sender<Result<T>>>,
}

/// Receiving half of a completion signal.
///
/// Resolves to the item's result. A caller that stops waiting (for example
/// after a timeout) simply drops it; the late result is discarded.
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T>>,
}

/// Create a linked completion pair.
pub fn completion<T>() -> (Completion<T>, Pending<T>) {
    let (tx, rx) = oneshot::channel();
    (Completion { tx: Some(tx) }, Pending { rx })
}

impl<T> Completion<T> {
    /// Deliver the result.
    pub fn complete(mut self, result: Result<T>) {
        if let Some(tx) = self.tx.take() {
            // Receiver gone means the caller gave up waiting.
            let _ = tx.send(result);
        }
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        if self.tx.is_some() && !std::thread::panicking() {
            tracing::error!("completion dropped without a result");
            debug_assert!(false, "completion dropped without a result");
        }
    }
}

impl<T> Pending<T> {
    /// Block the current (non-async) thread until the result arrives.
    pub fn blocking_wait(self) -> Result<T> {
        self.rx
            .blocking_recv()
            .unwrap_or_else(|_| Err(Error::WriterClosed))
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(Error::WriterClosed)))
    }
}

/// An item on its way into a bounded queue.
///
/// Dropped before hand-off, when the enqueuing future is cancelled while
/// waiting for queue space, it resolves the item with [`Error::Cancelled`].
struct Unsent<T> {
    item: Option<T>,
    reject: fn(T, Error),
}

impl<T> Drop for Unsent<T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            (self.reject)(item, Error::Cancelled);
        }
    }
}

/// Send `item` to `tx` once a slot is free.
///
/// The item leaves the returned future only together with a reserved slot,
/// so it is either queued or resolved through `reject`: with
/// [`Error::WriterClosed`] if the receiver is gone, or with
/// [`Error::Cancelled`] if the future is dropped first, polled or not.
pub(crate) fn hand_off<'a, T: 'a>(
    tx: &'a mpsc::Sender<T>,
    item: T,
    reject: fn(T, Error),
) -> impl Future<Output = ()> + 'a {
    let mut unsent = Unsent {
        item: Some(item),
        reject,
    };
    async move {
        let permit = tx.reserve().await;
        let Some(item) = unsent.item.take() else {
            return;
        };
        match permit {
            Ok(permit) => permit.send(item),
            Err(_) => reject(item, Error::WriterClosed),
        }
    }
}

/// How many replicas must receive a chunk before the producer is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckPolicy {
    /// The local append is enough; fan-out failures are only logged.
    #[default]
    Leader,
    /// Fan-out must be accepted for every follower.
    All,
}

/// Which peers must receive a locally written chunk, and how it is acked.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReplicationInfo {
    /// Followers of the partition
    pub followers: Vec<PeerId>,
    /// Acknowledgment policy
    pub acks: AckPolicy,
}

impl ReplicationInfo {
    /// No followers: the chunk stays local.
    pub fn none() -> Self {
        Self::default()
    }

    /// Replicate to `followers` under `acks`.
    pub fn new(followers: Vec<PeerId>, acks: AckPolicy) -> Self {
        ReplicationInfo { followers, acks }
    }
}

/// A producer's request to append messages to the local log.
///
/// The writer assigns the start offset at append time.
pub struct LocalWriteItem {
    data: Bytes,
    record_length: u32,
    replication: ReplicationInfo,
    completion: Completion<()>,
}

impl LocalWriteItem {
    /// Create an item for `record_length` messages held in `data`.
    pub fn new(
        data: Bytes,
        record_length: u32,
        replication: ReplicationInfo,
    ) -> (Self, Pending<()>) {
        let (completion, pending) = completion();
        let item = LocalWriteItem {
            data,
            record_length,
            replication,
            completion,
        };
        (item, pending)
    }

    /// Message bytes.
    pub fn data_block(&self) -> &Bytes {
        &self.data
    }

    /// Number of messages.
    pub fn record_length(&self) -> u32 {
        self.record_length
    }

    /// Replication metadata.
    pub fn replication(&self) -> &ReplicationInfo {
        &self.replication
    }

    pub(crate) fn into_parts(self) -> (Bytes, u32, ReplicationInfo, Completion<()>) {
        (self.data, self.record_length, self.replication, self.completion)
    }
}

/// A chunk received from the leader's replication stream.
pub struct ReplicationDataItem {
    segment_id: SegmentId,
    chunk: SegmentChunk,
    completion: Completion<()>,
}

impl ReplicationDataItem {
    /// Create an item appending `chunk` to segment `segment_id`.
    pub fn new(segment_id: SegmentId, chunk: SegmentChunk) -> (Self, Pending<()>) {
        let (completion, pending) = completion();
        let item = ReplicationDataItem {
            segment_id,
            chunk,
            completion,
        };
        (item, pending)
    }

    /// Segment the leader wrote the chunk to.
    pub fn segment_id(&self) -> SegmentId {
        self.segment_id
    }

    /// The replicated chunk, start offset assigned by the leader.
    pub fn chunk(&self) -> &SegmentChunk {
        &self.chunk
    }

    pub(crate) fn into_parts(self) -> (SegmentId, SegmentChunk, Completion<()>) {
        (self.segment_id, self.chunk, self.completion)
    }
}

/// A chunk append request, from a local producer or from a leader.
pub enum WriteItem {
    /// Produced locally; fanned out to followers after the append.
    Local(LocalWriteItem),
    /// Received from the leader; never fanned out again.
    Replication(ReplicationDataItem),
}

impl WriteItem {
    /// Message bytes.
    pub fn data_block(&self) -> &Bytes {
        match self {
            WriteItem::Local(item) => item.data_block(),
            WriteItem::Replication(item) => item.chunk().data_block(),
        }
    }

    /// Number of messages.
    pub fn record_length(&self) -> u32 {
        match self {
            WriteItem::Local(item) => item.record_length(),
            WriteItem::Replication(item) => item.chunk().record_length(),
        }
    }

    /// Resolve the item without appending it.
    pub fn complete(self, result: Result<()>) {
        match self {
            WriteItem::Local(item) => item.completion.complete(result),
            WriteItem::Replication(item) => item.completion.complete(result),
        }
    }
}

impl From<LocalWriteItem> for WriteItem {
    fn from(item: LocalWriteItem) -> Self {
        WriteItem::Local(item)
    }
}

impl From<ReplicationDataItem> for WriteItem {
    fn from(item: ReplicationDataItem) -> Self {
        WriteItem::Replication(item)
    }
}

/// Request to record an offset to file position mapping.
///
/// Produced by the writer only after the chunk it describes was appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexFileItem {
    /// Segment the chunk was written to
    pub segment_id: SegmentId,
    /// First offset of the chunk
    pub offset: Offset,
    /// Position of the chunk within the segment file
    pub file_offset: u64,
    /// Last offset written to the segment so far
    pub tail_offset: Offset,
    /// Close the index file after this record (segment rotated)
    pub to_close: bool,
}

/// Request to fetch the chunk containing `offset` from a segment.
pub struct ReadItem {
    segment_id: SegmentId,
    offset: Offset,
    completion: Completion<SegmentChunk>,
}

impl ReadItem {
    /// Create a read of `offset` in segment `segment_id`.
    pub fn new(segment_id: SegmentId, offset: Offset) -> (Self, Pending<SegmentChunk>) {
        let (completion, pending) = completion();
        let item = ReadItem {
            segment_id,
            offset,
            completion,
        };
        (item, pending)
    }

    /// Segment to read from.
    pub fn segment_id(&self) -> SegmentId {
        self.segment_id
    }

    /// Requested offset.
    pub fn offset(&self) -> Offset {
        self.offset
    }

    /// Deliver the chunk or the error.
    pub fn complete(self, result: Result<SegmentChunk>) {
        self.completion.complete(result)
    }
}
