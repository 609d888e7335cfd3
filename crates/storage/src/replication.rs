//! Replication fan-out.
//!
//! After a local chunk is appended, the segment writer hands it to a
//! [`ReplicationDispatcher`], which queues it for the followers named in
//! the write item. Streaming to peers happens outside this crate.

use crate::items::ReplicationInfo;
use tidelog_core::{Error, PeerId, Result, SegmentChunk, SegmentId};
use tokio::sync::mpsc;

/// Hands appended chunks to the replication subsystem.
///
/// Called on the segment writer thread after every successful local
/// append with followers. Implementations must not block.
pub trait ReplicationDispatcher: Send + Sync {
    /// Queue `chunk`, written to `segment_id`, for `info.followers`.
    fn dispatch(
        &self,
        segment_id: SegmentId,
        chunk: &SegmentChunk,
        info: &ReplicationInfo,
    ) -> Result<()>;
}

/// Dispatcher for single-broker deployments: accepts and drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDispatcher;

impl ReplicationDispatcher for NoopDispatcher {
    fn dispatch(&self, _: SegmentId, _: &SegmentChunk, _: &ReplicationInfo) -> Result<()> {
        Ok(())
    }
}

/// A chunk queued for followers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationRequest {
    /// Segment the chunk was written to
    pub segment_id: SegmentId,
    /// The appended chunk
    pub chunk: SegmentChunk,
    /// Peers that must receive it
    pub followers: Vec<PeerId>,
}

/// Dispatcher forwarding chunks over an unbounded channel to the task that
/// streams them to peers.
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::UnboundedSender<ReplicationRequest>,
}

impl ChannelDispatcher {
    /// Create a dispatcher and the receiving end of its stream.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ReplicationRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelDispatcher { tx }, rx)
    }
}

impl ReplicationDispatcher for ChannelDispatcher {
    fn dispatch(
        &self,
        segment_id: SegmentId,
        chunk: &SegmentChunk,
        info: &ReplicationInfo,
    ) -> Result<()> {
        let request = ReplicationRequest {
            segment_id,
            chunk: chunk.clone(),
            followers: info.followers.clone(),
        };
        self.tx
            .send(request)
            .map_err(|_| Error::Replication("replication stream closed".to_string()))
    }
}
