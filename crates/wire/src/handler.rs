//! Producer connection handling.
//!
//! One [`serve_connection`] task runs per client connection. Frames are
//! handled one at a time: a `produce` is enqueued on the partition's
//! [`SegmentWriter`] and answered once its append completes, so responses on
//! a connection come back in request order.

use crate::config::WireConfig;
use crate::error::{ProtocolError, Result};
use crate::frame::{Frame, FrameDecoder};
use crate::header::Opcode;
use crate::request::ProduceRequest;
use crate::response::BinaryResponse;
use bytes::BytesMut;
use tidelog_storage::{ReplicationInfo, SegmentWriter};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Answers producer frames for one partition log.
#[derive(Clone)]
pub struct ProducerHandler {
    writer: SegmentWriter,
    config: WireConfig,
    replication: ReplicationInfo,
}

impl ProducerHandler {
    /// Handler appending to `writer`, with no followers.
    pub fn new(writer: SegmentWriter, config: WireConfig) -> Self {
        ProducerHandler {
            writer,
            config,
            replication: ReplicationInfo::none(),
        }
    }

    /// Replicate produced chunks according to `replication`.
    pub fn with_replication(mut self, replication: ReplicationInfo) -> Self {
        self.replication = replication;
        self
    }

    /// Wire limits in effect.
    pub fn config(&self) -> &WireConfig {
        &self.config
    }

    /// Produce the response to one frame.
    ///
    /// Every failure, including a failed append, becomes an error response
    /// on the frame's stream.
    pub async fn handle(&self, frame: Frame) -> BinaryResponse {
        let header = frame.header;
        match self.dispatch(frame).await {
            Ok(response) => response,
            Err(message) => {
                debug!(stream_id = header.stream_id, error = %message, "Request failed");
                BinaryResponse::error(&header, message)
            }
        }
    }

    async fn dispatch(&self, frame: Frame) -> std::result::Result<BinaryResponse, String> {
        let header = frame.header;
        if header.version != self.config.supported_version {
            return Err(ProtocolError::UnsupportedVersion(header.version).to_string());
        }

        match header.op().map_err(|e| e.to_string())? {
            Opcode::Startup => Ok(BinaryResponse::ready(&header)),
            Opcode::Produce => {
                let request = ProduceRequest::decode(header.flags, frame.body)
                    .map_err(|e| e.to_string())?;
                self.writer
                    .write(
                        request.messages,
                        request.message_count,
                        self.replication.clone(),
                    )
                    .await
                    .map_err(|e| e.to_string())?;
                debug!(
                    stream_id = header.stream_id,
                    messages = request.message_count,
                    "Produce appended"
                );
                Ok(BinaryResponse::produce_response(&header))
            }
            op @ (Opcode::Ready | Opcode::Error | Opcode::ProduceResponse) => {
                Err(format!("unexpected opcode {} from client", op))
            }
        }
    }
}

/// Serve producer frames on `stream` until the peer closes it.
///
/// A frame that breaks the framing itself (bad header CRC, oversized body)
/// is answered with an error response and then ends the connection with
/// that error. A peer closing mid-frame is reported as
/// [`ProtocolError::InsufficientData`].
pub async fn serve_connection<S>(mut stream: S, handler: &ProducerHandler) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut decoder = FrameDecoder::new(handler.config.max_body_length);
    info!("Producer connection opened");

    loop {
        match decoder.decode() {
            Ok(Some(frame)) => {
                let response = handler.handle(frame).await;
                write_response(&mut stream, &response).await?;
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(stream_id = e.stream_id, error = %e.source, "Closing connection on framing error");
                let response = BinaryResponse::Error {
                    stream_id: e.stream_id,
                    message: e.source.to_string(),
                };
                write_response(&mut stream, &response).await?;
                stream.shutdown().await?;
                return Err(e.source);
            }
        }

        if stream.read_buf(decoder.buffer_mut()).await? == 0 {
            if decoder.is_empty() {
                info!("Producer connection closed");
                return Ok(());
            }
            let available = decoder.buffer_mut().len();
            return Err(ProtocolError::InsufficientData {
                needed: available + 1,
                available,
            });
        }
    }
}

async fn write_response<S>(stream: &mut S, response: &BinaryResponse) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let mut sink = BytesMut::with_capacity(response.encoded_len());
    response.marshal(&mut sink);
    stream.write_all(&sink).await?;
    stream.flush().await?;
    Ok(())
}
