//! Handle for communicating with the transmux coordinator actor.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::transmux::coordinator::{CoordinatorCommand, PushRequest};
use crate::transmux::types::{ChunkMetadata, PartDescriptor, SegmentDescriptor};

/// Handle for the transmux coordinator actor.
///
/// Push and flush are fire-and-forget: they enqueue work and return
/// immediately, with results surfacing later through the callbacks and host
/// events supplied at construction. The handle can be cloned and shared
/// across tasks; the contract is identical whichever execution unit backs
/// the coordinator.
#[derive(Clone)]
pub struct TransmuxerHandle {
    command_tx: mpsc::UnboundedSender<CoordinatorCommand>,
}

impl TransmuxerHandle {
    pub(crate) fn new(command_tx: mpsc::UnboundedSender<CoordinatorCommand>) -> Self {
        Self { command_tx }
    }

    /// Submits one segment payload for processing.
    ///
    /// Processing failures never surface here; they arrive as host error
    /// events or log entries. A push after `destroy` is dropped with a
    /// warning.
    #[allow(clippy::too_many_arguments)]
    pub fn push(
        &self,
        data: Bytes,
        init_segment: Bytes,
        audio_codec: impl Into<String>,
        video_codec: impl Into<String>,
        frag: SegmentDescriptor,
        part: Option<PartDescriptor>,
        duration: f64,
        accurate_time_offset: bool,
        chunk_meta: ChunkMetadata,
    ) {
        let request = PushRequest {
            data,
            init_segment,
            audio_codec: audio_codec.into(),
            video_codec: video_codec.into(),
            frag,
            part,
            duration,
            accurate_time_offset,
            chunk_meta,
        };
        if self
            .command_tx
            .send(CoordinatorCommand::Push(Box::new(request)))
            .is_err()
        {
            tracing::warn!("push after transmux coordinator destroyed, dropping segment");
        }
    }

    /// Requests a flush of everything pushed so far.
    ///
    /// Acknowledged through the flush callback once the active unit drains.
    pub fn flush(&self, chunk_meta: ChunkMetadata) {
        if self
            .command_tx
            .send(CoordinatorCommand::Flush { chunk_meta })
            .is_err()
        {
            tracing::warn!("flush after transmux coordinator destroyed, dropping");
        }
    }

    /// Tears the coordinator down.
    ///
    /// Idempotent. In-flight background results become unobservable; no
    /// callback or event fires after teardown completes.
    pub fn destroy(&self) {
        let _ = self.command_tx.send(CoordinatorCommand::Destroy);
    }
}
