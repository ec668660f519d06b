//! Passthrough processing unit for already browser-playable input.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};

use crate::transmux::protocol::WorkerBootstrap;
use crate::transmux::transmuxer::{MediaTransmuxer, TransmuxerFactory};
use crate::transmux::types::{
    ChunkMetadata, DecryptData, RemuxOutput, TransmuxConfig, TransmuxError, TransmuxResult,
    TransmuxState,
};

/// Processing unit for segments that are already fragmented MP4.
///
/// Echoes payloads through untouched, re-emitting the active initialization
/// segment ahead of the first payload after a (re)configuration or a stream
/// discontinuity. Holds no sample buffers, so flushing produces nothing.
#[derive(Debug, Default)]
pub struct PassthroughTransmuxer {
    init_segment: Bytes,
    init_pending: bool,
}

impl PassthroughTransmuxer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MediaTransmuxer for PassthroughTransmuxer {
    fn configure(&mut self, config: &TransmuxConfig) {
        self.init_segment = config.init_segment.clone();
        self.init_pending = true;
    }

    async fn push(
        &mut self,
        data: Bytes,
        _decrypt_data: Option<DecryptData>,
        chunk_meta: ChunkMetadata,
        state: TransmuxState,
    ) -> Result<TransmuxResult, TransmuxError> {
        if state.discontinuity {
            self.init_pending = true;
        }

        let prepend_init = self.init_pending && !self.init_segment.is_empty();
        let data = if prepend_init {
            let mut out = BytesMut::with_capacity(self.init_segment.len() + data.len());
            out.extend_from_slice(&self.init_segment);
            out.extend_from_slice(&data);
            out.freeze()
        } else {
            data
        };
        self.init_pending = false;

        Ok(TransmuxResult {
            output: RemuxOutput {
                data,
                independent: prepend_init || !state.contiguous,
            },
            chunk_meta,
            frag: None,
            part: None,
        })
    }

    async fn flush(
        &mut self,
        _chunk_meta: ChunkMetadata,
    ) -> Result<Vec<TransmuxResult>, TransmuxError> {
        Ok(Vec::new())
    }
}

/// Factory producing [`PassthroughTransmuxer`] units.
#[derive(Debug, Default)]
pub struct PassthroughFactory;

impl TransmuxerFactory for PassthroughFactory {
    fn create(
        &self,
        _bootstrap: &WorkerBootstrap,
    ) -> Result<Box<dyn MediaTransmuxer>, TransmuxError> {
        Ok(Box::new(PassthroughTransmuxer::new()))
    }
}
