//! Mock implementations for testing the transmux coordination layer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::transmux::protocol::WorkerBootstrap;
use crate::transmux::router::TransmuxCallbacks;
use crate::transmux::transmuxer::{MediaTransmuxer, TransmuxerFactory};
use crate::transmux::types::{
    ChunkMetadata, DecryptData, RemuxOutput, TransmuxConfig, TransmuxError, TransmuxResult,
    TransmuxState,
};

/// One call observed by a mock processing unit.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RecordedCall {
    Create,
    Configure(TransmuxConfig),
    Push {
        data: Bytes,
        decrypt_data: Option<DecryptData>,
        chunk_meta: ChunkMetadata,
        state: TransmuxState,
    },
    Flush(ChunkMetadata),
    Destroy,
}

pub(crate) type CallLog = Arc<Mutex<Vec<RecordedCall>>>;

/// Factory producing recording mock units; shared state survives unit
/// recreation so tests can observe calls across generations.
pub(crate) struct MockFactory {
    calls: CallLog,
    created: Arc<AtomicUsize>,
    fail_creates: usize,
    fail_push: bool,
    flush_results: Vec<TransmuxResult>,
    background: bool,
}

impl MockFactory {
    pub(crate) fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            created: Arc::new(AtomicUsize::new(0)),
            fail_creates: 0,
            fail_push: false,
            flush_results: Vec::new(),
            background: true,
        }
    }

    /// Factory whose first `count` creations fail.
    pub(crate) fn failing_creates(count: usize) -> Self {
        Self {
            fail_creates: count,
            ..Self::new()
        }
    }

    pub(crate) fn with_failing_push(mut self) -> Self {
        self.fail_push = true;
        self
    }

    pub(crate) fn with_flush_results(mut self, results: Vec<TransmuxResult>) -> Self {
        self.flush_results = results;
        self
    }

    pub(crate) fn without_background_support(mut self) -> Self {
        self.background = false;
        self
    }

    pub(crate) fn calls(&self) -> CallLog {
        Arc::clone(&self.calls)
    }

    pub(crate) fn created(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.created)
    }
}

impl TransmuxerFactory for MockFactory {
    fn create(
        &self,
        _bootstrap: &WorkerBootstrap,
    ) -> Result<Box<dyn MediaTransmuxer>, TransmuxError> {
        let attempt = self.created.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_creates {
            return Err(TransmuxError::ConstructionFailed {
                reason: "mock create failure".to_string(),
            });
        }
        self.calls.lock().unwrap().push(RecordedCall::Create);
        Ok(Box::new(MockTransmuxer {
            calls: Arc::clone(&self.calls),
            fail_push: self.fail_push,
            flush_results: self.flush_results.clone(),
        }))
    }

    fn supports_background(&self) -> bool {
        self.background
    }
}

/// Recording mock processing unit; echoes payloads back as output.
pub(crate) struct MockTransmuxer {
    calls: CallLog,
    fail_push: bool,
    flush_results: Vec<TransmuxResult>,
}

#[async_trait]
impl MediaTransmuxer for MockTransmuxer {
    fn configure(&mut self, config: &TransmuxConfig) {
        self.calls
            .lock()
            .unwrap()
            .push(RecordedCall::Configure(config.clone()));
    }

    async fn push(
        &mut self,
        data: Bytes,
        decrypt_data: Option<DecryptData>,
        chunk_meta: ChunkMetadata,
        state: TransmuxState,
    ) -> Result<TransmuxResult, TransmuxError> {
        self.calls.lock().unwrap().push(RecordedCall::Push {
            data: data.clone(),
            decrypt_data,
            chunk_meta,
            state,
        });
        if self.fail_push {
            return Err(TransmuxError::DemuxFailed {
                reason: "mock push failure".to_string(),
            });
        }
        Ok(TransmuxResult {
            output: RemuxOutput {
                data,
                independent: true,
            },
            chunk_meta,
            frag: None,
            part: None,
        })
    }

    async fn flush(
        &mut self,
        chunk_meta: ChunkMetadata,
    ) -> Result<Vec<TransmuxResult>, TransmuxError> {
        self.calls
            .lock()
            .unwrap()
            .push(RecordedCall::Flush(chunk_meta));
        Ok(self.flush_results.clone())
    }

    fn destroy(&mut self) {
        self.calls.lock().unwrap().push(RecordedCall::Destroy);
    }
}

/// Callbacks backed by channels, so tests can await surfaced results.
pub(crate) fn channel_callbacks() -> (
    TransmuxCallbacks,
    mpsc::UnboundedReceiver<TransmuxResult>,
    mpsc::UnboundedReceiver<ChunkMetadata>,
) {
    let (complete_tx, complete_rx) = mpsc::unbounded_channel();
    let (flush_tx, flush_rx) = mpsc::unbounded_channel();
    let callbacks = TransmuxCallbacks {
        on_transmux_complete: Box::new(move |result| {
            let _ = complete_tx.send(result);
        }),
        on_flush: Box::new(move |chunk_meta| {
            let _ = flush_tx.send(chunk_meta);
        }),
    };
    (callbacks, complete_rx, flush_rx)
}
