//! Boundary traits for the replaceable processing unit.
//!
//! The coordination layer treats container demuxing/remuxing as an opaque
//! payload operation. Implementations of [`MediaTransmuxer`] perform the
//! actual parsing; one [`TransmuxerFactory`] serves both the background and
//! the inline execution paths, so a fallback rebuilds the same kind of unit.

use async_trait::async_trait;
use bytes::Bytes;

use crate::transmux::protocol::WorkerBootstrap;
use crate::transmux::types::{
    ChunkMetadata, DecryptData, TransmuxConfig, TransmuxError, TransmuxResult, TransmuxState,
};

/// Container demux/remux engine behind the coordination layer.
///
/// Implementations echo `chunk_meta` back unchanged in every result they
/// produce and leave the descriptor fields of [`TransmuxResult`] unset; the
/// coordination layer attaches segment identity before surfacing results.
#[async_trait]
pub trait MediaTransmuxer: Send {
    /// Applies codec hints and initialization data.
    ///
    /// Called before the first push of a fresh unit and again whenever the
    /// configuration changes.
    fn configure(&mut self, config: &TransmuxConfig);

    /// Processes one pushed payload.
    ///
    /// # Errors
    ///
    /// - `TransmuxError::DemuxFailed` - Payload could not be parsed
    /// - `TransmuxError::UnsupportedContainer` - Container format not handled
    /// - `TransmuxError::DecryptionFailed` - Decryption parameters rejected
    async fn push(
        &mut self,
        data: Bytes,
        decrypt_data: Option<DecryptData>,
        chunk_meta: ChunkMetadata,
        state: TransmuxState,
    ) -> Result<TransmuxResult, TransmuxError>;

    /// Drains buffered samples accumulated by previous pushes.
    ///
    /// # Errors
    ///
    /// - `TransmuxError::DemuxFailed` - Buffered samples could not be emitted
    async fn flush(&mut self, chunk_meta: ChunkMetadata)
    -> Result<Vec<TransmuxResult>, TransmuxError>;

    /// Releases unit resources. Called once on teardown.
    fn destroy(&mut self) {}
}

/// Creates processing units on demand.
pub trait TransmuxerFactory: Send + Sync {
    /// Builds one processing unit for the given bootstrap payload.
    ///
    /// # Errors
    ///
    /// - `TransmuxError::ConstructionFailed` - Unit could not be built
    fn create(&self, bootstrap: &WorkerBootstrap) -> Result<Box<dyn MediaTransmuxer>, TransmuxError>;

    /// Whether units from this factory may run in a background task.
    ///
    /// Factories backed by context-bound resources return `false` to pin
    /// processing to the coordinator's own control flow.
    fn supports_background(&self) -> bool {
        true
    }
}
