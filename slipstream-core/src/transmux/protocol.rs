//! Wire protocol between the coordinator and the background execution unit.
//!
//! All traffic crosses the boundary as owned messages: binary payloads travel
//! as [`Bytes`], so sending transfers ownership instead of copying. Every
//! envelope in both directions carries the instance number of the unit
//! generation it belongs to; a mismatch means the message outlived its unit
//! and must be dropped.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::config::TransmuxOptions;
use crate::transmux::types::{
    ChunkMetadata, DecryptData, SegmentDescriptor, TrackKind, TransmuxConfig, TransmuxResult,
    TransmuxState,
};

/// Event names the router handles itself; a passthrough event reusing one of
/// these is a protocol violation.
pub(crate) const RESERVED_EVENTS: [&str; 4] = ["init", "workerLog", "transmuxComplete", "flushed"];

/// Severity tag attached to log records forwarded from the background unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerLogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Payload handed to a freshly spawned background unit before it accepts any
/// other command.
#[derive(Debug, Clone)]
pub struct WorkerBootstrap {
    pub track: TrackKind,
    pub options: TransmuxOptions,
}

/// Outbound envelope tagging a command with the generation that issued it.
#[derive(Debug)]
pub struct CommandEnvelope {
    pub instance_no: u64,
    pub command: WorkerCommand,
}

/// Commands accepted by the background execution unit.
#[derive(Debug)]
pub enum WorkerCommand {
    /// Build the processing unit; must be the first command of a generation.
    Init { bootstrap: WorkerBootstrap },
    /// Apply codec hints and initialization data.
    Configure { config: TransmuxConfig },
    /// Process one pushed payload.
    Demux {
        data: Bytes,
        decrypt_data: Option<DecryptData>,
        chunk_meta: ChunkMetadata,
        state: TransmuxState,
    },
    /// Drain buffered samples and acknowledge.
    Flush { chunk_meta: ChunkMetadata },
}

/// Inbound envelope from the background unit.
#[derive(Debug)]
pub struct WorkerMessage {
    pub instance_no: u64,
    pub event: WorkerEvent,
}

/// Events produced by the background execution unit.
#[derive(Debug)]
pub enum WorkerEvent {
    /// Bootstrap finished; the unit accepts configuration and payloads.
    Ready,
    /// Log record to forward to the host logging sink.
    Log {
        level: WorkerLogLevel,
        message: String,
    },
    /// One completed processing result.
    Complete { result: TransmuxResult },
    /// A flush request fully drained.
    Flushed { chunk_meta: ChunkMetadata },
    /// The unit itself failed and will produce nothing further. Handled by
    /// the coordinator's fallback logic, never routed.
    Fatal { reason: String },
    /// Any other unit-emitted event, forwarded to the host event bus under
    /// its own name.
    Passthrough {
        name: String,
        payload: serde_json::Value,
    },
}

/// Event surfaced on the host bus for passthrough worker traffic.
///
/// The segment descriptor and logical track id are attached by the router;
/// the background unit only ever sees primitives.
#[derive(Debug, Clone)]
pub struct HostEvent {
    pub name: String,
    pub payload: serde_json::Value,
    pub frag: Option<SegmentDescriptor>,
    pub track: TrackKind,
}
