//! Transmux coordination for converting media segments to browser-playable
//! output.
//!
//! The hard problem here is not the codec work, which lives behind the
//! [`MediaTransmuxer`] boundary, but the coordination around it: deciding
//! where processing executes, keeping per-segment state consistent across an
//! asynchronous and restartable execution boundary, correlating results back
//! to rich request objects, and degrading gracefully when the background
//! unit is unavailable or fails.
//!
//! # Architecture
//!
//! - `TransmuxCoordinator`: actor owning per-track state, unit lifecycle and
//!   the fallback state machine
//! - `TransmuxerHandle`: fire-and-forget public API (push/flush/destroy)
//! - `MessageRouter`: decodes worker events, filters stale generations,
//!   dispatches to callbacks and the host event bus
//! - `RemoteUnit` / `LocalUnit`: the two execution strategies behind one
//!   contract
//! - `PassthroughTransmuxer`: default processing unit for fMP4 input
//!
//! # Lifecycle
//!
//! A coordinator starts `Uninitialized`, becomes `Remote` when a background
//! unit can be built, and falls back to `Local` on the first fatal worker
//! error, terminally for the life of the instance. Every background unit
//! generation is tagged with an instance number; messages from dead
//! generations are dropped on both sides of the channel.

pub mod coordinator;
pub mod handle;
pub mod passthrough;
pub mod protocol;
pub mod router;
pub mod transmuxer;
pub mod types;

mod unit;
mod worker;

#[cfg(test)]
pub(crate) mod test_mocks;


pub use coordinator::spawn_transmux_coordinator;
pub use handle::TransmuxerHandle;
pub use passthrough::{PassthroughFactory, PassthroughTransmuxer};
pub use protocol::{HostEvent, WorkerBootstrap, WorkerLogLevel};
pub use router::TransmuxCallbacks;
pub use transmuxer::{MediaTransmuxer, TransmuxerFactory};
pub use types::{
    ChunkMetadata, DecryptData, EncryptionMethod, PartDescriptor, RemuxOutput, SegmentDescriptor,
    TrackKind, TransmuxConfig, TransmuxError, TransmuxResult, TransmuxState,
};
