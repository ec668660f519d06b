//! Slipstream Core - media transmux coordination for browser playback
//!
//! This crate provides the coordination layer that turns compressed media
//! segments into browser-playable output: a per-track coordinator actor,
//! interchangeable background/inline execution units, a generation-tagged
//! wire protocol, and message routing back to the host application.

pub mod config;
pub mod tracing_setup;
pub mod transmux;

// Re-export main types for convenient access
pub use config::{SlipstreamConfig, TransmuxOptions};
pub use transmux::{
    TransmuxCallbacks, TransmuxError, TransmuxerHandle, spawn_transmux_coordinator,
};

/// Core errors that can bubble up from any Slipstream subsystem.
#[derive(Debug, thiserror::Error)]
pub enum SlipstreamError {
    #[error("Transmux error: {0}")]
    Transmux(#[from] TransmuxError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SlipstreamError>;
