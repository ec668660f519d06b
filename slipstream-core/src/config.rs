//! Centralized configuration for Slipstream.
//!
//! All tunable parameters are defined here to avoid hard-coded values
//! scattered throughout the codebase.

/// Central configuration for all Slipstream components.
#[derive(Debug, Clone, Default)]
pub struct SlipstreamConfig {
    pub transmux: TransmuxOptions,
}

/// Transmux coordination settings.
///
/// Controls where segment processing executes and which processing mode the
/// unit runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmuxOptions {
    /// Run the processing unit in a background task when the environment and
    /// factory support it
    pub enable_worker: bool,
    /// Suppress non-keyframe output in the processing unit
    pub keyframes_only: bool,
}

impl Default for TransmuxOptions {
    fn default() -> Self {
        Self {
            enable_worker: true,
            keyframes_only: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_enabled_by_default() {
        let config = SlipstreamConfig::default();
        assert!(config.transmux.enable_worker);
        assert!(!config.transmux.keyframes_only);
    }
}
