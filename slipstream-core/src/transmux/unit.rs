//! Execution unit variants behind the coordinator.
//!
//! Exactly one variant is active at a time; fallback tears the old variant
//! down before the replacement is used.

use crate::transmux::transmuxer::MediaTransmuxer;
use crate::transmux::worker::RemoteUnit;

/// The active execution strategy.
pub(crate) enum ExecutionUnit {
    /// Background task, reached only by message passing.
    Remote(RemoteUnit),
    /// Inline unit driven directly on the coordinator's control flow.
    Local(LocalUnit),
}

impl ExecutionUnit {
    pub(crate) fn is_remote(&self) -> bool {
        matches!(self, ExecutionUnit::Remote(_))
    }

    /// Tears the unit down, releasing whatever it holds.
    pub(crate) fn teardown(self) {
        match self {
            ExecutionUnit::Remote(remote) => remote.terminate(),
            ExecutionUnit::Local(mut local) => local.transmuxer.destroy(),
        }
    }
}

/// Inline execution unit.
pub(crate) struct LocalUnit {
    pub(crate) transmuxer: Box<dyn MediaTransmuxer>,
}

impl LocalUnit {
    pub(crate) fn new(transmuxer: Box<dyn MediaTransmuxer>) -> Self {
        Self { transmuxer }
    }
}
