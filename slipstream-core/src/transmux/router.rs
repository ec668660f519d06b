//! Routing of inbound messages from the background execution unit.
//!
//! One router instance decodes one message at a time on the coordinator's
//! control flow. Stale generations are filtered here; everything else is
//! dispatched to the completion callbacks, the logging sink, or the host
//! event bus.

use tokio::sync::mpsc;

use crate::transmux::protocol::{HostEvent, RESERVED_EVENTS, WorkerEvent, WorkerLogLevel, WorkerMessage};
use crate::transmux::types::{
    ChunkMetadata, PartDescriptor, SegmentDescriptor, TrackKind, TransmuxResult,
};

/// Callbacks supplied at coordinator construction.
pub struct TransmuxCallbacks {
    /// Invoked once per completed processing result, descriptor-enriched.
    pub on_transmux_complete: Box<dyn FnMut(TransmuxResult) + Send>,
    /// Invoked once per flush acknowledgment.
    pub on_flush: Box<dyn FnMut(ChunkMetadata) + Send>,
}

/// Follow-up the coordinator must perform after routing a message.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum RouterAction {
    None,
    /// The unit finished bootstrap; its retained bootstrap payload can go.
    ReleaseBootstrap,
}

/// Decodes inbound worker messages and dispatches them.
pub(crate) struct MessageRouter {
    track: TrackKind,
    callbacks: TransmuxCallbacks,
    event_bus: mpsc::UnboundedSender<HostEvent>,
}

impl MessageRouter {
    pub(crate) fn new(
        track: TrackKind,
        callbacks: TransmuxCallbacks,
        event_bus: mpsc::UnboundedSender<HostEvent>,
    ) -> Self {
        Self {
            track,
            callbacks,
            event_bus,
        }
    }

    /// Routes one inbound message.
    ///
    /// Messages tagged with an instance number other than `current_instance`
    /// belong to a destroyed unit generation and are dropped without any
    /// observable effect.
    pub(crate) fn route(
        &mut self,
        message: WorkerMessage,
        current_instance: u64,
        last_frag: Option<&SegmentDescriptor>,
        last_part: Option<&PartDescriptor>,
    ) -> RouterAction {
        if message.instance_no != current_instance {
            return RouterAction::None;
        }

        match message.event {
            WorkerEvent::Ready => return RouterAction::ReleaseBootstrap,
            WorkerEvent::Log { level, message } => forward_log(level, &message),
            WorkerEvent::Complete { result } => {
                self.deliver_complete(result, last_frag, last_part);
            }
            WorkerEvent::Flushed { chunk_meta } => self.deliver_flush(chunk_meta),
            WorkerEvent::Fatal { reason } => {
                // Channel failures are the coordinator's concern and are
                // intercepted before routing.
                tracing::error!(%reason, "fatal worker event reached the router, dropping");
            }
            WorkerEvent::Passthrough { name, payload } => {
                if name.is_empty() || RESERVED_EVENTS.contains(&name.as_str()) {
                    tracing::error!(
                        event = %name,
                        "malformed passthrough message from transmux worker, dropping"
                    );
                    return RouterAction::None;
                }
                let _ = self.event_bus.send(HostEvent {
                    name,
                    payload,
                    frag: last_frag.cloned(),
                    track: self.track,
                });
            }
        }
        RouterAction::None
    }

    /// Surfaces one processing result with segment identity attached.
    ///
    /// Shared by both execution paths: the background path routes through
    /// [`Self::route`], the inline path settles results directly here.
    pub(crate) fn deliver_complete(
        &mut self,
        mut result: TransmuxResult,
        last_frag: Option<&SegmentDescriptor>,
        last_part: Option<&PartDescriptor>,
    ) {
        result.frag = last_frag.cloned();
        result.part = last_part.cloned();
        (self.callbacks.on_transmux_complete)(result);
    }

    /// Acknowledges a flush to the caller.
    pub(crate) fn deliver_flush(&mut self, chunk_meta: ChunkMetadata) {
        (self.callbacks.on_flush)(chunk_meta);
    }

    /// Emits a non-fatal error event on the host bus.
    pub(crate) fn emit_error(&self, details: &str, last_frag: Option<&SegmentDescriptor>) {
        let _ = self.event_bus.send(HostEvent {
            name: "error".to_string(),
            payload: serde_json::json!({ "fatal": false, "details": details }),
            frag: last_frag.cloned(),
            track: self.track,
        });
    }
}

fn forward_log(level: WorkerLogLevel, message: &str) {
    match level {
        WorkerLogLevel::Debug => tracing::debug!("{message}"),
        WorkerLogLevel::Info => tracing::info!("{message}"),
        WorkerLogLevel::Warn => tracing::warn!("{message}"),
        WorkerLogLevel::Error => tracing::error!("{message}"),
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::transmux::test_mocks::channel_callbacks;
    use crate::transmux::types::RemuxOutput;

    fn frag() -> SegmentDescriptor {
        SegmentDescriptor {
            level: 2,
            sn: 10,
            cc: 1,
            start: 40.0,
            decrypt_data: None,
        }
    }

    fn completion(sn: u64) -> WorkerEvent {
        WorkerEvent::Complete {
            result: TransmuxResult {
                output: RemuxOutput {
                    data: Bytes::from_static(b"chunk"),
                    independent: true,
                },
                chunk_meta: ChunkMetadata::new(2, sn, 0),
                frag: None,
                part: None,
            },
        }
    }

    #[test]
    fn test_stale_instance_is_dropped_silently() {
        let (callbacks, mut completions, mut flushes) = channel_callbacks();
        let (event_tx, mut events) = mpsc::unbounded_channel();
        let mut router = MessageRouter::new(TrackKind::Main, callbacks, event_tx);

        let action = router.route(
            WorkerMessage {
                instance_no: 1,
                event: completion(10),
            },
            2,
            Some(&frag()),
            None,
        );

        assert_eq!(action, RouterAction::None);
        assert!(completions.try_recv().is_err());
        assert!(flushes.try_recv().is_err());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_completion_reattaches_descriptors() {
        let (callbacks, mut completions, _flushes) = channel_callbacks();
        let (event_tx, _events) = mpsc::unbounded_channel();
        let mut router = MessageRouter::new(TrackKind::Main, callbacks, event_tx);

        let part = PartDescriptor {
            index: 3,
            start: 41.0,
        };
        router.route(
            WorkerMessage {
                instance_no: 2,
                event: completion(10),
            },
            2,
            Some(&frag()),
            Some(&part),
        );

        let result = completions.try_recv().unwrap();
        assert_eq!(result.frag, Some(frag()));
        assert_eq!(result.part, Some(part));
    }

    #[test]
    fn test_ready_requests_bootstrap_release() {
        let (callbacks, _completions, _flushes) = channel_callbacks();
        let (event_tx, _events) = mpsc::unbounded_channel();
        let mut router = MessageRouter::new(TrackKind::Main, callbacks, event_tx);

        let action = router.route(
            WorkerMessage {
                instance_no: 1,
                event: WorkerEvent::Ready,
            },
            1,
            None,
            None,
        );

        assert_eq!(action, RouterAction::ReleaseBootstrap);
    }

    #[test]
    fn test_flushed_invokes_flush_callback() {
        let (callbacks, _completions, mut flushes) = channel_callbacks();
        let (event_tx, _events) = mpsc::unbounded_channel();
        let mut router = MessageRouter::new(TrackKind::Audio, callbacks, event_tx);

        let meta = ChunkMetadata::new(2, 10, 1);
        router.route(
            WorkerMessage {
                instance_no: 5,
                event: WorkerEvent::Flushed { chunk_meta: meta },
            },
            5,
            None,
            None,
        );

        assert_eq!(flushes.try_recv().unwrap(), meta);
    }

    #[test]
    fn test_passthrough_reaches_host_bus_with_identity() {
        let (callbacks, _completions, _flushes) = channel_callbacks();
        let (event_tx, mut events) = mpsc::unbounded_channel();
        let mut router = MessageRouter::new(TrackKind::Audio, callbacks, event_tx);

        router.route(
            WorkerMessage {
                instance_no: 1,
                event: WorkerEvent::Passthrough {
                    name: "initSegmentParsed".to_string(),
                    payload: serde_json::json!({ "tracks": 2 }),
                },
            },
            1,
            Some(&frag()),
            None,
        );

        let event = events.try_recv().unwrap();
        assert_eq!(event.name, "initSegmentParsed");
        assert_eq!(event.track, TrackKind::Audio);
        assert_eq!(event.frag, Some(frag()));
        assert_eq!(event.payload["tracks"], serde_json::json!(2));
    }

    #[test]
    fn test_reserved_passthrough_name_is_dropped() {
        let (callbacks, _completions, _flushes) = channel_callbacks();
        let (event_tx, mut events) = mpsc::unbounded_channel();
        let mut router = MessageRouter::new(TrackKind::Main, callbacks, event_tx);

        for name in ["", "transmuxComplete", "init"] {
            router.route(
                WorkerMessage {
                    instance_no: 1,
                    event: WorkerEvent::Passthrough {
                        name: name.to_string(),
                        payload: serde_json::Value::Null,
                    },
                },
                1,
                None,
                None,
            );
        }

        assert!(events.try_recv().is_err());
    }
}
