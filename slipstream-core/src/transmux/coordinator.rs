//! Coordinator for the transmux pipeline.
//!
//! The coordinator runs as an actor owning all per-track state: the retained
//! segment descriptors, the last configuration applied to the active unit,
//! the unit itself, and the generation counter. Caller commands and worker
//! events drain on one control flow, so there is exactly one writer and no
//! locking anywhere in the pipeline.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::config::{SlipstreamConfig, TransmuxOptions};
use crate::transmux::handle::TransmuxerHandle;
use crate::transmux::protocol::{
    HostEvent, WorkerBootstrap, WorkerCommand, WorkerEvent, WorkerMessage,
};
use crate::transmux::router::{MessageRouter, RouterAction, TransmuxCallbacks};
use crate::transmux::transmuxer::TransmuxerFactory;
use crate::transmux::types::{
    ChunkMetadata, DecryptData, PartDescriptor, SegmentDescriptor, TrackKind, TransmuxConfig,
    TransmuxState,
};
use crate::transmux::unit::{ExecutionUnit, LocalUnit};
use crate::transmux::worker::spawn_remote_unit;

/// One push request as accepted from the caller.
#[derive(Debug)]
pub(crate) struct PushRequest {
    pub data: Bytes,
    pub init_segment: Bytes,
    pub audio_codec: String,
    pub video_codec: String,
    pub frag: SegmentDescriptor,
    pub part: Option<PartDescriptor>,
    pub duration: f64,
    pub accurate_time_offset: bool,
    pub chunk_meta: ChunkMetadata,
}

/// Commands accepted by the coordinator actor.
pub(crate) enum CoordinatorCommand {
    Push(Box<PushRequest>),
    Flush { chunk_meta: ChunkMetadata },
    Destroy,
}

/// Spawns the transmux coordinator actor and returns its handle.
///
/// Unit selection happens here: a background unit when configuration and the
/// factory allow it, the inline unit otherwise. A background unit that fails
/// to come up falls back to inline processing transparently; the public
/// contract of the returned handle is identical either way.
pub fn spawn_transmux_coordinator(
    config: SlipstreamConfig,
    track: TrackKind,
    factory: Arc<dyn TransmuxerFactory>,
    callbacks: TransmuxCallbacks,
    event_bus: mpsc::UnboundedSender<HostEvent>,
) -> TransmuxerHandle {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let router = MessageRouter::new(track, callbacks, event_bus);
    let mut coordinator = TransmuxCoordinator {
        options: config.transmux,
        track,
        factory,
        router,
        event_tx,
        unit: None,
        instance_no: 0,
        last_config: None,
        last_frag: None,
        last_part: None,
    };
    coordinator.create_initial_unit();

    tokio::spawn(run_coordinator(coordinator, command_rx, event_rx));

    TransmuxerHandle::new(command_tx)
}

async fn run_coordinator(
    mut coordinator: TransmuxCoordinator,
    mut command_rx: mpsc::UnboundedReceiver<CoordinatorCommand>,
    mut event_rx: mpsc::UnboundedReceiver<WorkerMessage>,
) {
    tracing::debug!(track = %coordinator.track, "transmux coordinator started");

    loop {
        tokio::select! {
            command = command_rx.recv() => match command {
                Some(CoordinatorCommand::Push(request)) => coordinator.handle_push(*request).await,
                Some(CoordinatorCommand::Flush { chunk_meta }) => {
                    coordinator.handle_flush(chunk_meta).await;
                }
                Some(CoordinatorCommand::Destroy) | None => break,
            },
            Some(message) = event_rx.recv() => coordinator.handle_worker_message(message),
        }
    }

    coordinator.shutdown();
    tracing::debug!(track = %coordinator.track, "transmux coordinator stopped");
}

struct TransmuxCoordinator {
    options: TransmuxOptions,
    track: TrackKind,
    factory: Arc<dyn TransmuxerFactory>,
    router: MessageRouter,
    /// Inbound side shared by every background unit generation; stale
    /// generations are filtered by instance number.
    event_tx: mpsc::UnboundedSender<WorkerMessage>,
    unit: Option<ExecutionUnit>,
    instance_no: u64,
    /// Configuration last applied to the current unit instance.
    last_config: Option<TransmuxConfig>,
    last_frag: Option<SegmentDescriptor>,
    last_part: Option<PartDescriptor>,
}

impl TransmuxCoordinator {
    fn create_initial_unit(&mut self) {
        if self.options.enable_worker && self.factory.supports_background() {
            self.spawn_worker();
        } else {
            self.create_local_unit();
        }
    }

    fn bootstrap(&self) -> WorkerBootstrap {
        WorkerBootstrap {
            track: self.track,
            options: self.options.clone(),
        }
    }

    /// Boots a fresh background unit generation.
    fn spawn_worker(&mut self) {
        self.instance_no += 1;
        let unit = spawn_remote_unit(
            self.instance_no,
            Arc::clone(&self.factory),
            self.bootstrap(),
            self.event_tx.clone(),
        );
        self.unit = Some(ExecutionUnit::Remote(unit));
        self.last_config = None;
        tracing::debug!(
            track = %self.track,
            instance_no = self.instance_no,
            "transmux worker spawned"
        );
    }

    fn create_local_unit(&mut self) {
        match self.factory.create(&self.bootstrap()) {
            Ok(transmuxer) => {
                self.unit = Some(ExecutionUnit::Local(LocalUnit::new(transmuxer)));
                self.last_config = None;
            }
            Err(error) => {
                tracing::error!(track = %self.track, %error, "no transmuxer available");
                self.unit = None;
            }
        }
    }

    /// Terminal fallback: once here, the coordinator never re-attempts a
    /// background unit.
    fn fall_back_to_local(&mut self, reason: &str) {
        tracing::warn!(
            track = %self.track,
            reason,
            "transmux worker failed, falling back to inline processing"
        );
        if let Some(unit) = self.unit.take() {
            unit.teardown();
        }
        // Invalidates whatever the dead generation still has in flight.
        self.instance_no += 1;
        self.router.emit_error(reason, self.last_frag.as_ref());
        self.create_local_unit();
    }

    async fn handle_push(&mut self, request: PushRequest) {
        let PushRequest {
            data,
            init_segment,
            audio_codec,
            video_codec,
            frag,
            part,
            duration,
            accurate_time_offset,
            chunk_meta,
        } = request;

        let state = TransmuxState::derive(
            self.last_frag.as_ref(),
            self.last_part.as_ref(),
            &frag,
            part.as_ref(),
            accurate_time_offset,
            self.options.keyframes_only,
        );
        let config = TransmuxConfig::new(audio_codec, video_codec, init_segment, duration);
        let decrypt_data = frag.decrypt_data.clone();
        self.last_frag = Some(frag);
        self.last_part = part;

        if self.unit.as_ref().is_some_and(ExecutionUnit::is_remote) {
            // A codec switch invalidates the background unit's pipeline;
            // rebuild it as a fresh generation before configuring.
            if self
                .last_config
                .as_ref()
                .is_some_and(|applied| config.codec_change(applied))
            {
                self.restart_worker();
            }
            let needs_configure = self
                .last_config
                .as_ref()
                .map_or(true, |applied| config.requires_reconfigure(applied));

            match self.try_send_remote(&config, needs_configure, data, decrypt_data, chunk_meta, state)
            {
                Ok(()) => self.last_config = Some(config),
                Err((data, decrypt_data, chunk_meta, state)) => {
                    self.fall_back_to_local("worker command channel closed");
                    self.push_local(config, data, decrypt_data, chunk_meta, state).await;
                }
            }
        } else if self.unit.is_some() {
            self.push_local(config, data, decrypt_data, chunk_meta, state).await;
        } else {
            tracing::error!(track = %self.track, "push with no execution unit, dropping segment");
        }
    }

    /// Sends configure (when needed) and demux to the background unit.
    ///
    /// On a dead channel the demux payload is handed back so the caller can
    /// re-dispatch it inline.
    fn try_send_remote(
        &self,
        config: &TransmuxConfig,
        needs_configure: bool,
        data: Bytes,
        decrypt_data: Option<DecryptData>,
        chunk_meta: ChunkMetadata,
        state: TransmuxState,
    ) -> Result<(), (Bytes, Option<DecryptData>, ChunkMetadata, TransmuxState)> {
        let Some(ExecutionUnit::Remote(unit)) = &self.unit else {
            return Err((data, decrypt_data, chunk_meta, state));
        };

        if needs_configure
            && unit
                .send(WorkerCommand::Configure {
                    config: config.clone(),
                })
                .is_err()
        {
            return Err((data, decrypt_data, chunk_meta, state));
        }

        match unit.send(WorkerCommand::Demux {
            data,
            decrypt_data,
            chunk_meta,
            state,
        }) {
            Ok(()) => Ok(()),
            Err(WorkerCommand::Demux {
                data,
                decrypt_data,
                chunk_meta,
                state,
            }) => Err((data, decrypt_data, chunk_meta, state)),
            Err(_) => unreachable!("send hands back the command it was given"),
        }
    }

    async fn push_local(
        &mut self,
        config: TransmuxConfig,
        data: Bytes,
        decrypt_data: Option<DecryptData>,
        chunk_meta: ChunkMetadata,
        state: TransmuxState,
    ) {
        let needs_configure = self
            .last_config
            .as_ref()
            .map_or(true, |applied| config.requires_reconfigure(applied));

        let Some(ExecutionUnit::Local(local)) = &mut self.unit else {
            tracing::error!(track = %self.track, "no inline transmuxer, dropping segment");
            return;
        };

        if needs_configure {
            local.transmuxer.configure(&config);
        }
        self.last_config = Some(config);

        match local.transmuxer.push(data, decrypt_data, chunk_meta, state).await {
            Ok(result) => {
                self.router
                    .deliver_complete(result, self.last_frag.as_ref(), self.last_part.as_ref());
            }
            Err(error) => {
                tracing::error!(track = %self.track, %error, "inline transmux failed");
                self.router
                    .emit_error(&error.to_string(), self.last_frag.as_ref());
            }
        }
    }

    async fn handle_flush(&mut self, chunk_meta: ChunkMetadata) {
        let remote_failed = if let Some(ExecutionUnit::Remote(unit)) = &self.unit {
            match unit.send(WorkerCommand::Flush { chunk_meta }) {
                Ok(()) => return,
                Err(_) => true,
            }
        } else {
            false
        };

        if remote_failed {
            self.fall_back_to_local("worker command channel closed");
        }
        self.flush_local(chunk_meta).await;
    }

    async fn flush_local(&mut self, chunk_meta: ChunkMetadata) {
        if let Some(ExecutionUnit::Local(local)) = &mut self.unit {
            match local.transmuxer.flush(chunk_meta).await {
                Ok(results) => {
                    for result in results {
                        self.router.deliver_complete(
                            result,
                            self.last_frag.as_ref(),
                            self.last_part.as_ref(),
                        );
                    }
                }
                Err(error) => {
                    tracing::error!(track = %self.track, %error, "inline flush failed");
                    self.router
                        .emit_error(&error.to_string(), self.last_frag.as_ref());
                }
            }
        }
        self.router.deliver_flush(chunk_meta);
    }

    fn handle_worker_message(&mut self, message: WorkerMessage) {
        if let WorkerEvent::Fatal { reason } = &message.event {
            if message.instance_no == self.instance_no
                && self.unit.as_ref().is_some_and(ExecutionUnit::is_remote)
            {
                let reason = reason.clone();
                self.fall_back_to_local(&reason);
            }
            return;
        }

        let action = self.router.route(
            message,
            self.instance_no,
            self.last_frag.as_ref(),
            self.last_part.as_ref(),
        );
        if action == RouterAction::ReleaseBootstrap {
            if let Some(ExecutionUnit::Remote(unit)) = &mut self.unit {
                if unit.release_bootstrap() {
                    tracing::debug!(
                        track = %self.track,
                        instance_no = self.instance_no,
                        "transmux worker bootstrap released"
                    );
                }
            }
        }
    }

    /// Tears down the current background unit and boots a fresh generation.
    fn restart_worker(&mut self) {
        tracing::debug!(
            track = %self.track,
            instance_no = self.instance_no,
            "codec change, restarting transmux worker"
        );
        if let Some(unit) = self.unit.take() {
            unit.teardown();
        }
        self.spawn_worker();
    }

    fn shutdown(&mut self) {
        if let Some(unit) = self.unit.take() {
            unit.teardown();
        }
        // Anything still in flight now targets a dead generation.
        self.instance_no += 1;
        self.last_frag = None;
        self.last_part = None;
        self.last_config = None;
    }
}
