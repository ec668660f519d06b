//! Background execution unit for the transmux pipeline.
//!
//! The unit runs as a detached task owning its processing unit. It shares no
//! memory with the coordinator: commands arrive on a per-generation channel
//! and results leave on the coordinator's event channel, each direction
//! tagged with the generation's instance number.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::transmux::protocol::{
    CommandEnvelope, WorkerBootstrap, WorkerCommand, WorkerEvent, WorkerLogLevel, WorkerMessage,
};
use crate::transmux::transmuxer::{MediaTransmuxer, TransmuxerFactory};
use crate::transmux::types::{ChunkMetadata, TransmuxError};

/// Bootstrap payload retained while the background unit boots.
///
/// Released when the unit reports ready, or at teardown. Release is
/// idempotent: only the first call frees anything.
#[derive(Debug)]
pub(crate) struct BootstrapHandle {
    payload: Option<WorkerBootstrap>,
}

impl BootstrapHandle {
    fn new(payload: WorkerBootstrap) -> Self {
        Self {
            payload: Some(payload),
        }
    }

    /// Returns true when this call actually released the payload.
    pub(crate) fn release(&mut self) -> bool {
        self.payload.take().is_some()
    }
}

/// Handle to one generation of the background execution unit.
pub(crate) struct RemoteUnit {
    command_tx: mpsc::UnboundedSender<CommandEnvelope>,
    join_handle: JoinHandle<()>,
    bootstrap: BootstrapHandle,
    instance_no: u64,
}

impl RemoteUnit {
    /// Sends one command tagged with this unit's instance number.
    ///
    /// On failure the command is handed back so the caller can re-dispatch
    /// its payload elsewhere.
    pub(crate) fn send(&self, command: WorkerCommand) -> Result<(), WorkerCommand> {
        self.command_tx
            .send(CommandEnvelope {
                instance_no: self.instance_no,
                command,
            })
            .map_err(|err| err.0.command)
    }

    /// Releases the bootstrap payload; true only on the first call.
    pub(crate) fn release_bootstrap(&mut self) -> bool {
        self.bootstrap.release()
    }

    /// Abrupt termination. In-flight work is abandoned; its eventual absence
    /// is covered by the instance number filter.
    pub(crate) fn terminate(mut self) {
        self.bootstrap.release();
        self.join_handle.abort();
    }
}

/// Spawns a fresh background unit generation and issues its `Init` command.
pub(crate) fn spawn_remote_unit(
    instance_no: u64,
    factory: Arc<dyn TransmuxerFactory>,
    bootstrap: WorkerBootstrap,
    event_tx: mpsc::UnboundedSender<WorkerMessage>,
) -> RemoteUnit {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let join_handle = tokio::spawn(run_worker(instance_no, factory, command_rx, event_tx));

    let unit = RemoteUnit {
        command_tx,
        join_handle,
        bootstrap: BootstrapHandle::new(bootstrap.clone()),
        instance_no,
    };
    let _ = unit.send(WorkerCommand::Init { bootstrap });
    unit
}

fn emit(event_tx: &mpsc::UnboundedSender<WorkerMessage>, instance_no: u64, event: WorkerEvent) {
    let _ = event_tx.send(WorkerMessage { instance_no, event });
}

async fn run_worker(
    instance_no: u64,
    factory: Arc<dyn TransmuxerFactory>,
    mut command_rx: mpsc::UnboundedReceiver<CommandEnvelope>,
    event_tx: mpsc::UnboundedSender<WorkerMessage>,
) {
    let mut transmuxer: Option<Box<dyn MediaTransmuxer>> = None;

    while let Some(envelope) = command_rx.recv().await {
        if envelope.instance_no != instance_no {
            // Stale generation; the coordinator has moved on.
            continue;
        }

        match envelope.command {
            WorkerCommand::Init { bootstrap } => match factory.create(&bootstrap) {
                Ok(unit) => {
                    transmuxer = Some(unit);
                    emit(
                        &event_tx,
                        instance_no,
                        WorkerEvent::Log {
                            level: WorkerLogLevel::Debug,
                            message: format!("transmux worker ready for {} track", bootstrap.track),
                        },
                    );
                    emit(&event_tx, instance_no, WorkerEvent::Ready);
                }
                Err(error) => {
                    emit(
                        &event_tx,
                        instance_no,
                        WorkerEvent::Fatal {
                            reason: error.to_string(),
                        },
                    );
                    return;
                }
            },
            WorkerCommand::Configure { config } => {
                let Some(unit) = transmuxer.as_mut() else {
                    emit_protocol_violation(&event_tx, instance_no, "configure");
                    continue;
                };
                unit.configure(&config);
            }
            WorkerCommand::Demux {
                data,
                decrypt_data,
                chunk_meta,
                state,
            } => {
                let Some(unit) = transmuxer.as_mut() else {
                    emit_protocol_violation(&event_tx, instance_no, "demux");
                    continue;
                };
                match unit.push(data, decrypt_data, chunk_meta, state).await {
                    Ok(result) => emit(&event_tx, instance_no, WorkerEvent::Complete { result }),
                    Err(error) => emit_segment_failure(&event_tx, instance_no, chunk_meta, &error),
                }
            }
            WorkerCommand::Flush { chunk_meta } => {
                if let Some(unit) = transmuxer.as_mut() {
                    match unit.flush(chunk_meta).await {
                        Ok(results) => {
                            for result in results {
                                emit(&event_tx, instance_no, WorkerEvent::Complete { result });
                            }
                        }
                        Err(error) => {
                            emit_segment_failure(&event_tx, instance_no, chunk_meta, &error);
                        }
                    }
                } else {
                    emit_protocol_violation(&event_tx, instance_no, "flush");
                }
                // Always acknowledge so the caller's flush settles.
                emit(&event_tx, instance_no, WorkerEvent::Flushed { chunk_meta });
            }
        }
    }

    if let Some(mut unit) = transmuxer {
        unit.destroy();
    }
}

fn emit_protocol_violation(
    event_tx: &mpsc::UnboundedSender<WorkerMessage>,
    instance_no: u64,
    command: &str,
) {
    emit(
        event_tx,
        instance_no,
        WorkerEvent::Log {
            level: WorkerLogLevel::Error,
            message: format!("{command} command before bootstrap, dropping"),
        },
    );
}

fn emit_segment_failure(
    event_tx: &mpsc::UnboundedSender<WorkerMessage>,
    instance_no: u64,
    chunk_meta: ChunkMetadata,
    error: &TransmuxError,
) {
    emit(
        event_tx,
        instance_no,
        WorkerEvent::Log {
            level: WorkerLogLevel::Error,
            message: format!("transmux failed: {error}"),
        },
    );
    emit(
        event_tx,
        instance_no,
        WorkerEvent::Passthrough {
            name: "error".to_string(),
            payload: serde_json::json!({
                "fatal": false,
                "details": error.to_string(),
                "chunkMeta": chunk_meta,
            }),
        },
    );
}
