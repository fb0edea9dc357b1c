//! The upload / process / poll / reset lifecycle.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use chrono::Utc;
use shared::{
    domain::{validate_archive, Phase},
    protocol::Acknowledgement,
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    archive::ArchiveFile,
    backend::ProcessingBackend,
    error::{ControllerError, Operation},
    session::{Session, ToastKind},
    view::{render, View},
    SessionEvent,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

const UPLOAD_SUCCEEDED: &str = "File uploaded successfully";
const PROCESSING_SUCCEEDED: &str = "Processing completed successfully!";

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub poll_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Applied { completed: bool },
    TransportFailed,
    /// The response arrived after a reset or a newer run and was dropped.
    Discarded,
    Inactive,
}

pub struct UploadSessionController {
    backend: Arc<dyn ProcessingBackend>,
    config: ControllerConfig,
    // Lock order: `session` before `poller`.
    session: Mutex<Session>,
    poller: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl UploadSessionController {
    pub fn new(backend: Arc<dyn ProcessingBackend>) -> Arc<Self> {
        Self::with_config(backend, ControllerConfig::default())
    }

    pub fn with_config(backend: Arc<dyn ProcessingBackend>, config: ControllerConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            backend,
            config,
            session: Mutex::new(Session::new()),
            poller: Mutex::new(None),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn phase(&self) -> Phase {
        self.session.lock().await.phase()
    }

    pub async fn session(&self) -> Session {
        self.session.lock().await.clone()
    }

    pub async fn view(&self) -> View {
        let now = Utc::now();
        let mut session = self.session.lock().await;
        session.prune_toasts(now);
        render(&session, now)
    }

    pub async fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub async fn select_file(&self, file: ArchiveFile) -> Result<(), ControllerError> {
        if let Err(err) = validate_archive(file.name(), file.size_bytes()) {
            info!(name = file.name(), size = file.size_bytes(), error = %err, "archive rejected");
            self.notify(ToastKind::Error, err.user_message()).await;
            return Err(err.into());
        }

        {
            let mut session = self.session.lock().await;
            let phase = session.phase();
            if phase != Phase::Idle {
                return Err(ControllerError::InvalidPhase {
                    operation: Operation::Select,
                    phase,
                });
            }
            session.select(file);
        }
        self.emit_phase(Phase::Idle, Phase::Selected);

        self.upload_file().await
    }

    /// A drop selects its first file; an empty drop does nothing.
    pub async fn drop_files(
        &self,
        files: impl IntoIterator<Item = ArchiveFile>,
    ) -> Result<(), ControllerError> {
        self.set_drop_highlight(false).await;
        match files.into_iter().next() {
            Some(file) => self.select_file(file).await,
            None => Ok(()),
        }
    }

    pub async fn upload_file(&self) -> Result<(), ControllerError> {
        let (file, epoch) = {
            let mut session = self.session.lock().await;
            let phase = session.phase();
            let file = match (phase, session.selected_file()) {
                (Phase::Selected, Some(file)) => file.clone(),
                _ => {
                    return Err(ControllerError::InvalidPhase {
                        operation: Operation::Upload,
                        phase,
                    })
                }
            };
            (file, session.begin_upload())
        };
        self.emit_phase(Phase::Selected, Phase::Uploading);
        debug!(name = file.name(), size = file.size_bytes(), "uploading archive");

        let failure = collaborator_failure(Operation::Upload, self.backend.upload(&file).await);

        let now = Utc::now();
        let mut session = self.session.lock().await;
        if session.phase() != Phase::Uploading || session.epoch() != epoch {
            debug!(epoch, "discarding upload response for a superseded selection");
            return Err(ControllerError::Superseded {
                operation: Operation::Upload,
            });
        }

        match failure {
            None => {
                session.finish_upload();
                session.prune_toasts(now);
                let toast = session.raise_toast(ToastKind::Success, UPLOAD_SUCCEEDED, now);
                drop(session);
                info!(name = file.name(), "archive uploaded");
                self.emit_phase(Phase::Uploading, Phase::Uploaded);
                self.emit(SessionEvent::Toast(toast));
                Ok(())
            }
            Some(err) => {
                warn!(name = file.name(), error = %err, "archive upload failed");
                session.reset_to_idle();
                session.prune_toasts(now);
                let toast = session.raise_toast(ToastKind::Error, failure_toast(&err), now);
                drop(session);
                self.emit_phase(Phase::Uploading, Phase::Idle);
                self.emit(SessionEvent::Toast(toast));
                Err(err)
            }
        }
    }

    pub async fn remove_file(&self) -> Result<(), ControllerError> {
        let phase = {
            let mut session = self.session.lock().await;
            let phase = session.phase();
            if !matches!(phase, Phase::Selected | Phase::Uploading | Phase::Uploaded) {
                return Err(ControllerError::InvalidPhase {
                    operation: Operation::RemoveFile,
                    phase,
                });
            }
            session.reset_to_idle();
            phase
        };
        self.emit_phase(phase, Phase::Idle);
        Ok(())
    }

    pub async fn start_processing(self: &Arc<Self>) -> Result<(), ControllerError> {
        let epoch = {
            let mut session = self.session.lock().await;
            let phase = session.phase();
            if phase != Phase::Uploaded {
                return Err(ControllerError::InvalidPhase {
                    operation: Operation::Process,
                    phase,
                });
            }
            session.begin_processing()
        };
        self.emit_phase(Phase::Uploaded, Phase::Processing);

        let failure = collaborator_failure(
            Operation::Process,
            self.backend.start_processing().await,
        );

        let mut session = self.session.lock().await;
        if session.phase() != Phase::Processing || session.epoch() != epoch {
            debug!(epoch, "discarding process response for a superseded run");
            return Err(ControllerError::Superseded {
                operation: Operation::Process,
            });
        }

        match failure {
            None => {
                self.spawn_poller(epoch).await;
                drop(session);
                info!(epoch, "processing started");
                Ok(())
            }
            Some(err) => {
                warn!(error = %err, "processing failed to start");
                let now = Utc::now();
                session.fail(err.display_message());
                session.prune_toasts(now);
                let toast = session.raise_toast(ToastKind::Error, failure_toast(&err), now);
                if let Some(handle) = self.poller.lock().await.take() {
                    handle.abort();
                }
                drop(session);
                self.emit_phase(Phase::Processing, Phase::Failed);
                self.emit(SessionEvent::Toast(toast));
                Err(err)
            }
        }
    }

    pub async fn poll(&self) -> PollOutcome {
        let epoch = {
            let session = self.session.lock().await;
            if session.phase() != Phase::Processing {
                return PollOutcome::Inactive;
            }
            session.epoch()
        };
        self.poll_run(epoch).await
    }

    async fn poll_run(&self, epoch: u64) -> PollOutcome {
        {
            let session = self.session.lock().await;
            if session.phase() != Phase::Processing || session.epoch() != epoch {
                return PollOutcome::Inactive;
            }
        }

        let snapshot = match self.backend.fetch_status().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(
                    operation = %Operation::Status,
                    error = %format!("{err:#}"),
                    "status poll failed; retrying on next tick"
                );
                return PollOutcome::TransportFailed;
            }
        };

        let mut events = Vec::new();
        let completed = {
            let mut session = self.session.lock().await;
            if session.phase() != Phase::Processing || session.epoch() != epoch {
                debug!(epoch, "discarding stale status snapshot");
                return PollOutcome::Discarded;
            }

            let before = session.logs().len();
            let effect = session.apply_snapshot(&snapshot);
            events.extend(
                session.logs()[before..]
                    .iter()
                    .cloned()
                    .map(SessionEvent::LogAppended),
            );
            events.push(SessionEvent::Progress {
                counters: session.counters(),
                status_text: session.status_text().to_string(),
            });

            if effect.completed {
                let now = Utc::now();
                session.prune_toasts(now);
                let toast = session.raise_toast(ToastKind::Success, PROCESSING_SUCCEEDED, now);
                events.push(SessionEvent::PhaseChanged {
                    from: Phase::Processing,
                    to: Phase::Completed,
                });
                events.push(SessionEvent::Toast(toast));
                // Detach, not abort: this may be the poll task itself.
                self.poller.lock().await.take();
                info!(epoch, "processing complete");
            }
            effect.completed
        };

        for event in events {
            self.emit(event);
        }
        PollOutcome::Applied { completed }
    }

    /// Stops polling and returns to `Idle`. The server is told best effort.
    pub async fn reset(&self) {
        let from = {
            let mut session = self.session.lock().await;
            if let Some(handle) = self.poller.lock().await.take() {
                handle.abort();
            }
            let from = session.phase();
            session.reset_to_idle();
            from
        };
        if from != Phase::Idle {
            self.emit_phase(from, Phase::Idle);
        }

        match self.backend.reset().await {
            Ok(()) => debug!(from = %from, "server state reset"),
            Err(err) => warn!(
                operation = %Operation::Reset,
                error = %format!("{err:#}"),
                "server reset failed; local state was reset anyway"
            ),
        }
    }

    pub fn request_download(&self) -> Url {
        self.backend.download_url()
    }

    pub async fn download(&self) -> Result<Vec<u8>, ControllerError> {
        self.backend
            .download()
            .await
            .map_err(|err| ControllerError::Transport {
                operation: Operation::Download,
                detail: format!("{err:#}"),
            })
    }

    pub async fn toggle_logs(&self) -> bool {
        self.session.lock().await.toggle_logs()
    }

    pub async fn set_drop_highlight(&self, active: bool) {
        self.session.lock().await.set_drop_highlight(active);
    }

    async fn spawn_poller(self: &Arc<Self>, epoch: u64) {
        let mut poller = self.poller.lock().await;
        if let Some(handle) = poller.take() {
            handle.abort();
        }

        let controller: Weak<Self> = Arc::downgrade(self);
        let period = self.config.poll_interval;
        *poller = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(controller) = controller.upgrade() else {
                    break;
                };
                match controller.poll_run(epoch).await {
                    PollOutcome::Applied { completed: false } | PollOutcome::TransportFailed => {}
                    PollOutcome::Applied { completed: true }
                    | PollOutcome::Discarded
                    | PollOutcome::Inactive => break,
                }
            }
        }));
    }

    async fn notify(&self, kind: ToastKind, message: &str) {
        let now = Utc::now();
        let toast = {
            let mut session = self.session.lock().await;
            session.prune_toasts(now);
            session.raise_toast(kind, message, now)
        };
        self.emit(SessionEvent::Toast(toast));
    }

    fn emit_phase(&self, from: Phase, to: Phase) {
        debug!(from = %from, to = %to, "phase changed");
        self.emit(SessionEvent::PhaseChanged { from, to });
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

fn collaborator_failure(
    operation: Operation,
    outcome: anyhow::Result<Acknowledgement>,
) -> Option<ControllerError> {
    match outcome {
        Ok(ack) if ack.success => None,
        Ok(ack) => Some(ControllerError::Rejected {
            operation,
            message: ack
                .error_message()
                .unwrap_or(operation.generic_failure())
                .to_string(),
        }),
        Err(err) => Some(ControllerError::Transport {
            operation,
            detail: format!("{err:#}"),
        }),
    }
}

fn failure_toast(err: &ControllerError) -> String {
    let (operation, message) = match err {
        ControllerError::Rejected { operation, message } => (*operation, message.as_str()),
        ControllerError::Transport { operation, .. } => {
            return operation.generic_failure().to_string()
        }
        other => return other.display_message(),
    };
    let generic = operation.generic_failure();
    if message == generic {
        generic.to_string()
    } else {
        format!("{generic}: {message}")
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
