//! Session driver
//!
//! The controller lives inside one task. Commands from the UI and events from
//! the platform are handled there strictly one at a time, in arrival order.
//! While an operation is in flight (a permission prompt, an encoder rebuild)
//! it is authoritative: other commands are answered with a `busy` snapshot
//! and otherwise ignored, and shutdown waits until the operation resolves.

use super::controller::SessionController;
use super::error::{RecordingError, RecordingResult};
use super::events::SessionEvent;
use super::state::{SessionSnapshot, SessionState};
use crate::persistence::SaveOutcome;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Operations the UI can request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOp {
    Start,
    Stop,
    Pause,
    Resume,
    EnableAudio,
    DisableAudio,
    ToggleAudio,
    Save,
    Snapshot,
    Shutdown,
}

/// Answer to a command
#[derive(Debug, Clone)]
pub struct CommandReply {
    pub snapshot: SessionSnapshot,
    pub saved: Option<SaveOutcome>,
}

/// A command together with the channel its answer goes to
pub struct SessionCommand {
    pub op: SessionOp,
    pub response_tx: oneshot::Sender<RecordingResult<CommandReply>>,
}

/// Cloneable handle used by the command layer
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub async fn start(&self) -> RecordingResult<SessionSnapshot> {
        self.snapshot_of(SessionOp::Start).await
    }

    pub async fn stop(&self) -> RecordingResult<SessionSnapshot> {
        self.snapshot_of(SessionOp::Stop).await
    }

    pub async fn pause(&self) -> RecordingResult<SessionSnapshot> {
        self.snapshot_of(SessionOp::Pause).await
    }

    pub async fn resume(&self) -> RecordingResult<SessionSnapshot> {
        self.snapshot_of(SessionOp::Resume).await
    }

    pub async fn enable_audio(&self) -> RecordingResult<SessionSnapshot> {
        self.snapshot_of(SessionOp::EnableAudio).await
    }

    pub async fn disable_audio(&self) -> RecordingResult<SessionSnapshot> {
        self.snapshot_of(SessionOp::DisableAudio).await
    }

    pub async fn toggle_audio(&self) -> RecordingResult<SessionSnapshot> {
        self.snapshot_of(SessionOp::ToggleAudio).await
    }

    pub async fn snapshot(&self) -> RecordingResult<SessionSnapshot> {
        self.snapshot_of(SessionOp::Snapshot).await
    }

    /// Save the finished recording through the configured sink
    pub async fn save(&self) -> RecordingResult<SaveOutcome> {
        let reply = self.request(SessionOp::Save).await?;
        match reply.saved {
            Some(outcome) => Ok(outcome),
            None => Err(RecordingError::InvalidState(
                "another recording operation is in progress".to_string(),
            )),
        }
    }

    /// Stop any recording, release every track and end the driver task
    pub async fn shutdown(&self) {
        if let Err(e) = self.request(SessionOp::Shutdown).await {
            tracing::debug!("Session driver already gone: {}", e);
        }
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    async fn snapshot_of(&self, op: SessionOp) -> RecordingResult<SessionSnapshot> {
        self.request(op).await.map(|reply| reply.snapshot)
    }

    async fn request(&self, op: SessionOp) -> RecordingResult<CommandReply> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(SessionCommand { op, response_tx })
            .await
            .map_err(|_| RecordingError::InvalidState("recording session is not running".to_string()))?;

        response_rx.await.map_err(|_| {
            RecordingError::InvalidState("recording session dropped the request".to_string())
        })?
    }
}

/// Owns the controller and processes its inputs
pub struct SessionDriver {
    controller: SessionController,
    command_rx: mpsc::Receiver<SessionCommand>,
}

impl SessionDriver {
    pub fn new(controller: SessionController) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let handle = SessionHandle {
            command_tx,
            event_tx: controller.event_sender(),
        };
        (
            Self {
                controller,
                command_rx,
            },
            handle,
        )
    }

    /// Run the driver on the Tauri async runtime
    pub fn spawn(controller: SessionController) -> SessionHandle {
        let (driver, handle) = Self::new(controller);
        tauri::async_runtime::spawn(driver.run());
        handle
    }

    pub async fn run(mut self) {
        tracing::info!("Recording session driver started");

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(SessionCommand { op: SessionOp::Shutdown, response_tx }) => {
                        self.shutdown(response_tx).await;
                        break;
                    }
                    Some(command) => {
                        if self.dispatch(command).await {
                            break;
                        }
                    }
                    None => {
                        self.controller.dispose().await;
                        break;
                    }
                },
                event = self.controller.next_platform_event() => {
                    self.controller.handle_platform_event(event).await;
                }
            }
        }

        tracing::info!("Recording session driver stopped");
    }

    /// Run one command to completion. Returns `true` when a shutdown arrived
    /// meanwhile and has been carried out.
    async fn dispatch(&mut self, command: SessionCommand) -> bool {
        let SessionCommand { op, response_tx } = command;

        // Whatever the platform reported before this command goes first
        self.controller.process_ready_events().await;

        if op == SessionOp::Snapshot {
            let _ = response_tx.send(Ok(self.reply(None)));
            return false;
        }

        let mut busy = self.controller.snapshot();
        busy.busy = true;
        if op == SessionOp::Start
            && matches!(busy.state, SessionState::Idle | SessionState::Stopped)
        {
            busy.state = SessionState::Requesting;
        }

        let mut deferred_shutdown = None;
        let result = {
            let Self {
                controller,
                command_rx,
            } = self;
            let operation = execute(controller, op);
            tokio::pin!(operation);

            loop {
                tokio::select! {
                    result = &mut operation => break result,
                    Some(incoming) = command_rx.recv() => match incoming.op {
                        SessionOp::Shutdown => deferred_shutdown = Some(incoming.response_tx),
                        other => {
                            if other != SessionOp::Snapshot {
                                tracing::debug!("Ignoring {:?} while {:?} is in flight", other, op);
                            }
                            let _ = incoming.response_tx.send(Ok(CommandReply {
                                snapshot: busy.clone(),
                                saved: None,
                            }));
                        }
                    },
                }
            }
        };

        let reply = result.map(|saved| self.reply(saved));
        let _ = response_tx.send(reply);

        match deferred_shutdown {
            Some(shutdown_tx) => {
                self.shutdown(shutdown_tx).await;
                true
            }
            None => false,
        }
    }

    async fn shutdown(&mut self, response_tx: oneshot::Sender<RecordingResult<CommandReply>>) {
        self.controller.dispose().await;
        let _ = response_tx.send(Ok(self.reply(None)));
    }

    fn reply(&self, saved: Option<SaveOutcome>) -> CommandReply {
        CommandReply {
            snapshot: self.controller.snapshot(),
            saved,
        }
    }
}

async fn execute(
    controller: &mut SessionController,
    op: SessionOp,
) -> RecordingResult<Option<SaveOutcome>> {
    match op {
        SessionOp::Start => controller.start().await.map(|_| None),
        SessionOp::Stop => controller.stop().await.map(|_| None),
        SessionOp::Pause => controller.pause().await.map(|_| None),
        SessionOp::Resume => controller.resume().await.map(|_| None),
        SessionOp::EnableAudio => controller.enable_audio().await.map(|_| None),
        SessionOp::DisableAudio => controller.disable_audio().await.map(|_| None),
        SessionOp::ToggleAudio => controller.toggle_audio().await.map(|_| None),
        SessionOp::Save => controller.save().await.map(Some),
        SessionOp::Snapshot | SessionOp::Shutdown => Ok(None),
    }
}
