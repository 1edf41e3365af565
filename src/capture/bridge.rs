//! Webview capture bridge
//!
//! Screen capture, microphone access and encoding are done by the webview
//! (`getDisplayMedia`, `getUserMedia`, `MediaRecorder`). This bridge drives
//! them from Rust: each request is emitted as a `capture-bridge` event with a
//! unique id, and the webview answers through the `capture_bridge_reply`
//! command. Encoder data and lifecycle events, and tracks ending on their own,
//! come back through their own commands.

use super::traits::{CaptureConstraints, CaptureSourceProvider, MediaTrack, TrackKind, TrackRef};
use crate::config::RecorderConfig;
use crate::recorder::{
    CompositeStream, EncoderBackend, EncoderEvent, EncoderEvents, EncoderSession, EncoderSettings,
    RecordingError, RecordingResult,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tauri::{AppHandle, Emitter};
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

/// Event name the webview listens on
pub const BRIDGE_EVENT: &str = "capture-bridge";

/// What the webview is asked to do
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BridgeCommand {
    #[serde(rename_all = "camelCase")]
    RequestScreen { constraints: CaptureConstraints },
    RequestMicrophone,
    #[serde(rename_all = "camelCase")]
    StopTrack { track_id: String },
    #[serde(rename_all = "camelCase")]
    CreateEncoder {
        encoder_id: String,
        track_ids: Vec<String>,
        settings: EncoderSettings,
    },
    #[serde(rename_all = "camelCase")]
    StartEncoder { encoder_id: String, timeslice_ms: u64 },
    #[serde(rename_all = "camelCase")]
    PauseEncoder { encoder_id: String },
    #[serde(rename_all = "camelCase")]
    ResumeEncoder { encoder_id: String },
    #[serde(rename_all = "camelCase")]
    StopEncoder { encoder_id: String },
}

/// A command with the id its reply must carry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeRequest {
    pub id: String,
    #[serde(flatten)]
    pub command: BridgeCommand,
}

/// Track handed over by the webview
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDescriptor {
    pub id: String,
    pub kind: TrackKind,
    #[serde(default)]
    pub label: String,
}

/// The webview's answer to a request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum BridgeReply {
    Granted { track: TrackDescriptor },
    Denied { message: String },
    NotSupported { message: String },
    Done,
    Failed { message: String },
}

/// Encoder lifecycle as reported by the webview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeEncoderEvent {
    Start,
    Pause,
    Resume,
    Stop,
    Error,
}

/// Delivers bridge requests to the webview
pub trait BridgeTransport: Send + Sync {
    fn send(&self, request: &BridgeRequest) -> RecordingResult<()>;
}

/// Transport emitting requests as Tauri events
pub struct AppTransport {
    app: AppHandle,
}

impl AppTransport {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl BridgeTransport for AppTransport {
    fn send(&self, request: &BridgeRequest) -> RecordingResult<()> {
        self.app
            .emit(BRIDGE_EVENT, request)
            .map_err(|e| RecordingError::Bridge(format!("Failed to emit {}: {}", BRIDGE_EVENT, e)))
    }
}

struct BridgeInner {
    transport: Box<dyn BridgeTransport>,
    /// Limit for encoder create/start/pause/resume replies
    control_timeout: Duration,
    /// Limit for encoder stop replies
    stop_timeout: Duration,
    pending: Mutex<HashMap<String, oneshot::Sender<BridgeReply>>>,
    tracks: Mutex<HashMap<String, Weak<WebviewTrack>>>,
    encoders: Mutex<HashMap<String, mpsc::UnboundedSender<EncoderEvent>>>,
}

impl BridgeInner {
    fn post(&self, command: BridgeCommand) -> RecordingResult<()> {
        let request = BridgeRequest {
            id: Uuid::new_v4().to_string(),
            command,
        };
        self.transport.send(&request)
    }
}

/// Capture provider and encoder backend backed by the webview
#[derive(Clone)]
pub struct WebviewBridge {
    inner: Arc<BridgeInner>,
}

impl WebviewBridge {
    /// Encoder requests are bounded by the config's start and stop timeouts.
    /// Capture requests wait for as long as the user takes to answer.
    pub fn new(transport: impl BridgeTransport + 'static, config: &RecorderConfig) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                transport: Box::new(transport),
                control_timeout: config.start_timeout(),
                stop_timeout: config.stop_timeout(),
                pending: Mutex::new(HashMap::new()),
                tracks: Mutex::new(HashMap::new()),
                encoders: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Send a request and wait for the webview's reply, at most `limit` if set
    async fn call(&self, command: BridgeCommand, limit: Option<Duration>) -> RecordingResult<BridgeReply> {
        let id = Uuid::new_v4().to_string();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.inner.pending.lock().insert(id.clone(), reply_tx);

        let request = BridgeRequest {
            id: id.clone(),
            command,
        };
        tracing::debug!("Bridge request {}: {:?}", id, request.command);

        if let Err(e) = self.inner.transport.send(&request) {
            self.inner.pending.lock().remove(&id);
            return Err(e);
        }

        let reply = match limit {
            Some(limit) => match tokio::time::timeout(limit, reply_rx).await {
                Ok(reply) => reply,
                Err(_) => {
                    self.inner.pending.lock().remove(&id);
                    tracing::warn!("Bridge request {} got no reply within {:?}", id, limit);
                    return Err(RecordingError::Bridge(format!(
                        "request {} timed out after {}ms",
                        id,
                        limit.as_millis()
                    )));
                }
            },
            None => reply_rx.await,
        };

        reply.map_err(|_| RecordingError::Bridge(format!("request {} was dropped", id)))
    }

    /// Resolve a pending request with the webview's reply
    pub fn resolve(&self, request_id: &str, reply: BridgeReply) -> RecordingResult<()> {
        let reply_tx = self.inner.pending.lock().remove(request_id);
        match reply_tx {
            Some(reply_tx) => {
                let _ = reply_tx.send(reply);
                Ok(())
            }
            None => Err(RecordingError::Bridge(format!(
                "no pending request with id {}",
                request_id
            ))),
        }
    }

    /// Forward an encoder event. Returns `false` if the encoder is unknown.
    pub fn encoder_event(&self, encoder_id: &str, event: EncoderEvent) -> bool {
        let mut encoders = self.inner.encoders.lock();
        let Some(events_tx) = encoders.get(encoder_id) else {
            tracing::debug!("Dropping event for unknown encoder {}", encoder_id);
            return false;
        };

        let stopped = event == EncoderEvent::Stopped;
        let delivered = events_tx.send(event).is_ok();
        if stopped || !delivered {
            // Nothing follows a stop; closing the channel tells the receiver so
            encoders.remove(encoder_id);
        }
        delivered
    }

    /// Forward an encoder lifecycle event
    pub fn encoder_lifecycle(
        &self,
        encoder_id: &str,
        event: BridgeEncoderEvent,
        message: Option<String>,
    ) -> bool {
        let event = match event {
            BridgeEncoderEvent::Start => EncoderEvent::Started,
            BridgeEncoderEvent::Pause => EncoderEvent::Paused,
            BridgeEncoderEvent::Resume => EncoderEvent::Resumed,
            BridgeEncoderEvent::Stop => EncoderEvent::Stopped,
            BridgeEncoderEvent::Error => {
                EncoderEvent::Error(message.unwrap_or_else(|| "unknown encoder error".to_string()))
            }
        };
        self.encoder_event(encoder_id, event)
    }

    /// A track ended on the webview side
    pub fn track_ended(&self, track_id: &str) {
        let track = self.inner.tracks.lock().remove(track_id);
        match track.and_then(|weak| weak.upgrade()) {
            Some(track) => {
                tracing::info!("{} track {} ended", track.kind, track.id);
                track.mark_ended();
            }
            None => tracing::debug!("Ended notice for unknown track {}", track_id),
        }
    }

    /// The webview (re)loaded: every request, track and encoder it held is gone
    pub fn reset(&self) {
        let dropped = {
            let mut pending = self.inner.pending.lock();
            let count = pending.len();
            pending.clear();
            count
        };

        let tracks: Vec<_> = self.inner.tracks.lock().drain().collect();
        for (_, track) in tracks {
            if let Some(track) = track.upgrade() {
                track.mark_ended();
            }
        }

        self.inner.encoders.lock().clear();

        tracing::info!("Capture bridge reset ({} pending requests dropped)", dropped);
    }

    fn adopt(&self, descriptor: TrackDescriptor) -> Arc<WebviewTrack> {
        let (ended_tx, _) = watch::channel(false);
        let track = Arc::new(WebviewTrack {
            id: descriptor.id,
            kind: descriptor.kind,
            label: descriptor.label,
            live: AtomicBool::new(true),
            ended_tx,
            bridge: Arc::downgrade(&self.inner),
        });
        self.inner
            .tracks
            .lock()
            .insert(track.id.clone(), Arc::downgrade(&track));
        track
    }

    async fn request_track(&self, command: BridgeCommand) -> RecordingResult<TrackRef> {
        match self.call(command, None).await? {
            BridgeReply::Granted { track } => Ok(self.adopt(track)),
            BridgeReply::Denied { message } | BridgeReply::Failed { message } => {
                Err(RecordingError::PermissionDenied(message))
            }
            BridgeReply::NotSupported { message } => Err(RecordingError::NotSupported(message)),
            BridgeReply::Done => Err(RecordingError::Bridge(
                "capture request answered without a track".to_string(),
            )),
        }
    }

    async fn encoder_call(&self, command: BridgeCommand) -> RecordingResult<()> {
        let limit = match command {
            BridgeCommand::StopEncoder { .. } => self.inner.stop_timeout,
            _ => self.inner.control_timeout,
        };
        match self.call(command, Some(limit)).await? {
            BridgeReply::Done => Ok(()),
            BridgeReply::Failed { message }
            | BridgeReply::Denied { message }
            | BridgeReply::NotSupported { message } => Err(RecordingError::EncoderError(message)),
            BridgeReply::Granted { .. } => Err(RecordingError::Bridge(
                "encoder request answered with a track".to_string(),
            )),
        }
    }
}

#[async_trait]
impl CaptureSourceProvider for WebviewBridge {
    async fn request_screen_capture(&self, constraints: &CaptureConstraints) -> RecordingResult<TrackRef> {
        self.request_track(BridgeCommand::RequestScreen {
            constraints: constraints.clone(),
        })
        .await
    }

    async fn request_microphone(&self) -> RecordingResult<TrackRef> {
        self.request_track(BridgeCommand::RequestMicrophone).await
    }
}

#[async_trait]
impl EncoderBackend for WebviewBridge {
    async fn create(
        &self,
        stream: &CompositeStream,
        settings: &EncoderSettings,
    ) -> RecordingResult<Box<dyn EncoderSession>> {
        let encoder_id = Uuid::new_v4().to_string();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.inner
            .encoders
            .lock()
            .insert(encoder_id.clone(), events_tx);

        let created = self
            .encoder_call(BridgeCommand::CreateEncoder {
                encoder_id: encoder_id.clone(),
                track_ids: stream.track_ids(),
                settings: settings.clone(),
            })
            .await;

        if let Err(e) = created {
            self.inner.encoders.lock().remove(&encoder_id);
            return Err(e);
        }

        Ok(Box::new(WebviewEncoder {
            id: encoder_id,
            bridge: self.clone(),
            events: Some(events_rx),
        }))
    }
}

/// A `MediaStreamTrack` living in the webview
pub struct WebviewTrack {
    id: String,
    kind: TrackKind,
    label: String,
    live: AtomicBool,
    ended_tx: watch::Sender<bool>,
    bridge: Weak<BridgeInner>,
}

impl WebviewTrack {
    fn mark_ended(&self) {
        self.live.store(false, Ordering::SeqCst);
        self.ended_tx.send_replace(true);
    }
}

impl MediaTrack for WebviewTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        if !self.live.swap(false, Ordering::SeqCst) {
            return;
        }
        let Some(bridge) = self.bridge.upgrade() else {
            return;
        };

        bridge.tracks.lock().remove(&self.id);
        if let Err(e) = bridge.post(BridgeCommand::StopTrack {
            track_id: self.id.clone(),
        }) {
            tracing::warn!("Failed to stop track {}: {}", self.id, e);
        }
    }

    fn subscribe_ended(&self) -> watch::Receiver<bool> {
        self.ended_tx.subscribe()
    }
}

/// A `MediaRecorder` living in the webview
pub struct WebviewEncoder {
    id: String,
    bridge: WebviewBridge,
    events: Option<EncoderEvents>,
}

#[async_trait]
impl EncoderSession for WebviewEncoder {
    fn id(&self) -> &str {
        &self.id
    }

    fn take_events(&mut self) -> Option<EncoderEvents> {
        self.events.take()
    }

    async fn start(&mut self, timeslice: Duration) -> RecordingResult<()> {
        self.bridge
            .encoder_call(BridgeCommand::StartEncoder {
                encoder_id: self.id.clone(),
                timeslice_ms: timeslice.as_millis() as u64,
            })
            .await
    }

    async fn pause(&mut self) -> RecordingResult<()> {
        self.bridge
            .encoder_call(BridgeCommand::PauseEncoder {
                encoder_id: self.id.clone(),
            })
            .await
    }

    async fn resume(&mut self) -> RecordingResult<()> {
        self.bridge
            .encoder_call(BridgeCommand::ResumeEncoder {
                encoder_id: self.id.clone(),
            })
            .await
    }

    async fn stop(&mut self) -> RecordingResult<()> {
        self.bridge
            .encoder_call(BridgeCommand::StopEncoder {
                encoder_id: self.id.clone(),
            })
            .await
    }
}

impl Drop for WebviewEncoder {
    fn drop(&mut self) {
        self.bridge.inner.encoders.lock().remove(&self.id);
    }
}
