//! Test doubles for the platform seams
//!
//! `MockPlatform` stands in for the webview: it hands out `MockTrack`s and
//! builds `MockEncoder`s whose events the test drives by hand.

use crate::capture::{CaptureConstraints, CaptureSourceProvider, MediaTrack, TrackKind, TrackRef};
use crate::config::RecorderConfig;
use crate::persistence::{PersistenceSink, RecordingPayload, SaveOutcome};
use crate::recorder::{
    CompositeStream, EncoderBackend, EncoderEvent, EncoderEvents, EncoderSession, EncoderSettings,
    RecordingError, RecordingResult, SessionController,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use uuid::Uuid;

/// In-memory media track
pub struct MockTrack {
    id: String,
    kind: TrackKind,
    label: String,
    live: AtomicBool,
    stops: AtomicUsize,
    ended_tx: watch::Sender<bool>,
}

impl MockTrack {
    fn new(kind: TrackKind, label: &str) -> Arc<Self> {
        let (ended_tx, _) = watch::channel(false);
        Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            kind,
            label: label.to_string(),
            live: AtomicBool::new(true),
            stops: AtomicUsize::new(0),
            ended_tx,
        })
    }

    pub fn video(label: &str) -> Arc<Self> {
        Self::new(TrackKind::Video, label)
    }

    pub fn audio(label: &str) -> Arc<Self> {
        Self::new(TrackKind::Audio, label)
    }

    /// The platform ended the track (e.g. sharing revoked from the OS)
    pub fn end(&self) {
        self.live.store(false, Ordering::SeqCst);
        self.ended_tx.send_replace(true);
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl MediaTrack for MockTrack {
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
        self.live.store(false, Ordering::SeqCst);
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn subscribe_ended(&self) -> watch::Receiver<bool> {
        self.ended_tx.subscribe()
    }
}

/// State shared between a mock encoder and the test
struct EncoderRecord {
    id: String,
    track_ids: Vec<String>,
    settings: EncoderSettings,
    events_tx: mpsc::UnboundedSender<EncoderEvent>,
    flush: Vec<Vec<u8>>,
    stop_calls: usize,
}

#[derive(Default)]
struct PlatformState {
    deny_screen: bool,
    deny_microphone: bool,
    fail_next_create: bool,
    stall_next_start: bool,
    screen: Option<Arc<MockTrack>>,
    microphone: Option<Arc<MockTrack>>,
    encoders: Vec<Arc<Mutex<EncoderRecord>>>,
}

/// Capture provider and encoder backend driven by the test
#[derive(Default)]
pub struct MockPlatform {
    state: Mutex<PlatformState>,
    screen_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn deny_screen(&self, deny: bool) {
        self.state.lock().deny_screen = deny;
    }

    pub fn deny_microphone(&self, deny: bool) {
        self.state.lock().deny_microphone = deny;
    }

    /// Hold screen requests until the returned gate is notified,
    /// like a share picker the user has not answered yet
    pub fn gate_screen_requests(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.screen_gate.lock() = Some(gate.clone());
        gate
    }

    /// Make the next `create` fail
    pub fn fail_next_create(&self) {
        self.state.lock().fail_next_create = true;
    }

    /// Make the next encoder never confirm start
    pub fn stall_next_start(&self) {
        self.state.lock().stall_next_start = true;
    }

    /// Last screen track handed out
    pub fn screen_track(&self) -> Arc<MockTrack> {
        self.state.lock().screen.clone().expect("no screen track granted")
    }

    /// Last microphone track handed out
    pub fn microphone_track(&self) -> Arc<MockTrack> {
        self.state
            .lock()
            .microphone
            .clone()
            .expect("no microphone track granted")
    }

    pub fn encoder_count(&self) -> usize {
        self.state.lock().encoders.len()
    }

    pub fn encoder_id(&self, index: usize) -> String {
        self.record(index).lock().id.clone()
    }

    pub fn encoder_tracks(&self, index: usize) -> Vec<String> {
        self.record(index).lock().track_ids.clone()
    }

    pub fn encoder_settings(&self, index: usize) -> EncoderSettings {
        self.record(index).lock().settings.clone()
    }

    pub fn encoder_stop_calls(&self, index: usize) -> usize {
        self.record(index).lock().stop_calls
    }

    /// The newest encoder emits a chunk
    pub fn emit_chunk(&self, data: &[u8]) {
        self.emit(EncoderEvent::DataAvailable(data.to_vec()));
    }

    /// The newest encoder will emit this chunk when stopped
    pub fn queue_flush(&self, data: &[u8]) {
        self.latest().lock().flush.push(data.to_vec());
    }

    /// The newest encoder stops on its own
    pub fn stop_encoder(&self) {
        self.emit(EncoderEvent::Stopped);
    }

    /// The newest encoder reports an error
    pub fn encoder_error(&self, message: &str) {
        self.emit(EncoderEvent::Error(message.to_string()));
    }

    fn emit(&self, event: EncoderEvent) {
        let _ = self.latest().lock().events_tx.send(event);
    }

    fn record(&self, index: usize) -> Arc<Mutex<EncoderRecord>> {
        self.state.lock().encoders[index].clone()
    }

    fn latest(&self) -> Arc<Mutex<EncoderRecord>> {
        self.state
            .lock()
            .encoders
            .last()
            .cloned()
            .expect("no encoder created")
    }
}

#[async_trait]
impl CaptureSourceProvider for MockPlatform {
    async fn request_screen_capture(&self, _constraints: &CaptureConstraints) -> RecordingResult<TrackRef> {
        let gate = self.screen_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.state.lock();
        if state.deny_screen {
            return Err(RecordingError::PermissionDenied("NotAllowedError".to_string()));
        }
        let track = MockTrack::video("Entire screen");
        state.screen = Some(track.clone());
        Ok(track)
    }

    async fn request_microphone(&self) -> RecordingResult<TrackRef> {
        let mut state = self.state.lock();
        if state.deny_microphone {
            return Err(RecordingError::PermissionDenied("NotAllowedError".to_string()));
        }
        let track = MockTrack::audio("Built-in Microphone");
        state.microphone = Some(track.clone());
        Ok(track)
    }
}

#[async_trait]
impl EncoderBackend for MockPlatform {
    async fn create(
        &self,
        stream: &CompositeStream,
        settings: &EncoderSettings,
    ) -> RecordingResult<Box<dyn EncoderSession>> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_create) {
            return Err(RecordingError::EncoderError("NotSupportedError".to_string()));
        }

        let id = format!("encoder-{}", state.encoders.len());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let record = Arc::new(Mutex::new(EncoderRecord {
            id: id.clone(),
            track_ids: stream.track_ids(),
            settings: settings.clone(),
            events_tx,
            flush: Vec::new(),
            stop_calls: 0,
        }));
        state.encoders.push(record.clone());

        Ok(Box::new(MockEncoder {
            id,
            record,
            events: Some(events_rx),
            stall_start: std::mem::take(&mut state.stall_next_start),
        }))
    }
}

struct MockEncoder {
    id: String,
    record: Arc<Mutex<EncoderRecord>>,
    events: Option<EncoderEvents>,
    stall_start: bool,
}

impl MockEncoder {
    fn send(&self, event: EncoderEvent) {
        let _ = self.record.lock().events_tx.send(event);
    }
}

#[async_trait]
impl EncoderSession for MockEncoder {
    fn id(&self) -> &str {
        &self.id
    }

    fn take_events(&mut self) -> Option<EncoderEvents> {
        self.events.take()
    }

    async fn start(&mut self, _timeslice: Duration) -> RecordingResult<()> {
        if !self.stall_start {
            self.send(EncoderEvent::Started);
        }
        Ok(())
    }

    async fn pause(&mut self) -> RecordingResult<()> {
        self.send(EncoderEvent::Paused);
        Ok(())
    }

    async fn resume(&mut self) -> RecordingResult<()> {
        self.send(EncoderEvent::Resumed);
        Ok(())
    }

    async fn stop(&mut self) -> RecordingResult<()> {
        let mut record = self.record.lock();
        record.stop_calls += 1;
        for data in std::mem::take(&mut record.flush) {
            let _ = record.events_tx.send(EncoderEvent::DataAvailable(data));
        }
        let _ = record.events_tx.send(EncoderEvent::Stopped);
        Ok(())
    }
}

/// Sink recording what it was asked to persist
#[derive(Default)]
pub struct MockSink {
    saved: Mutex<Vec<RecordingPayload>>,
    calls: AtomicUsize,
    fail_next: AtomicBool,
}

impl MockSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next persist fail as if the user cancelled the dialog
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn saved(&self) -> Vec<RecordingPayload> {
        self.saved.lock().clone()
    }
}

#[async_trait]
impl PersistenceSink for MockSink {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn persist(&self, payload: &RecordingPayload) -> RecordingResult<SaveOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(RecordingError::PersistenceFailure(
                "Save operation cancelled".to_string(),
            ));
        }

        self.saved.lock().push(payload.clone());
        Ok(SaveOutcome {
            file_path: PathBuf::from("/recordings").join(&payload.file_name),
        })
    }
}

/// Controller wired to mocks with the default configuration
pub fn controller(platform: &Arc<MockPlatform>, sink: &Arc<MockSink>) -> SessionController {
    controller_with(platform, sink, RecorderConfig::default())
}

pub fn controller_with(
    platform: &Arc<MockPlatform>,
    sink: &Arc<MockSink>,
    config: RecorderConfig,
) -> SessionController {
    SessionController::new(platform.clone(), platform.clone(), sink.clone(), config)
}
