//! Recording session controller
//!
//! Owns the composite stream, the live encoder and the segment buffer of the
//! current recording, and moves the session through its state machine:
//!
//! ```text
//! Idle|Stopped --start--> Requesting --granted--> Active <--pause/resume--> Paused
//!                              |                     |                        |
//!                           denied                   +--------stop------------+--> Stopped
//!                              v
//!                             Idle
//! ```
//!
//! Calls that are not valid in the current state are no-ops. Track-set changes
//! while an encoder is live go through a rebuild: stop the old encoder and
//! collect its final data, change the tracks, then build and start a new
//! encoder that keeps appending to the same segment sequence.

use super::compositor::CompositeStream;
use super::encoder::{EncoderBackend, EncoderEvent, EncoderEvents, EncoderSession};
use super::error::{RecordingError, RecordingResult};
use super::events::{Notification, SessionEvent};
use super::segments::SegmentBuffer;
use super::state::{CaptureTimeline, SessionSnapshot, SessionState};
use crate::capture::{CaptureSourceProvider, TrackKind, TrackRef};
use crate::config::RecorderConfig;
use crate::persistence::{PersistenceSink, RecordingPayload, SaveOutcome};
use std::sync::Arc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, watch};

/// Something the platform did that the controller has to react to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// Event from the live encoder
    Encoder(EncoderEvent),
    /// The live encoder's event stream closed without `Stopped`
    EncoderClosed,
    /// The screen video track ended on its own
    VideoEnded,
}

/// Track-set change applied during a rebuild
enum TrackChange {
    Add(TrackRef),
    Remove(String),
}

/// An encoder together with its event subscription
struct LiveEncoder {
    id: String,
    session: Box<dyn EncoderSession>,
    events: EncoderEvents,
    /// Data that arrived before the encoder confirmed start
    early: Vec<Vec<u8>>,
}

impl LiveEncoder {
    async fn await_started(&mut self) -> RecordingResult<()> {
        loop {
            match self.events.recv().await {
                Some(EncoderEvent::Started) => return Ok(()),
                Some(EncoderEvent::DataAvailable(data)) => self.early.push(data),
                Some(EncoderEvent::Error(message)) => {
                    return Err(RecordingError::EncoderError(message))
                }
                Some(EncoderEvent::Stopped) | None => {
                    return Err(RecordingError::EncoderError(
                        "encoder stopped before it started".to_string(),
                    ))
                }
                Some(other) => {
                    tracing::debug!("Encoder {}: ignoring {:?} before start", self.id, other)
                }
            }
        }
    }
}

/// The single state machine behind the recorder UI
pub struct SessionController {
    state: SessionState,
    provider: Arc<dyn CaptureSourceProvider>,
    backend: Arc<dyn EncoderBackend>,
    sink: Arc<dyn PersistenceSink>,
    config: RecorderConfig,
    stream: CompositeStream,
    encoder: Option<LiveEncoder>,
    video_ended: Option<watch::Receiver<bool>>,
    segments: SegmentBuffer,
    timeline: CaptureTimeline,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(
        provider: Arc<dyn CaptureSourceProvider>,
        backend: Arc<dyn EncoderBackend>,
        sink: Arc<dyn PersistenceSink>,
        config: RecorderConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            state: SessionState::Idle,
            provider,
            backend,
            sink,
            config,
            stream: CompositeStream::new(),
            encoder: None,
            video_ended: None,
            segments: SegmentBuffer::new(),
            timeline: CaptureTimeline::default(),
            event_tx,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn segments(&self) -> &SegmentBuffer {
        &self.segments
    }

    pub fn stream(&self) -> &CompositeStream {
        &self.stream
    }

    pub fn is_audio_enabled(&self) -> bool {
        self.stream.has_audio()
    }

    pub fn sink_name(&self) -> &'static str {
        self.sink.name()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Sender side of the event channel, for forwarding outside the driver
    pub fn event_sender(&self) -> broadcast::Sender<SessionEvent> {
        self.event_tx.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            audio_enabled: self.stream.has_audio(),
            has_recording: !self.segments.is_empty(),
            segment_count: self.segments.len(),
            recorded_bytes: self.segments.total_bytes(),
            duration_ms: self.timeline.duration_ms(),
            tracks: self.stream.track_infos(),
            busy: false,
        }
    }

    /// Start a new recording
    ///
    /// Valid from `Idle` and `Stopped`. The previous recording's segments are
    /// discarded once the new encoder is running; a denied or failed start
    /// leaves them in place.
    pub async fn start(&mut self) -> RecordingResult<()> {
        if !matches!(self.state, SessionState::Idle | SessionState::Stopped) {
            tracing::debug!("start() ignored while {}", self.state);
            return Ok(());
        }

        tracing::info!("Requesting screen capture");
        self.set_state(SessionState::Requesting);

        let video = match self
            .provider
            .request_screen_capture(&self.config.capture)
            .await
        {
            Ok(track) => track,
            Err(e) => {
                self.set_state(SessionState::Idle);
                let notification = match &e {
                    RecordingError::PermissionDenied(_) => Notification::error(
                        "Permission Denied",
                        "Screen recording permission was denied.",
                    ),
                    other => Notification::for_error(other),
                };
                return Err(self.fail_with(notification, e));
            }
        };

        if video.kind() != TrackKind::Video {
            video.stop();
            self.set_state(SessionState::Idle);
            return Err(self.fail(RecordingError::NotSupported(
                "capture source returned a non-video track".to_string(),
            )));
        }

        if let Err(e) = self.stream.add_track(video.clone()) {
            video.stop();
            self.set_state(SessionState::Idle);
            return Err(self.fail(e));
        }

        match self.open_encoder().await {
            Ok(mut encoder) => {
                self.segments.clear();
                self.timeline.reset();
                self.absorb_early(&mut encoder);
                tracing::info!("Recording started with encoder {}", encoder.id);
                self.encoder = Some(encoder);
                self.video_ended = Some(video.subscribe_ended());
                self.timeline.open_span();
                self.set_state(SessionState::Active);
                self.notify(Notification::info(
                    "Recording Started",
                    "Your screen is being recorded.",
                ));
                Ok(())
            }
            Err(e) => {
                if let Some(track) = self.stream.remove_track(video.id()) {
                    track.stop();
                }
                self.set_state(SessionState::Idle);
                Err(self.fail(e))
            }
        }
    }

    /// Stop the recording, keeping its segments for saving
    pub async fn stop(&mut self) -> RecordingResult<()> {
        if !self.state.is_recording() {
            tracing::debug!("stop() ignored while {}", self.state);
            return Ok(());
        }

        tracing::info!("Stopping recording");
        self.finish_session(false).await;
        Ok(())
    }

    pub async fn pause(&mut self) -> RecordingResult<()> {
        if self.state != SessionState::Active {
            tracing::debug!("pause() ignored while {}", self.state);
            return Ok(());
        }
        let Some(encoder) = self.encoder.as_mut() else {
            return Ok(());
        };

        if let Err(e) = encoder.session.pause().await {
            return Err(self.fail(e));
        }

        tracing::info!("Recording paused");
        self.timeline.close_span();
        self.set_state(SessionState::Paused);
        self.notify(Notification::info(
            "Recording Paused",
            "You can resume recording at any time.",
        ));
        Ok(())
    }

    pub async fn resume(&mut self) -> RecordingResult<()> {
        if self.state != SessionState::Paused {
            tracing::debug!("resume() ignored while {}", self.state);
            return Ok(());
        }
        let Some(encoder) = self.encoder.as_mut() else {
            return Ok(());
        };

        if let Err(e) = encoder.session.resume().await {
            return Err(self.fail(e));
        }

        tracing::info!("Recording resumed");
        self.timeline.open_span();
        self.set_state(SessionState::Active);
        self.notify(Notification::info(
            "Recording Resumed",
            "Your recording is now continuing.",
        ));
        Ok(())
    }

    /// Attach the microphone
    ///
    /// While recording this rebuilds the encoder and leaves the session
    /// `Active`. Otherwise the track waits in the stream for the next start.
    pub async fn enable_audio(&mut self) -> RecordingResult<()> {
        if self.stream.has_audio() {
            tracing::debug!("enable_audio() ignored, microphone already attached");
            return Ok(());
        }
        if self.state == SessionState::Requesting {
            tracing::debug!("enable_audio() ignored while requesting screen capture");
            return Ok(());
        }

        let mic = match self.provider.request_microphone().await {
            Ok(track) => track,
            Err(e) => {
                let notification = Notification::error(
                    "Microphone Access Denied",
                    "Unable to access your microphone.",
                );
                return Err(self.fail_with(notification, e));
            }
        };

        if mic.kind() != TrackKind::Audio {
            mic.stop();
            return Err(self.fail(RecordingError::NotSupported(
                "microphone source returned a non-audio track".to_string(),
            )));
        }

        if self.state.is_recording() {
            self.rebuild(TrackChange::Add(mic), SessionState::Active).await?;
        } else if let Err(e) = self.stream.add_track(mic.clone()) {
            mic.stop();
            return Err(self.fail(e));
        }

        tracing::info!("Microphone enabled");
        self.publish_snapshot();
        self.notify(Notification::info(
            "Microphone Enabled",
            "Audio recording has been turned on.",
        ));
        Ok(())
    }

    /// Detach and release the microphone
    pub async fn disable_audio(&mut self) -> RecordingResult<()> {
        let Some(mic_id) = self.stream.audio().map(|t| t.id().to_string()) else {
            tracing::debug!("disable_audio() ignored, no microphone attached");
            return Ok(());
        };
        if self.state == SessionState::Requesting {
            tracing::debug!("disable_audio() ignored while requesting screen capture");
            return Ok(());
        }

        if self.state.is_recording() {
            let target = self.state;
            self.rebuild(TrackChange::Remove(mic_id), target).await?;
        } else if let Some(track) = self.stream.remove_track(&mic_id) {
            track.stop();
        }

        tracing::info!("Microphone disabled");
        self.publish_snapshot();
        self.notify(Notification::info(
            "Microphone Disabled",
            "Audio recording has been turned off.",
        ));
        Ok(())
    }

    pub async fn toggle_audio(&mut self) -> RecordingResult<()> {
        if self.stream.has_audio() {
            self.disable_audio().await
        } else {
            self.enable_audio().await
        }
    }

    /// Hand the recording to the persistence sink
    ///
    /// Segments are only cleared once the sink confirms success, so a failed
    /// or cancelled save can be retried.
    pub async fn save(&mut self) -> RecordingResult<SaveOutcome> {
        if self.state.is_recording() || self.state == SessionState::Requesting {
            return Err(self.fail(RecordingError::InvalidState(
                "stop the recording before saving".to_string(),
            )));
        }
        if self.segments.is_empty() {
            return Err(self.fail(RecordingError::EmptyRecording));
        }

        let payload = RecordingPayload::new(self.segments.concat());
        tracing::info!(
            "Saving {} segments ({} bytes of {}) through the {} sink",
            self.segments.len(),
            payload.data.len(),
            payload.mime_type,
            self.sink.name()
        );

        match self.sink.persist(&payload).await {
            Ok(outcome) => {
                self.segments.clear();
                self.timeline.reset();
                self.publish_snapshot();
                self.notify(Notification::info(
                    "Recording Saved",
                    format!("Your recording has been saved to {}", outcome.file_path.display()),
                ));
                Ok(outcome)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Wait for the next platform event
    ///
    /// Encoder events win over track-ended so data queued before the track
    /// ended is handled first. Cancel safe.
    pub async fn next_platform_event(&mut self) -> PlatformEvent {
        let Self {
            encoder,
            video_ended,
            ..
        } = self;

        let encoder_event = async {
            match encoder.as_mut() {
                Some(encoder) => match encoder.events.recv().await {
                    Some(event) => PlatformEvent::Encoder(event),
                    None => PlatformEvent::EncoderClosed,
                },
                None => std::future::pending().await,
            }
        };

        let track_ended = async {
            match video_ended.as_mut() {
                Some(ended) => {
                    let _ = ended.wait_for(|ended| *ended).await;
                    PlatformEvent::VideoEnded
                }
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            event = encoder_event => event,
            event = track_ended => event,
        }
    }

    /// Handle every platform event that is already queued
    pub async fn process_ready_events(&mut self) {
        while let Some(event) = self.try_next_platform_event() {
            self.handle_platform_event(event).await;
        }
    }

    fn try_next_platform_event(&mut self) -> Option<PlatformEvent> {
        if let Some(encoder) = self.encoder.as_mut() {
            match encoder.events.try_recv() {
                Ok(event) => return Some(PlatformEvent::Encoder(event)),
                Err(TryRecvError::Disconnected) => return Some(PlatformEvent::EncoderClosed),
                Err(TryRecvError::Empty) => {}
            }
        }

        if let Some(ended) = self.video_ended.as_ref() {
            if *ended.borrow() || ended.has_changed().is_err() {
                return Some(PlatformEvent::VideoEnded);
            }
        }

        None
    }

    pub async fn handle_platform_event(&mut self, event: PlatformEvent) {
        match event {
            PlatformEvent::Encoder(EncoderEvent::DataAvailable(data)) => {
                let Some(encoder_id) = self.encoder.as_ref().map(|e| e.id.clone()) else {
                    return;
                };
                self.append_segment(&encoder_id, data);
            }
            PlatformEvent::Encoder(EncoderEvent::Error(message)) => {
                tracing::error!("Encoder reported an error: {}", message);
                self.notify(Notification::error(
                    "Recording Error",
                    "There was an error with the recording process.",
                ));
            }
            PlatformEvent::Encoder(EncoderEvent::Stopped) | PlatformEvent::EncoderClosed => {
                if self.state.is_recording() {
                    tracing::warn!("Encoder stopped on its own, finishing the recording");
                    self.finish_session(true).await;
                } else {
                    self.encoder = None;
                }
            }
            PlatformEvent::Encoder(other) => {
                tracing::debug!("Encoder event: {:?}", other);
            }
            PlatformEvent::VideoEnded => {
                if self.state.is_recording() {
                    tracing::info!("Screen share ended by the platform");
                    self.finish_session(false).await;
                } else {
                    self.video_ended = None;
                }
            }
        }
    }

    /// Stop any recording and release every track
    pub async fn dispose(&mut self) {
        if self.state.is_recording() {
            self.finish_session(false).await;
        }
        self.release_tracks();
        tracing::info!("Session controller disposed");
    }

    async fn open_encoder(&mut self) -> RecordingResult<LiveEncoder> {
        let settings = self.config.encoder.settings_for(self.stream.has_audio());
        let mut session = self.backend.create(&self.stream, &settings).await?;
        let events = session.take_events().ok_or_else(|| {
            RecordingError::EncoderError("encoder event stream already taken".to_string())
        })?;

        let mut encoder = LiveEncoder {
            id: session.id().to_string(),
            session,
            events,
            early: Vec::new(),
        };

        tracing::debug!(
            "Starting encoder {} on tracks {:?}",
            encoder.id,
            self.stream.track_ids()
        );
        encoder.session.start(self.config.encoder.timeslice()).await?;

        let timeout = self.config.start_timeout();
        match tokio::time::timeout(timeout, encoder.await_started()).await {
            Ok(Ok(())) => Ok(encoder),
            Ok(Err(e)) => {
                let _ = encoder.session.stop().await;
                Err(e)
            }
            Err(_) => {
                let _ = encoder.session.stop().await;
                Err(RecordingError::EncoderError(format!(
                    "encoder did not start within {}ms",
                    timeout.as_millis()
                )))
            }
        }
    }

    /// Stop an encoder and collect everything it still emits
    async fn close_encoder(&mut self, mut encoder: LiveEncoder, already_stopped: bool) {
        let id = encoder.id.clone();

        let stop_result = if already_stopped {
            Ok(())
        } else {
            encoder.session.stop().await
        };

        if let Err(e) = stop_result {
            tracing::warn!("Encoder {} failed to stop: {}", id, e);
            self.notify(Notification::for_error(&e));
            self.drain_ready(&mut encoder);
            return;
        }

        if already_stopped {
            self.drain_ready(&mut encoder);
            return;
        }

        let deadline = tokio::time::Instant::now() + self.config.stop_timeout();
        loop {
            match tokio::time::timeout_at(deadline, encoder.events.recv()).await {
                Ok(Some(EncoderEvent::DataAvailable(data))) => self.append_segment(&id, data),
                Ok(Some(EncoderEvent::Stopped)) | Ok(None) => break,
                Ok(Some(EncoderEvent::Error(message))) => {
                    tracing::error!("Encoder {} reported an error while stopping: {}", id, message);
                    self.notify(Notification::for_error(&RecordingError::EncoderError(message)));
                }
                Ok(Some(other)) => tracing::debug!("Encoder {}: {:?} while stopping", id, other),
                Err(_) => {
                    tracing::warn!(
                        "Encoder {} did not confirm stop within {:?}",
                        id,
                        self.config.stop_timeout()
                    );
                    break;
                }
            }
        }

        tracing::debug!("Encoder {} closed", id);
    }

    fn drain_ready(&mut self, encoder: &mut LiveEncoder) {
        while let Ok(event) = encoder.events.try_recv() {
            if let EncoderEvent::DataAvailable(data) = event {
                self.append_segment(&encoder.id, data);
            }
        }
    }

    /// Stop the old encoder, change the tracks, start a new encoder
    async fn rebuild(&mut self, change: TrackChange, target: SessionState) -> RecordingResult<()> {
        let was = self.state;
        tracing::info!("Rebuilding encoder for the new track set");

        if let Some(encoder) = self.encoder.take() {
            self.close_encoder(encoder, false).await;
        }

        let applied = match change {
            TrackChange::Add(track) => self.stream.add_track(track.clone()).map_err(|e| {
                track.stop();
                e
            }),
            TrackChange::Remove(track_id) => {
                if let Some(track) = self.stream.remove_track(&track_id) {
                    track.stop();
                }
                Ok(())
            }
        };

        let opened = match applied {
            Ok(()) => self.open_encoder().await,
            Err(e) => Err(e),
        };

        let mut encoder = match opened {
            Ok(encoder) => encoder,
            Err(e) => {
                tracing::error!("Encoder rebuild failed, finishing the recording: {}", e);
                self.timeline.close_span();
                self.release_tracks();
                self.set_state(SessionState::Stopped);
                return Err(self.fail(e));
            }
        };
        self.absorb_early(&mut encoder);

        let mut target = target;
        if target == SessionState::Paused {
            if let Err(e) = encoder.session.pause().await {
                tracing::warn!("Rebuilt encoder could not pause: {}", e);
                self.notify(Notification::for_error(&e));
                target = SessionState::Active;
            }
        }

        tracing::info!("Encoder rebuilt as {}", encoder.id);
        self.encoder = Some(encoder);

        if was == SessionState::Paused && target == SessionState::Active {
            self.timeline.open_span();
        }
        self.set_state(target);
        Ok(())
    }

    async fn finish_session(&mut self, encoder_stopped: bool) {
        self.timeline.close_span();
        if let Some(encoder) = self.encoder.take() {
            self.close_encoder(encoder, encoder_stopped).await;
        }
        self.release_tracks();
        self.set_state(SessionState::Stopped);
        tracing::info!(
            "Recording stopped: {} segments, {} bytes",
            self.segments.len(),
            self.segments.total_bytes()
        );
        self.notify(Notification::info(
            "Recording Stopped",
            "Your recording has been successfully captured.",
        ));
    }

    fn release_tracks(&mut self) {
        for track in self.stream.take_all() {
            tracing::debug!("Releasing {} track {}", track.kind(), track.id());
            track.stop();
        }
        self.video_ended = None;
    }

    fn absorb_early(&mut self, encoder: &mut LiveEncoder) {
        for data in std::mem::take(&mut encoder.early) {
            self.append_segment(&encoder.id, data);
        }
    }

    fn append_segment(&mut self, encoder_id: &str, data: Vec<u8>) {
        if data.is_empty() {
            return;
        }
        let bytes = data.len();
        let sequence = self.segments.append(encoder_id, data);
        tracing::debug!("Segment {} ({} bytes) from encoder {}", sequence, bytes, encoder_id);
        let _ = self
            .event_tx
            .send(SessionEvent::SegmentCaptured { sequence, bytes });
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            tracing::debug!("Session state: {} -> {}", self.state, state);
            self.state = state;
            self.publish_snapshot();
        }
    }

    fn publish_snapshot(&self) {
        let _ = self.event_tx.send(SessionEvent::StateChanged(self.snapshot()));
    }

    fn notify(&self, notification: Notification) {
        let _ = self.event_tx.send(SessionEvent::Notification(notification));
    }

    fn fail(&self, error: RecordingError) -> RecordingError {
        self.fail_with(Notification::for_error(&error), error)
    }

    fn fail_with(&self, notification: Notification, error: RecordingError) -> RecordingError {
        tracing::warn!("{}", error);
        self.notify(notification);
        error
    }
}
