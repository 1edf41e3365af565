//! Recording state management
//!
//! Defines the session state machine, the snapshot handed to the frontend and
//! the capture spans used to measure recorded time.

use crate::capture::TrackInfo;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Current state of the recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No recording in progress
    Idle,
    /// Waiting for the user to grant screen capture
    Requesting,
    /// Currently recording
    Active,
    /// Recording is paused
    Paused,
    /// Recording finished; segments are kept for saving
    Stopped,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

impl SessionState {
    /// Whether an encoder is live in this state
    pub fn is_recording(&self) -> bool {
        matches!(self, SessionState::Active | SessionState::Paused)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Requesting => write!(f, "requesting"),
            SessionState::Active => write!(f, "active"),
            SessionState::Paused => write!(f, "paused"),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Everything the frontend needs to render the recorder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub audio_enabled: bool,
    pub has_recording: bool,
    pub segment_count: usize,
    pub recorded_bytes: usize,
    pub duration_ms: f64,
    /// Live tracks of the composite stream, for the preview
    pub tracks: Vec<TrackInfo>,
    /// Set when the call was ignored because another operation was in flight
    pub busy: bool,
}

/// One uninterrupted stretch of capture
///
/// A new span is opened on start and on every resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSpan {
    /// Span index (0, 1, 2, ...)
    pub index: usize,

    /// Duration of this span in milliseconds
    pub duration_ms: f64,

    /// Unix timestamp when the span started
    pub unix_start_ms: u64,

    /// Unix timestamp when the span ended
    pub unix_end_ms: u64,

    #[serde(skip)]
    opened_at: Option<Instant>,
}

impl CaptureSpan {
    /// Open a new span starting now
    pub fn open(index: usize) -> Self {
        let now = Utc::now().timestamp_millis() as u64;
        Self {
            index,
            duration_ms: 0.0,
            unix_start_ms: now,
            unix_end_ms: now,
            opened_at: Some(Instant::now()),
        }
    }

    /// Close the span. Closing twice keeps the first end.
    pub fn close(&mut self) {
        if let Some(opened_at) = self.opened_at.take() {
            self.duration_ms = opened_at.elapsed().as_secs_f64() * 1000.0;
            self.unix_end_ms = Utc::now().timestamp_millis() as u64;
        }
    }

    pub fn is_open(&self) -> bool {
        self.opened_at.is_some()
    }

    /// Duration so far, including time elapsed in an open span
    pub fn elapsed_ms(&self) -> f64 {
        match self.opened_at {
            Some(opened_at) => opened_at.elapsed().as_secs_f64() * 1000.0,
            None => self.duration_ms,
        }
    }
}

/// Spans of the current recording
#[derive(Debug, Default)]
pub struct CaptureTimeline {
    spans: Vec<CaptureSpan>,
}

impl CaptureTimeline {
    pub fn reset(&mut self) {
        self.spans.clear();
    }

    pub fn open_span(&mut self) {
        self.close_span();
        let index = self.spans.len();
        self.spans.push(CaptureSpan::open(index));
    }

    pub fn close_span(&mut self) {
        if let Some(span) = self.spans.last_mut() {
            span.close();
        }
    }

    pub fn spans(&self) -> &[CaptureSpan] {
        &self.spans
    }

    /// Total captured time in milliseconds, paused time excluded
    pub fn duration_ms(&self) -> f64 {
        self.spans.iter().map(CaptureSpan::elapsed_ms).sum()
    }
}
