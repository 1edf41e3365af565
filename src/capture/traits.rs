//! Capture trait definitions
//!
//! Platform-agnostic traits for capture sources and the tracks they hand out.

use crate::recorder::RecordingResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Video => write!(f, "video"),
            TrackKind::Audio => write!(f, "audio"),
        }
    }
}

/// A live platform media track
///
/// Tracks are scarce resources: whoever owns one must call [`MediaTrack::stop`]
/// once it is no longer needed.
pub trait MediaTrack: Send + Sync {
    /// Platform identifier of the track
    fn id(&self) -> &str;

    /// Whether this is a video or audio track
    fn kind(&self) -> TrackKind;

    /// Human-readable label (display name, device name)
    fn label(&self) -> &str;

    /// Whether the track is still producing media
    fn is_live(&self) -> bool;

    /// Release the platform resource behind the track
    fn stop(&self);

    /// Watch that flips to `true` when the track ends on its own
    /// (e.g. the user revoked screen sharing from the OS)
    fn subscribe_ended(&self) -> watch::Receiver<bool>;
}

/// Shared handle to a track
pub type TrackRef = Arc<dyn MediaTrack>;

/// Serializable description of a track, used for the live preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub id: String,
    pub kind: TrackKind,
    pub label: String,
    pub live: bool,
}

impl TrackInfo {
    pub fn of(track: &dyn MediaTrack) -> Self {
        Self {
            id: track.id().to_string(),
            kind: track.kind(),
            label: track.label().to_string(),
            live: track.is_live(),
        }
    }
}

/// How the cursor is rendered into the capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorMode {
    Always,
    Motion,
    Never,
}

/// Preferred surface offered first in the share picker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplaySurface {
    Monitor,
    Window,
    Browser,
}

/// Constraints passed along with a screen capture request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureConstraints {
    pub cursor: CursorMode,
    pub display_surface: DisplaySurface,
    /// Whether to ask for tab/system audio alongside the screen
    pub audio: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            cursor: CursorMode::Always,
            display_surface: DisplaySurface::Monitor,
            audio: false,
        }
    }
}

/// Source of screen and microphone tracks
///
/// Both requests may prompt the user; a dismissed prompt is reported as
/// [`RecordingError::PermissionDenied`](crate::recorder::RecordingError::PermissionDenied).
#[async_trait]
pub trait CaptureSourceProvider: Send + Sync {
    /// Request a screen capture video track
    async fn request_screen_capture(&self, constraints: &CaptureConstraints) -> RecordingResult<TrackRef>;

    /// Request a microphone audio track
    async fn request_microphone(&self) -> RecordingResult<TrackRef>;
}
