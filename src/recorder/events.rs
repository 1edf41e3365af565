//! Session events
//!
//! Published by the controller on a broadcast channel and forwarded to the
//! webview as `recording-event`.

use super::error::RecordingError;
use super::state::SessionSnapshot;
use serde::{Deserialize, Serialize};

/// Visual weight of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationVariant {
    Default,
    Destructive,
}

/// User-visible toast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: NotificationVariant,
}

impl Notification {
    pub fn info(title: &str, description: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            description: description.into(),
            variant: NotificationVariant::Default,
        }
    }

    pub fn error(title: &str, description: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            description: description.into(),
            variant: NotificationVariant::Destructive,
        }
    }

    /// Notification for a failed operation
    pub fn for_error(error: &RecordingError) -> Self {
        match error {
            RecordingError::PermissionDenied(_) => {
                Self::error("Permission Denied", error.to_string())
            }
            RecordingError::NotSupported(_) => {
                Self::error("Not Supported", error.to_string())
            }
            RecordingError::EncoderError(_) => {
                Self::error("Recording Error", error.to_string())
            }
            RecordingError::EmptyRecording => {
                Self::error("No Recording Found", "There is no recording to save.")
            }
            RecordingError::PersistenceFailure(_) => Self::error("Save Failed", error.to_string()),
            RecordingError::InvalidState(_) | RecordingError::Bridge(_) => {
                Self::error("Recording Error", error.to_string())
            }
        }
    }
}

/// Events published by the session controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum SessionEvent {
    /// The snapshot changed (state, tracks or audio)
    StateChanged(SessionSnapshot),
    /// A toast for the user
    Notification(Notification),
    /// A segment was appended
    #[serde(rename_all = "camelCase")]
    SegmentCaptured { sequence: u64, bytes: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_notifications_are_destructive() {
        let notification = Notification::for_error(&RecordingError::EmptyRecording);
        assert_eq!(notification.title, "No Recording Found");
        assert_eq!(notification.variant, NotificationVariant::Destructive);
    }

    #[test]
    fn test_event_wire_format() {
        let event = SessionEvent::SegmentCaptured { sequence: 3, bytes: 42 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "segmentCaptured");
        assert_eq!(json["payload"]["sequence"], 3);
    }
}
