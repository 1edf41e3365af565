//! Recording errors
//!
//! Every failure the session controller can surface to the user.

use thiserror::Error;

/// Errors that can occur while driving a recording session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordingError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Encoder error: {0}")]
    EncoderError(String),

    #[error("There is no recording to save")]
    EmptyRecording,

    #[error("Failed to save recording: {0}")]
    PersistenceFailure(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Capture bridge error: {0}")]
    Bridge(String),
}

impl RecordingError {
    /// Stable error code reported to the frontend
    pub fn code(&self) -> &'static str {
        match self {
            RecordingError::PermissionDenied(_) => "PERMISSION_DENIED",
            RecordingError::NotSupported(_) => "NOT_SUPPORTED",
            RecordingError::EncoderError(_) => "ENCODER_ERROR",
            RecordingError::EmptyRecording => "EMPTY_RECORDING",
            RecordingError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
            RecordingError::InvalidState(_) => "INVALID_STATE",
            RecordingError::Bridge(_) => "BRIDGE_ERROR",
        }
    }
}

impl From<std::io::Error> for RecordingError {
    fn from(error: std::io::Error) -> Self {
        RecordingError::PersistenceFailure(error.to_string())
    }
}

/// Result type for recording operations
pub type RecordingResult<T> = Result<T, RecordingError>;
