//! Persistence sinks
//!
//! A sink takes a finished recording and writes it somewhere the user chose.
//! Two variants exist: the native save dialog and a download-folder fallback
//! for when no dialog is available.

pub mod dialog;
pub mod download;
pub mod transfer;

pub use dialog::DialogSink;
pub use download::DownloadSink;
pub use transfer::SaveResponse;

use crate::recorder::{RecordingError, RecordingResult};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};

/// Container type of every saved recording
pub const RECORDING_MIME_TYPE: &str = "video/webm";

/// A finished recording ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingPayload {
    /// Suggested file name
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl RecordingPayload {
    /// Payload named with the default pattern for the current time
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            file_name: default_file_name(Utc::now()),
            mime_type: RECORDING_MIME_TYPE.to_string(),
            data,
        }
    }
}

/// Where a payload ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub file_path: PathBuf,
}

/// Writes finished recordings to storage
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Short name used in logs and app info
    fn name(&self) -> &'static str;

    /// Persist the payload. Cancellation by the user is reported as
    /// [`RecordingError::PersistenceFailure`].
    async fn persist(&self, payload: &RecordingPayload) -> RecordingResult<SaveOutcome>;
}

/// `screen-recording-<ISO 8601 timestamp with ':' replaced by '-'>.webm`
pub fn default_file_name(now: DateTime<Utc>) -> String {
    let timestamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace(':', "-");
    format!("screen-recording-{}.webm", timestamp)
}

/// Write the payload bytes to `path`, creating parent directories
pub(crate) async fn write_payload(path: &Path, data: &[u8]) -> RecordingResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    tokio::fs::write(path, data).await.map_err(|e| {
        RecordingError::PersistenceFailure(format!("Failed to write {:?}: {}", path, e))
    })?;

    tracing::info!("Wrote {} bytes to {:?}", data.len(), path);
    Ok(())
}
