//! Native save dialog sink

use super::{write_payload, PersistenceSink, RecordingPayload, SaveOutcome};
use crate::recorder::{RecordingError, RecordingResult};
use async_trait::async_trait;
use tauri::AppHandle;
use tauri_plugin_dialog::DialogExt;
use tokio::sync::oneshot;

/// Asks the user where to save through the OS save dialog
pub struct DialogSink {
    app: AppHandle,
}

impl DialogSink {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

#[async_trait]
impl PersistenceSink for DialogSink {
    fn name(&self) -> &'static str {
        "dialog"
    }

    async fn persist(&self, payload: &RecordingPayload) -> RecordingResult<SaveOutcome> {
        let (tx, rx) = oneshot::channel();

        self.app
            .dialog()
            .file()
            .set_title("Save Recording")
            .set_file_name(&payload.file_name)
            .add_filter("WebM Files", &["webm"])
            .add_filter("All Files", &["*"])
            .save_file(move |path| {
                let _ = tx.send(path);
            });

        let selected = rx.await.map_err(|_| {
            RecordingError::PersistenceFailure("Save dialog closed unexpectedly".to_string())
        })?;

        let Some(selected) = selected else {
            tracing::info!("User cancelled the save dialog");
            return Err(RecordingError::PersistenceFailure(
                "Save operation cancelled".to_string(),
            ));
        };

        let file_path = selected
            .into_path()
            .map_err(|e| RecordingError::PersistenceFailure(e.to_string()))?;

        write_payload(&file_path, &payload.data).await?;

        Ok(SaveOutcome { file_path })
    }
}
