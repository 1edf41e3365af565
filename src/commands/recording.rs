//! Recording-related Tauri commands

use crate::persistence::transfer::decode_payload;
use crate::persistence::{PersistenceSink, RecordingPayload, SaveResponse};
use crate::recorder::{RecordingError, SessionHandle, SessionSnapshot};
use crate::utils::ErrorResponse;
use std::sync::Arc;
use tauri::State;

/// Application state for recording
pub struct RecorderState {
    pub session: SessionHandle,
    pub sink: Arc<dyn PersistenceSink>,
}

impl RecorderState {
    pub fn new(session: SessionHandle, sink: Arc<dyn PersistenceSink>) -> Self {
        Self { session, sink }
    }
}

/// Start recording
#[tauri::command]
pub async fn start_recording(state: State<'_, RecorderState>) -> Result<SessionSnapshot, ErrorResponse> {
    tracing::info!("Start recording requested");
    Ok(state.session.start().await?)
}

/// Stop recording
#[tauri::command]
pub async fn stop_recording(state: State<'_, RecorderState>) -> Result<SessionSnapshot, ErrorResponse> {
    tracing::info!("Stop recording requested");
    Ok(state.session.stop().await?)
}

/// Pause recording
#[tauri::command]
pub async fn pause_recording(state: State<'_, RecorderState>) -> Result<SessionSnapshot, ErrorResponse> {
    Ok(state.session.pause().await?)
}

/// Resume recording
#[tauri::command]
pub async fn resume_recording(state: State<'_, RecorderState>) -> Result<SessionSnapshot, ErrorResponse> {
    Ok(state.session.resume().await?)
}

#[tauri::command]
pub async fn enable_audio(state: State<'_, RecorderState>) -> Result<SessionSnapshot, ErrorResponse> {
    Ok(state.session.enable_audio().await?)
}

#[tauri::command]
pub async fn disable_audio(state: State<'_, RecorderState>) -> Result<SessionSnapshot, ErrorResponse> {
    Ok(state.session.disable_audio().await?)
}

#[tauri::command]
pub async fn toggle_audio(state: State<'_, RecorderState>) -> Result<SessionSnapshot, ErrorResponse> {
    Ok(state.session.toggle_audio().await?)
}

/// Get current recording state
#[tauri::command]
pub async fn get_recording_state(
    state: State<'_, RecorderState>,
) -> Result<SessionSnapshot, ErrorResponse> {
    Ok(state.session.snapshot().await?)
}

/// Save the finished recording
///
/// A cancelled or failed write comes back as `{success: false, message}`;
/// everything else that prevents saving is an error.
#[tauri::command]
pub async fn save_recording(state: State<'_, RecorderState>) -> Result<SaveResponse, ErrorResponse> {
    match state.session.save().await {
        Err(e @ RecordingError::PersistenceFailure(_)) => Ok(SaveResponse::from(Err(e))),
        Err(e) => Err(e.into()),
        saved => Ok(SaveResponse::from(saved)),
    }
}

/// Save a recording the webview already holds, sent as base64
#[tauri::command]
pub async fn save_recording_data(
    state: State<'_, RecorderState>,
    data_base64: String,
) -> Result<SaveResponse, ErrorResponse> {
    let data = decode_payload(&data_base64)?;
    if data.is_empty() {
        return Err(RecordingError::EmptyRecording.into());
    }

    tracing::info!("Saving {} bytes sent by the webview", data.len());
    let payload = RecordingPayload::new(data);
    Ok(SaveResponse::from(state.sink.persist(&payload).await))
}
