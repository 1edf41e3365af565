//! Callbacks from the webview half of the capture bridge

use crate::capture::bridge::{BridgeEncoderEvent, BridgeReply, WebviewBridge};
use crate::recorder::{EncoderEvent, RecordingError};
use crate::utils::ErrorResponse;
use tauri::ipc::{InvokeBody, Request};
use tauri::State;

/// Header naming the encoder a raw chunk belongs to
pub const ENCODER_ID_HEADER: &str = "x-encoder-id";

/// The webview answered a bridge request
#[tauri::command]
pub fn capture_bridge_reply(
    bridge: State<'_, WebviewBridge>,
    request_id: String,
    reply: BridgeReply,
) -> Result<(), ErrorResponse> {
    Ok(bridge.resolve(&request_id, reply)?)
}

/// The webview (re)loaded its bridge script
#[tauri::command]
pub fn capture_bridge_ready(bridge: State<'_, WebviewBridge>) {
    bridge.reset();
}

/// Encoder lifecycle event (`start`, `pause`, `resume`, `stop`, `error`)
#[tauri::command]
pub fn capture_encoder_event(
    bridge: State<'_, WebviewBridge>,
    encoder_id: String,
    event: BridgeEncoderEvent,
    message: Option<String>,
) -> bool {
    bridge.encoder_lifecycle(&encoder_id, event, message)
}

/// Encoded chunk, sent as the raw request body
#[tauri::command]
pub fn capture_encoder_chunk(
    bridge: State<'_, WebviewBridge>,
    request: Request<'_>,
) -> Result<bool, ErrorResponse> {
    let InvokeBody::Raw(data) = request.body() else {
        return Err(RecordingError::Bridge("encoder chunk must be sent as a raw body".to_string()).into());
    };

    let encoder_id = request
        .headers()
        .get(ENCODER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| RecordingError::Bridge(format!("missing {} header", ENCODER_ID_HEADER)))?;

    Ok(bridge.encoder_event(encoder_id, EncoderEvent::DataAvailable(data.clone())))
}

/// A track ended on the webview side
#[tauri::command]
pub fn capture_track_ended(bridge: State<'_, WebviewBridge>, track_id: String) {
    bridge.track_ended(&track_id);
}
