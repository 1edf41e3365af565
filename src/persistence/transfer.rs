//! Wire contract for recordings crossing the webview boundary
//!
//! The webview sends finished recordings as base64 text and receives a
//! `{success, filePath}` / `{success: false, message}` response.

use super::SaveOutcome;
use crate::recorder::{RecordingError, RecordingResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// Decode a payload sent by the webview
///
/// Accepts bare base64 as well as a `data:<mime>;base64,` URL as produced by
/// `FileReader.readAsDataURL`.
pub fn decode_payload(encoded: &str) -> RecordingResult<Vec<u8>> {
    let body = match encoded.split_once(";base64,") {
        Some((prefix, body)) if prefix.starts_with("data:") => body,
        _ => encoded,
    };

    STANDARD
        .decode(body.trim())
        .map_err(|e| RecordingError::PersistenceFailure(format!("Invalid recording data: {}", e)))
}

/// Result of a save request as seen by the webview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<RecordingResult<SaveOutcome>> for SaveResponse {
    fn from(result: RecordingResult<SaveOutcome>) -> Self {
        match result {
            Ok(outcome) => SaveResponse {
                success: true,
                file_path: Some(outcome.file_path.to_string_lossy().to_string()),
                message: None,
            },
            Err(RecordingError::PersistenceFailure(message)) => SaveResponse {
                success: false,
                file_path: None,
                message: Some(message),
            },
            Err(e) => SaveResponse {
                success: false,
                file_path: None,
                message: Some(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_decode_accepts_data_url() {
        let encoded = format!("data:video/webm;base64,{}", STANDARD.encode(b"\x1a\x45\xdf\xa3"));
        assert_eq!(decode_payload(&encoded).unwrap(), b"\x1a\x45\xdf\xa3".to_vec());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_payload("not base64!"),
            Err(RecordingError::PersistenceFailure(_))
        ));
    }

    #[test]
    fn test_response_shapes() {
        let saved = SaveResponse::from(Ok(SaveOutcome {
            file_path: PathBuf::from("/tmp/rec.webm"),
        }));
        let json = serde_json::to_value(&saved).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["filePath"], "/tmp/rec.webm");
        assert!(json.get("message").is_none());

        let cancelled = SaveResponse::from(Err(RecordingError::PersistenceFailure(
            "Save operation cancelled".to_string(),
        )));
        assert!(!cancelled.success);
        assert_eq!(cancelled.message.as_deref(), Some("Save operation cancelled"));
    }
}
