//! System-related Tauri commands

use super::recording::RecorderState;
use serde::{Deserialize, Serialize};
use tauri::{AppHandle, State};

/// Application information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    pub os: String,
    pub arch: String,
    /// Which persistence sink saves recordings
    pub sink: String,
    /// Whether recordings are saved through the native dialog
    pub native_dialog: bool,
}

/// Get basic application information
#[tauri::command]
pub async fn get_app_info(app: AppHandle, state: State<'_, RecorderState>) -> Result<AppInfo, String> {
    let package = app.package_info();
    let sink = state.sink.name();

    Ok(AppInfo {
        name: package.name.clone(),
        version: package.version.to_string(),
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        sink: sink.to_string(),
        native_dialog: sink == "dialog",
    })
}
