//! Screen Recorder - record your screen and microphone from a desktop window.
//!
//! This is the main library crate for the Screen Recorder application.
//! It provides the Tauri application setup and all backend functionality.

pub mod capture;
pub mod commands;
pub mod config;
pub mod persistence;
pub mod recorder;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

use anyhow::Context;
use capture::{AppTransport, WebviewBridge};
use commands::recording::RecorderState;
use config::{PersistenceMode, RecorderConfig};
use persistence::{DialogSink, DownloadSink, PersistenceSink};
use recorder::{SessionController, SessionDriver, SessionEvent};
use std::sync::Arc;
use tauri::{AppHandle, Emitter, Manager, RunEvent};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Event name session events are forwarded under
pub const SESSION_EVENT: &str = "recording-event";

/// Initialize the application
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "screen_recorder=debug,tauri=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Screen Recorder v{}", env!("CARGO_PKG_VERSION"));

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .invoke_handler(tauri::generate_handler![
            // Recording commands
            commands::recording::start_recording,
            commands::recording::stop_recording,
            commands::recording::pause_recording,
            commands::recording::resume_recording,
            commands::recording::enable_audio,
            commands::recording::disable_audio,
            commands::recording::toggle_audio,
            commands::recording::save_recording,
            commands::recording::save_recording_data,
            commands::recording::get_recording_state,
            // Capture bridge callbacks
            commands::bridge::capture_bridge_reply,
            commands::bridge::capture_bridge_ready,
            commands::bridge::capture_encoder_event,
            commands::bridge::capture_encoder_chunk,
            commands::bridge::capture_track_ended,
            // System commands
            commands::system::get_app_info,
        ])
        .setup(|app| {
            setup_recorder(app)?;
            Ok(())
        })
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app, event| {
            if let RunEvent::Exit = event {
                if let Some(state) = app.try_state::<RecorderState>() {
                    tauri::async_runtime::block_on(state.session.shutdown());
                }
            }
        });
}

/// Build the bridge, sink and session, and hand them to Tauri's state
fn setup_recorder(app: &mut tauri::App) -> anyhow::Result<()> {
    let handle = app.handle().clone();

    let config_dir = app
        .path()
        .app_config_dir()
        .context("failed to resolve the app config directory")?;
    let config = RecorderConfig::load_or_default(&config_dir.join(RecorderConfig::FILE_NAME));

    let sink: Arc<dyn PersistenceSink> = match config.persistence {
        PersistenceMode::Dialog => Arc::new(DialogSink::new(handle.clone())),
        PersistenceMode::Download => {
            let dir = app
                .path()
                .download_dir()
                .context("failed to resolve the download directory")?;
            Arc::new(DownloadSink::new(dir))
        }
    };
    tracing::info!("Saving recordings through the {} sink", sink.name());

    let bridge = WebviewBridge::new(AppTransport::new(handle.clone()), &config);
    let controller = SessionController::new(
        Arc::new(bridge.clone()),
        Arc::new(bridge.clone()),
        sink.clone(),
        config,
    );

    let session = SessionDriver::spawn(controller);
    forward_events(handle, session.subscribe());

    app.manage(bridge);
    app.manage(RecorderState::new(session, sink));
    Ok(())
}

/// Forward session events to the webview
fn forward_events(app: AppHandle, mut events: broadcast::Receiver<SessionEvent>) {
    tauri::async_runtime::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Err(e) = app.emit(SESSION_EVENT, &event) {
                        tracing::warn!("Failed to forward session event: {}", e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Session event forwarder lagged, {} events skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
