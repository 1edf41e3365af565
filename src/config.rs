//! Recorder configuration
//!
//! Loaded from `recorder.json` in the app config directory. Every field has a
//! default, so the file only needs to name what it overrides.

use crate::capture::CaptureConstraints;
use crate::recorder::EncoderSettings;
use crate::utils::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Encoder options applied to every encoder the controller builds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EncoderOptions {
    pub mime_type: String,
    pub video_bits_per_second: u32,
    pub audio_bits_per_second: u32,
    /// Interval between emitted chunks
    pub timeslice_ms: u64,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            mime_type: "video/webm;codecs=vp9,opus".to_string(),
            video_bits_per_second: 2_500_000,
            audio_bits_per_second: 128_000,
            timeslice_ms: 1000,
        }
    }
}

impl EncoderOptions {
    /// Settings for a stream with or without an audio track
    pub fn settings_for(&self, has_audio: bool) -> EncoderSettings {
        EncoderSettings {
            mime_type: self.mime_type.clone(),
            video_bits_per_second: self.video_bits_per_second,
            audio_bits_per_second: has_audio.then_some(self.audio_bits_per_second),
        }
    }

    pub fn timeslice(&self) -> Duration {
        Duration::from_millis(self.timeslice_ms)
    }
}

/// Where finished recordings go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceMode {
    /// Native save dialog
    Dialog,
    /// Straight into the downloads directory
    Download,
}

impl Default for PersistenceMode {
    fn default() -> Self {
        Self::Dialog
    }
}

/// Top-level recorder configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecorderConfig {
    pub encoder: EncoderOptions,
    pub capture: CaptureConstraints,
    pub persistence: PersistenceMode,
    /// How long an encoder may take to confirm start
    pub start_timeout_ms: u64,
    /// How long a stopping encoder may take to flush
    pub stop_timeout_ms: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderOptions::default(),
            capture: CaptureConstraints::default(),
            persistence: PersistenceMode::default(),
            start_timeout_ms: 5000,
            stop_timeout_ms: 5000,
        }
    }
}

impl RecorderConfig {
    /// Config file name inside the app config directory
    pub const FILE_NAME: &'static str = "recorder.json";

    /// Load the config file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            tracing::debug!("No recorder config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: RecorderConfig = serde_json::from_str(&content)?;
        config.validate()?;

        tracing::info!("Loaded recorder config from {:?}", path);
        Ok(config)
    }

    /// Load the config file, logging and falling back to defaults on any error
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Ignoring recorder config {:?}: {}", path, e);
            Self::default()
        })
    }

    fn validate(&self) -> AppResult<()> {
        if self.encoder.mime_type.trim().is_empty() {
            return Err(AppError::Config("encoder.mimeType must not be empty".to_string()));
        }
        if self.encoder.timeslice_ms == 0 {
            return Err(AppError::Config("encoder.timesliceMs must be positive".to_string()));
        }
        if self.encoder.video_bits_per_second == 0 {
            return Err(AppError::Config(
                "encoder.videoBitsPerSecond must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = RecorderConfig::load(&dir.path().join(RecorderConfig::FILE_NAME)).unwrap();
        assert_eq!(config, RecorderConfig::default());
        assert_eq!(config.encoder.timeslice(), Duration::from_millis(1000));
    }

    #[test]
    fn test_partial_file_overrides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(RecorderConfig::FILE_NAME);
        fs::write(
            &path,
            r#"{"encoder":{"videoBitsPerSecond":5000000},"persistence":"download"}"#,
        )
        .unwrap();

        let config = RecorderConfig::load(&path).unwrap();
        assert_eq!(config.encoder.video_bits_per_second, 5_000_000);
        assert_eq!(config.encoder.audio_bits_per_second, 128_000);
        assert_eq!(config.persistence, PersistenceMode::Download);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(RecorderConfig::FILE_NAME);
        fs::write(&path, r#"{"encoder":{"timesliceMs":0}}"#).unwrap();

        assert!(matches!(RecorderConfig::load(&path), Err(AppError::Config(_))));
        assert_eq!(RecorderConfig::load_or_default(&path), RecorderConfig::default());
    }

    #[test]
    fn test_audio_bitrate_only_with_audio() {
        let options = EncoderOptions::default();
        assert_eq!(options.settings_for(false).audio_bits_per_second, None);
        assert_eq!(options.settings_for(true).audio_bits_per_second, Some(128_000));
    }
}
