//! Download-folder fallback sink
//!
//! Used when no save dialog is available. Files go straight into the download
//! directory under their default name; existing files are never overwritten.

use super::{write_payload, PersistenceSink, RecordingPayload, SaveOutcome};
use crate::recorder::RecordingResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub struct DownloadSink {
    dir: PathBuf,
}

impl DownloadSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

/// First free path for `file_name` in `dir`, adding ` (n)` before the extension
fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string());
    let extension = name.extension().map(|e| e.to_string_lossy().to_string());

    (1..)
        .map(|n| match &extension {
            Some(ext) => dir.join(format!("{} ({}).{}", stem, n, ext)),
            None => dir.join(format!("{} ({})", stem, n)),
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

#[async_trait]
impl PersistenceSink for DownloadSink {
    fn name(&self) -> &'static str {
        "download"
    }

    async fn persist(&self, payload: &RecordingPayload) -> RecordingResult<SaveOutcome> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let file_path = unique_path(&self.dir, &payload.file_name);
        write_payload(&file_path, &payload.data).await?;

        Ok(SaveOutcome { file_path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn payload(name: &str, data: &[u8]) -> RecordingPayload {
        RecordingPayload {
            file_name: name.to_string(),
            mime_type: "video/webm".to_string(),
            data: data.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_writes_into_download_dir() {
        let dir = tempdir().unwrap();
        let sink = DownloadSink::new(dir.path().join("Downloads"));

        let outcome = sink.persist(&payload("rec.webm", b"abc")).await.unwrap();
        assert_eq!(outcome.file_path, dir.path().join("Downloads").join("rec.webm"));
        assert_eq!(std::fs::read(&outcome.file_path).unwrap(), b"abc");
    }

    #[tokio::test]
    async fn test_never_overwrites() {
        let dir = tempdir().unwrap();
        let sink = DownloadSink::new(dir.path());

        let first = sink.persist(&payload("rec.webm", b"first")).await.unwrap();
        let second = sink.persist(&payload("rec.webm", b"second")).await.unwrap();
        let third = sink.persist(&payload("rec.webm", b"third")).await.unwrap();

        assert_eq!(second.file_path, dir.path().join("rec (1).webm"));
        assert_eq!(third.file_path, dir.path().join("rec (2).webm"));
        assert_eq!(std::fs::read(&first.file_path).unwrap(), b"first");
    }
}
