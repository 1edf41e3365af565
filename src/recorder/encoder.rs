//! Encoder session interface
//!
//! An encoder is bound to the composite stream it was created with. It reports
//! everything it does (data, lifecycle, errors) on a typed event stream that
//! the controller subscribes to exactly once per instance.

use super::compositor::CompositeStream;
use super::error::RecordingResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

/// Events emitted by an encoder session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderEvent {
    /// Encoder confirmed start
    Started,
    /// A chunk of encoded data is available
    DataAvailable(Vec<u8>),
    /// Encoder paused
    Paused,
    /// Encoder resumed
    Resumed,
    /// Encoder stopped; no more data will follow
    Stopped,
    /// Encoder reported a failure
    Error(String),
}

/// Receiving half of an encoder's event stream
pub type EncoderEvents = mpsc::UnboundedReceiver<EncoderEvent>;

/// Options handed to the encoder backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncoderSettings {
    /// Container/codec identifier, e.g. `video/webm;codecs=vp9,opus`
    pub mime_type: String,

    /// Target video bitrate
    pub video_bits_per_second: u32,

    /// Target audio bitrate, only set when the stream carries audio
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_bits_per_second: Option<u32>,
}

/// A live encoder bound to one composite stream
#[async_trait]
pub trait EncoderSession: Send {
    /// Unique identifier of this encoder instance
    fn id(&self) -> &str;

    /// Take the event stream. Returns `None` once it has been taken.
    fn take_events(&mut self) -> Option<EncoderEvents>;

    /// Start encoding, emitting a chunk every `timeslice`
    async fn start(&mut self, timeslice: Duration) -> RecordingResult<()>;

    /// Pause encoding without releasing the stream
    async fn pause(&mut self) -> RecordingResult<()>;

    /// Resume encoding
    async fn resume(&mut self) -> RecordingResult<()>;

    /// Stop encoding. Buffered data is flushed as a final `DataAvailable`
    /// followed by `Stopped`.
    async fn stop(&mut self) -> RecordingResult<()>;
}

/// Factory for encoder sessions
#[async_trait]
pub trait EncoderBackend: Send + Sync {
    /// Construct a new encoder bound to the given stream
    async fn create(
        &self,
        stream: &CompositeStream,
        settings: &EncoderSettings,
    ) -> RecordingResult<Box<dyn EncoderSession>>;
}
