//! Recording session module
//!
//! - `SessionController` owns the state machine, stream, encoder and segments
//! - `SessionDriver` serializes UI commands and platform events onto it
//! - `EncoderBackend`/`EncoderSession` abstract the platform encoder

pub mod compositor;
pub mod controller;
pub mod driver;
pub mod encoder;
pub mod error;
pub mod events;
pub mod segments;
pub mod state;


pub use compositor::CompositeStream;
pub use controller::{PlatformEvent, SessionController};
pub use driver::{CommandReply, SessionDriver, SessionHandle, SessionOp};
pub use encoder::{EncoderBackend, EncoderEvent, EncoderEvents, EncoderSession, EncoderSettings};
pub use error::{RecordingError, RecordingResult};
pub use events::{Notification, NotificationVariant, SessionEvent};
pub use segments::{Segment, SegmentBuffer};
pub use state::{CaptureSpan, CaptureTimeline, SessionSnapshot, SessionState};
