//! Capture sources
//!
//! Screen and microphone capture is provided by the platform. On the desktop
//! build that platform is the webview, reached through [`bridge`].

pub mod bridge;
pub mod traits;

// Re-export traits
pub use traits::{
    CaptureConstraints, CaptureSourceProvider, CursorMode, DisplaySurface, MediaTrack, TrackInfo,
    TrackKind, TrackRef,
};

pub use bridge::{AppTransport, BridgeTransport, WebviewBridge};
