//! Stream compositor
//!
//! Holds the set of tracks an encoder is bound to: at most one video track and
//! at most one audio track. The compositor never stops tracks; whoever removes
//! a track from it owns its release.

use super::error::{RecordingError, RecordingResult};
use crate::capture::{TrackInfo, TrackKind, TrackRef};

/// Logical merged audio + video feed
#[derive(Default)]
pub struct CompositeStream {
    video: Option<TrackRef>,
    audio: Option<TrackRef>,
}

impl CompositeStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a track to its slot
    ///
    /// Re-adding the track already in the slot is a no-op. A different track of
    /// the same kind is rejected so identities stay stable.
    pub fn add_track(&mut self, track: TrackRef) -> RecordingResult<()> {
        let slot = match track.kind() {
            TrackKind::Video => &mut self.video,
            TrackKind::Audio => &mut self.audio,
        };

        match slot {
            Some(existing) if existing.id() == track.id() => Ok(()),
            Some(existing) => Err(RecordingError::InvalidState(format!(
                "stream already carries {} track {}",
                track.kind(),
                existing.id()
            ))),
            None => {
                tracing::debug!("Compositor: added {} track {}", track.kind(), track.id());
                *slot = Some(track);
                Ok(())
            }
        }
    }

    /// Remove a track by id, handing it back to the caller
    pub fn remove_track(&mut self, track_id: &str) -> Option<TrackRef> {
        for slot in [&mut self.video, &mut self.audio] {
            if slot.as_ref().is_some_and(|t| t.id() == track_id) {
                tracing::debug!("Compositor: removed track {}", track_id);
                return slot.take();
            }
        }
        None
    }

    /// Tracks currently in the stream, video first
    pub fn current_tracks(&self) -> Vec<TrackRef> {
        self.video.iter().chain(self.audio.iter()).cloned().collect()
    }

    /// Remove every track, handing them back to the caller
    pub fn take_all(&mut self) -> Vec<TrackRef> {
        self.video.take().into_iter().chain(self.audio.take()).collect()
    }

    pub fn video(&self) -> Option<&TrackRef> {
        self.video.as_ref()
    }

    pub fn audio(&self) -> Option<&TrackRef> {
        self.audio.as_ref()
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.video.is_none() && self.audio.is_none()
    }

    pub fn track_ids(&self) -> Vec<String> {
        self.current_tracks().iter().map(|t| t.id().to_string()).collect()
    }

    pub fn track_infos(&self) -> Vec<TrackInfo> {
        self.current_tracks().iter().map(|t| TrackInfo::of(t.as_ref())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MediaTrack;
    use crate::testing::MockTrack;

    #[test]
    fn test_holds_one_track_per_kind() {
        let mut stream = CompositeStream::new();
        let screen = MockTrack::video("screen");
        let mic = MockTrack::audio("mic");

        stream.add_track(screen.clone()).unwrap();
        stream.add_track(mic.clone()).unwrap();
        // Same track again is fine
        stream.add_track(screen.clone()).unwrap();

        let second_mic = MockTrack::audio("mic-2");
        assert!(matches!(
            stream.add_track(second_mic),
            Err(RecordingError::InvalidState(_))
        ));

        assert_eq!(stream.track_ids(), vec![screen.id().to_string(), mic.id().to_string()]);
    }

    #[test]
    fn test_remove_keeps_video_identity() {
        let mut stream = CompositeStream::new();
        let screen = MockTrack::video("screen");
        let mic = MockTrack::audio("mic");
        stream.add_track(screen.clone()).unwrap();
        stream.add_track(mic.clone()).unwrap();

        let removed = stream.remove_track(mic.id()).unwrap();
        assert_eq!(removed.id(), mic.id());
        assert!(!stream.has_audio());
        assert_eq!(stream.video().unwrap().id(), screen.id());

        // Compositor does not release what it hands back
        assert!(mic.is_live());
        assert!(stream.remove_track("missing").is_none());
    }

    #[test]
    fn test_take_all_empties_stream() {
        let mut stream = CompositeStream::new();
        stream.add_track(MockTrack::video("screen")).unwrap();
        stream.add_track(MockTrack::audio("mic")).unwrap();

        let tracks = stream.take_all();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].kind(), TrackKind::Video);
        assert!(stream.is_empty());
    }
}
