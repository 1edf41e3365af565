//! Segment buffer
//!
//! Encoded chunks accumulate here in the exact order the encoders emitted them.
//! The order is the encode timeline of the session, so segments are never
//! sorted or merged, only appended, concatenated or cleared.

use chrono::{DateTime, Utc};

/// One arrival-ordered chunk of encoded recording data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Arrival position within the session (0, 1, 2, ...)
    pub sequence: u64,

    /// Encoder instance that produced the chunk
    pub encoder_id: String,

    /// When the chunk was received
    pub received_at: DateTime<Utc>,

    data: Vec<u8>,
}

impl Segment {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Ordered, append-only store of segments for one recording
#[derive(Debug, Default)]
pub struct SegmentBuffer {
    segments: Vec<Segment>,
    next_sequence: u64,
    total_bytes: usize,
}

impl SegmentBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk, returning the sequence number it was given
    pub fn append(&mut self, encoder_id: &str, data: Vec<u8>) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.total_bytes += data.len();
        self.segments.push(Segment {
            sequence,
            encoder_id: encoder_id.to_string(),
            received_at: Utc::now(),
            data,
        });
        sequence
    }

    /// Read-only view of all segments in arrival order
    pub fn all(&self) -> &[Segment] {
        &self.segments
    }

    /// Concatenate every segment into one payload
    pub fn concat(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(self.total_bytes);
        for segment in &self.segments {
            payload.extend_from_slice(&segment.data);
        }
        payload
    }

    /// Drop all segments. Only called after a confirmed save or when a new
    /// session starts.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.next_sequence = 0;
        self.total_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_arrival_order() {
        let mut buffer = SegmentBuffer::new();
        assert_eq!(buffer.append("enc-1", b"one".to_vec()), 0);
        assert_eq!(buffer.append("enc-1", b"two".to_vec()), 1);
        assert_eq!(buffer.append("enc-2", b"three".to_vec()), 2);

        let encoders: Vec<_> = buffer.all().iter().map(|s| s.encoder_id.as_str()).collect();
        assert_eq!(encoders, vec!["enc-1", "enc-1", "enc-2"]);
        assert_eq!(buffer.concat(), b"onetwothree".to_vec());
        assert_eq!(buffer.total_bytes(), 11);
    }

    #[test]
    fn test_clear_resets_sequence() {
        let mut buffer = SegmentBuffer::new();
        buffer.append("enc-1", vec![1, 2, 3]);
        buffer.append("enc-1", vec![4]);
        buffer.clear();

        assert!(buffer.is_empty());
        assert_eq!(buffer.total_bytes(), 0);
        assert!(buffer.concat().is_empty());
        assert_eq!(buffer.append("enc-2", vec![5]), 0);
    }
}
