//! Inbound stream ingestion.
//!
//! One receiver task per inbound connection extracts media payloads
//! from raw frames and appends them to an ordered per-kind buffer.
//! The scheduler later drains those buffers atomically, so every
//! packet lands in exactly one chunk.

pub mod buffer;
pub mod header;
pub mod payload;

use std::time::Instant;

use bytes::Bytes;

pub use buffer::{MediaBuffer, Packet};
pub use header::StreamHeader;
pub use payload::{InboundFrame, extract_payload};

/// Media kind carried by an inbound connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

/// Shared ingestion state: one buffer per media kind plus the
/// write-once video stream header.
///
/// Receivers append through [`accept_frame`](Self::accept_frame); the
/// chunk scheduler drains through [`drain`](Self::drain). All access
/// is safe under concurrent receivers and one scheduler.
#[derive(Default)]
pub struct StreamIngest {
    video: MediaBuffer,
    audio: MediaBuffer,
    header: StreamHeader,
}

impl StreamIngest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes one inbound frame for the given media kind.
    ///
    /// Extracts the payload (tolerating all three wire shapes), stores
    /// it with its capture time, and for video seeds the stream header
    /// from the first payload seen. Malformed frames are dropped;
    /// returns whether a packet was appended.
    pub fn accept_frame(&self, kind: MediaKind, frame: InboundFrame) -> bool {
        let Some(data) = extract_payload(&frame) else {
            tracing::debug!("Dropping {kind} frame with no extractable payload");
            return false;
        };

        if kind == MediaKind::Video && self.header.record(&data) {
            tracing::info!("Captured video stream header ({} bytes)", data.len());
        }

        let buffer = self.buffer(kind);
        buffer.append(Packet {
            payload: data,
            captured_at: Instant::now(),
        });
        true
    }

    /// Atomically removes and returns all buffered packets for a kind.
    pub fn drain(&self, kind: MediaKind) -> Vec<Packet> {
        self.buffer(kind).drain()
    }

    /// Number of packets currently buffered for a kind.
    pub fn buffered(&self, kind: MediaKind) -> usize {
        self.buffer(kind).len()
    }

    /// The cached codec parameter-set header, once the first video
    /// payload has been observed.
    pub fn stream_header(&self) -> Option<Bytes> {
        self.header.get()
    }

    fn buffer(&self, kind: MediaKind) -> &MediaBuffer {
        match kind {
            MediaKind::Video => &self.video,
            MediaKind::Audio => &self.audio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_frame_appends_packet() {
        let ingest = StreamIngest::new();

        let appended = ingest.accept_frame(
            MediaKind::Audio,
            InboundFrame::Binary(Bytes::from_static(b"\x01\x02\x03")),
        );

        assert!(appended);
        assert_eq!(ingest.buffered(MediaKind::Audio), 1);
        assert_eq!(ingest.buffered(MediaKind::Video), 0);
    }

    #[test]
    fn test_first_video_payload_seeds_header() {
        let ingest = StreamIngest::new();
        assert!(ingest.stream_header().is_none());

        ingest.accept_frame(
            MediaKind::Video,
            InboundFrame::Binary(Bytes::from_static(b"sps-pps")),
        );
        ingest.accept_frame(
            MediaKind::Video,
            InboundFrame::Binary(Bytes::from_static(b"frame-2")),
        );

        assert_eq!(ingest.stream_header().unwrap().as_ref(), b"sps-pps");
    }

    #[test]
    fn test_audio_never_seeds_header() {
        let ingest = StreamIngest::new();

        ingest.accept_frame(
            MediaKind::Audio,
            InboundFrame::Binary(Bytes::from_static(b"pcm")),
        );

        assert!(ingest.stream_header().is_none());
    }

    #[test]
    fn test_malformed_frame_is_dropped() {
        let ingest = StreamIngest::new();

        let appended =
            ingest.accept_frame(MediaKind::Video, InboundFrame::Text("not json".to_string()));

        assert!(!appended);
        assert_eq!(ingest.buffered(MediaKind::Video), 0);
        assert!(ingest.stream_header().is_none());
    }
}
