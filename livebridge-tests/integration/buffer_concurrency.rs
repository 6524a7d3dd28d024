//! Exactly-once drain semantics under concurrent ingestion.

use std::sync::Arc;

use bytes::Bytes;
use livebridge_core::ingest::{InboundFrame, MediaKind, StreamIngest};

/// Simulates the real task topology: two receiver tasks appending
/// while a scheduler task drains. Every packet must land in exactly
/// one drained batch, in per-kind arrival order.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_receivers_and_drainer_lose_nothing() {
    const FRAMES_PER_RECEIVER: usize = 2_000;

    let ingest = Arc::new(StreamIngest::new());

    let video_task = {
        let ingest = Arc::clone(&ingest);
        tokio::spawn(async move {
            for i in 0..FRAMES_PER_RECEIVER {
                let payload = Bytes::from((i as u32).to_be_bytes().to_vec());
                ingest.accept_frame(MediaKind::Video, InboundFrame::Binary(payload));
                if i % 128 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    };

    let audio_task = {
        let ingest = Arc::clone(&ingest);
        tokio::spawn(async move {
            for i in 0..FRAMES_PER_RECEIVER {
                let payload = Bytes::from((i as u32).to_be_bytes().to_vec());
                ingest.accept_frame(MediaKind::Audio, InboundFrame::Binary(payload));
                if i % 128 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    };

    let drainer = {
        let ingest = Arc::clone(&ingest);
        tokio::spawn(async move {
            let mut video = Vec::new();
            let mut audio = Vec::new();
            for _ in 0..100 {
                video.extend(ingest.drain(MediaKind::Video));
                audio.extend(ingest.drain(MediaKind::Audio));
                tokio::task::yield_now().await;
            }
            (video, audio)
        })
    };

    video_task.await.unwrap();
    audio_task.await.unwrap();
    let (mut video, mut audio) = drainer.await.unwrap();

    // Pick up whatever arrived after the drainer's last pass.
    video.extend(ingest.drain(MediaKind::Video));
    audio.extend(ingest.drain(MediaKind::Audio));

    assert_eq!(video.len(), FRAMES_PER_RECEIVER);
    assert_eq!(audio.len(), FRAMES_PER_RECEIVER);

    for (expected, packet) in video.iter().enumerate() {
        let seen = u32::from_be_bytes(packet.payload.as_ref().try_into().unwrap());
        assert_eq!(seen as usize, expected, "video order must survive drains");
    }
    for (expected, packet) in audio.iter().enumerate() {
        let seen = u32::from_be_bytes(packet.payload.as_ref().try_into().unwrap());
        assert_eq!(seen as usize, expected, "audio order must survive drains");
    }
}
