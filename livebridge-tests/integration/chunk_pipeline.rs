//! End-to-end pipeline: wire frames in, published chunks out.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use bytes::Bytes;
use livebridge_core::chunking::{ChunkScheduler, PipelineStats};
use livebridge_core::config::BridgeConfig;
use livebridge_core::ingest::{InboundFrame, MediaKind, StreamIngest};
use livebridge_core::mux::{Muxer, ScriptedTranscoder, Transcoder};

struct Pipeline {
    ingest: Arc<StreamIngest>,
    scheduler: ChunkScheduler,
    stats: Arc<PipelineStats>,
    transcoder: Arc<ScriptedTranscoder>,
    _temp: tempfile::TempDir,
    publish_dir: std::path::PathBuf,
}

fn pipeline(transcoder: ScriptedTranscoder) -> Pipeline {
    let temp = tempfile::tempdir().unwrap();
    let mut config = BridgeConfig::for_testing();
    config.transcode.publish_dir = temp.path().join("chunks");
    config.transcode.temp_dir = temp.path().join("tmp");
    std::fs::create_dir_all(&config.transcode.publish_dir).unwrap();
    std::fs::create_dir_all(&config.transcode.temp_dir).unwrap();

    let publish_dir = config.transcode.publish_dir.clone();
    let ingest = Arc::new(StreamIngest::new());
    let stats = Arc::new(PipelineStats::new());
    let transcoder = Arc::new(transcoder);
    let muxer = Muxer::new(
        Arc::clone(&transcoder) as Arc<dyn Transcoder>,
        config.transcode,
        config.ingest,
    );
    let scheduler = ChunkScheduler::new(
        Arc::clone(&ingest),
        muxer,
        config.chunking,
        Arc::clone(&stats),
    );

    Pipeline {
        ingest,
        scheduler,
        stats,
        transcoder,
        _temp: temp,
        publish_dir,
    }
}

fn published_chunks(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| !name.starts_with('.') && name.ends_with(".mp4"))
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_wire_frames_flow_through_to_published_chunk() {
    let mut p = pipeline(ScriptedTranscoder::succeeding(4096));

    // Mixed wire shapes, the way the agent actually sends them.
    p.ingest.accept_frame(
        MediaKind::Video,
        InboundFrame::Binary(Bytes::from_static(b"\x00\x00\x00\x01sps")),
    );
    let nested = format!(
        r#"{{"data": {{"data": {{"buffer": "{}"}}}}}}"#,
        BASE64_STANDARD.encode(b"video-frame-2")
    );
    p.ingest
        .accept_frame(MediaKind::Video, InboundFrame::Text(nested));
    let flat = format!(
        r#"{{"data": "{}"}}"#,
        BASE64_STANDARD.encode(b"audio-samples")
    );
    p.ingest
        .accept_frame(MediaKind::Audio, InboundFrame::Text(flat));

    p.scheduler.tick().await;

    assert_eq!(p.stats.published_chunks(), 1);
    let published = published_chunks(&p.publish_dir);
    assert_eq!(published.len(), 1);
    assert!(published[0].starts_with("live_stream_"));

    let job = &p.transcoder.jobs()[0];
    assert!(job.audio_input.is_some());
    assert_eq!(job.audio_sample_rate, 16_000);
    assert_eq!(job.audio_channels, 1);
}

#[tokio::test]
async fn test_audio_only_ticks_produce_no_chunk() {
    let mut p = pipeline(ScriptedTranscoder::succeeding(4096));

    p.ingest.accept_frame(
        MediaKind::Audio,
        InboundFrame::Binary(Bytes::from_static(b"pcm")),
    );
    p.scheduler.tick().await;

    assert_eq!(p.stats.published_chunks(), 0);
    assert!(published_chunks(&p.publish_dir).is_empty());
    assert_eq!(p.scheduler.sequence(), 0);
    // The drained audio is gone either way; live-stream semantics.
    assert_eq!(p.ingest.buffered(MediaKind::Audio), 0);
}

#[tokio::test]
async fn test_header_from_first_tick_prefixes_later_chunks() {
    // Failing transcoder with retained inputs lets us read back the
    // temp video file the muxer built for the second tick.
    let temp = tempfile::tempdir().unwrap();
    let mut config = BridgeConfig::for_testing();
    config.transcode.publish_dir = temp.path().join("chunks");
    config.transcode.temp_dir = temp.path().join("tmp");
    config.transcode.keep_failed_inputs = true;
    std::fs::create_dir_all(&config.transcode.publish_dir).unwrap();
    std::fs::create_dir_all(&config.transcode.temp_dir).unwrap();

    let ingest = Arc::new(StreamIngest::new());
    let transcoder = Arc::new(ScriptedTranscoder::failing(1));
    let muxer = Muxer::new(
        Arc::clone(&transcoder) as Arc<dyn Transcoder>,
        config.transcode,
        config.ingest,
    );
    let mut scheduler = ChunkScheduler::new(
        Arc::clone(&ingest),
        muxer,
        config.chunking,
        Arc::new(PipelineStats::new()),
    );

    // Tick 1 captures the header.
    ingest.accept_frame(
        MediaKind::Video,
        InboundFrame::Binary(Bytes::from_static(b"HEADER")),
    );
    scheduler.tick().await;

    // Tick 2 sees only its own packets, yet its input must still start
    // with the cached header.
    ingest.accept_frame(
        MediaKind::Video,
        InboundFrame::Binary(Bytes::from_static(b"tick2-frame")),
    );
    scheduler.tick().await;

    let jobs = transcoder.jobs();
    assert_eq!(jobs.len(), 2);
    let second_input = std::fs::read(&jobs[1].video_input).unwrap();
    assert_eq!(second_input, b"HEADERtick2-frame");
}

#[tokio::test]
async fn test_failed_chunks_do_not_block_following_ones() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = BridgeConfig::for_testing();
    config.transcode.publish_dir = temp.path().join("chunks");
    config.transcode.temp_dir = temp.path().join("tmp");
    std::fs::create_dir_all(&config.transcode.publish_dir).unwrap();
    std::fs::create_dir_all(&config.transcode.temp_dir).unwrap();

    let ingest = Arc::new(StreamIngest::new());
    let stats = Arc::new(PipelineStats::new());
    let failing = Arc::new(ScriptedTranscoder::failing(1));
    let muxer = Muxer::new(Arc::clone(&failing) as Arc<dyn Transcoder>, config.transcode, config.ingest);
    let mut scheduler = ChunkScheduler::new(
        Arc::clone(&ingest),
        muxer,
        config.chunking,
        Arc::clone(&stats),
    );

    for _ in 0..3 {
        ingest.accept_frame(
            MediaKind::Video,
            InboundFrame::Binary(Bytes::from_static(b"frame")),
        );
        scheduler.tick().await;
    }

    assert_eq!(stats.failed_chunks(), 3);
    assert_eq!(scheduler.sequence(), 3, "counter advances past failures");
}
