//! Publish visibility: a chunk file either appears fully formed at its
//! final name or not at all.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use livebridge_core::chunking::{ChunkScheduler, PipelineStats};
use livebridge_core::config::BridgeConfig;
use livebridge_core::ingest::{InboundFrame, MediaKind, StreamIngest};
use livebridge_core::mux::{Muxer, ScriptedTranscoder, Transcoder};

fn watcher_visible(dir: &Path) -> Vec<String> {
    // The watcher contract: react to names that are not hidden and
    // carry the container extension.
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| !name.starts_with('.') && name.ends_with(".mp4"))
        .collect()
}

fn all_entries(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

async fn run_one_tick(transcoder: Arc<ScriptedTranscoder>, temp: &tempfile::TempDir) {
    let mut config = BridgeConfig::for_testing();
    config.transcode.publish_dir = temp.path().join("chunks");
    config.transcode.temp_dir = temp.path().join("tmp");
    std::fs::create_dir_all(&config.transcode.publish_dir).unwrap();
    std::fs::create_dir_all(&config.transcode.temp_dir).unwrap();

    let ingest = Arc::new(StreamIngest::new());
    let muxer = Muxer::new(transcoder, config.transcode, config.ingest);
    let mut scheduler = ChunkScheduler::new(
        Arc::clone(&ingest),
        muxer,
        config.chunking,
        Arc::new(PipelineStats::new()),
    );

    ingest.accept_frame(
        MediaKind::Video,
        InboundFrame::Binary(Bytes::from_static(b"frame")),
    );
    scheduler.tick().await;
}

#[tokio::test]
async fn test_successful_chunk_visible_only_at_final_name() {
    let temp = tempfile::tempdir().unwrap();
    let transcoder = Arc::new(ScriptedTranscoder::succeeding(4096));

    run_one_tick(Arc::clone(&transcoder), &temp).await;

    let chunks_dir = temp.path().join("chunks");
    let visible = watcher_visible(&chunks_dir);
    assert_eq!(visible.len(), 1);
    assert!(visible[0].starts_with("live_stream_"));

    // No hidden temp output or other intermediate left behind.
    assert_eq!(all_entries(&chunks_dir), visible);

    // The transcoder wrote to a hidden name inside the publish
    // directory, never to the final name directly.
    let job = &transcoder.jobs()[0];
    assert!(
        job.output
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with('.')
    );
    assert_eq!(job.output.parent().unwrap(), chunks_dir);
    assert!(!job.output.exists());
}

#[tokio::test]
async fn test_failed_chunk_leaves_publish_directory_untouched() {
    let temp = tempfile::tempdir().unwrap();
    let transcoder = Arc::new(ScriptedTranscoder::failing(2));

    run_one_tick(Arc::clone(&transcoder), &temp).await;

    let chunks_dir = temp.path().join("chunks");
    assert!(
        all_entries(&chunks_dir).is_empty(),
        "no file, hidden or visible, may remain after a failed chunk"
    );

    // Temp inputs were cleaned up; the diagnostic log survives.
    let job = &transcoder.jobs()[0];
    assert!(!job.video_input.exists());
    assert!(job.log.exists());
}

#[tokio::test]
async fn test_undersized_output_is_never_published() {
    let temp = tempfile::tempdir().unwrap();
    // Succeeds but writes less than the configured floor.
    let transcoder = Arc::new(ScriptedTranscoder::succeeding(16));

    let mut config = BridgeConfig::for_testing();
    config.transcode.publish_dir = temp.path().join("chunks");
    config.transcode.temp_dir = temp.path().join("tmp");
    config.transcode.min_output_bytes = 1024;
    std::fs::create_dir_all(&config.transcode.publish_dir).unwrap();
    std::fs::create_dir_all(&config.transcode.temp_dir).unwrap();

    let ingest = Arc::new(StreamIngest::new());
    let stats = Arc::new(PipelineStats::new());
    let muxer = Muxer::new(
        Arc::clone(&transcoder) as Arc<dyn Transcoder>,
        config.transcode,
        config.ingest,
    );
    let mut scheduler = ChunkScheduler::new(
        Arc::clone(&ingest),
        muxer,
        config.chunking,
        Arc::clone(&stats),
    );

    ingest.accept_frame(
        MediaKind::Video,
        InboundFrame::Binary(Bytes::from_static(b"frame")),
    );
    scheduler.tick().await;

    assert_eq!(stats.failed_chunks(), 1);
    assert!(all_entries(&temp.path().join("chunks")).is_empty());
}
