//! WebSocket receivers over a live listener: real client sockets
//! against the ingest router, with disconnects mid-stream.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use futures::SinkExt;
use livebridge_core::chunking::{ChunkScheduler, PipelineStats};
use livebridge_core::config::BridgeConfig;
use livebridge_core::ingest::{MediaKind, StreamIngest};
use livebridge_core::mux::{Muxer, ScriptedTranscoder};
use livebridge_server::{AppState, router};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

async fn serve(state: AppState) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    addr
}

async fn wait_for(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_one_stream_disconnect_leaves_the_other_receiving() {
    let ingest = Arc::new(StreamIngest::new());
    let state = AppState {
        ingest: Arc::clone(&ingest),
        stats: Arc::new(PipelineStats::new()),
        started_at: Instant::now(),
    };
    let addr = serve(state).await;

    let (mut video, _) = connect_async(format!("ws://{addr}/recall-video-endpoint"))
        .await
        .unwrap();
    let (mut audio, _) = connect_async(format!("ws://{addr}/recall-audio-endpoint"))
        .await
        .unwrap();

    video
        .send(WsMessage::binary(b"vid-1".to_vec()))
        .await
        .unwrap();
    wait_for("first video frame", || {
        ingest.buffered(MediaKind::Video) == 1
    })
    .await;

    // Audio arrives as a JSON envelope, the way the agent sends it.
    let envelope = format!(r#"{{"data": "{}"}}"#, BASE64_STANDARD.encode(b"aud-1"));
    audio.send(WsMessage::text(envelope)).await.unwrap();
    wait_for("first audio frame", || {
        ingest.buffered(MediaKind::Audio) == 1
    })
    .await;

    // Kill the video socket without a close handshake. Only its
    // receiver may die: the audio stream must keep flowing.
    drop(video);

    audio
        .send(WsMessage::binary(b"aud-2".to_vec()))
        .await
        .unwrap();
    wait_for("audio frame after video drop", || {
        ingest.buffered(MediaKind::Audio) == 2
    })
    .await;

    // Clean close on the audio side, then the agent reconnects both.
    audio.close(None).await.unwrap();

    let (mut video, _) = connect_async(format!("ws://{addr}/recall-video-endpoint"))
        .await
        .unwrap();
    video
        .send(WsMessage::binary(b"vid-2".to_vec()))
        .await
        .unwrap();
    wait_for("video frame after reconnect", || {
        ingest.buffered(MediaKind::Video) == 2
    })
    .await;

    // The header came from the very first video payload and survived
    // the disconnect.
    assert_eq!(ingest.stream_header().unwrap().as_ref(), b"vid-1");
}

#[tokio::test]
async fn test_chunks_keep_publishing_after_client_disconnect() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = BridgeConfig::for_testing();
    config.transcode.publish_dir = temp.path().join("chunks");
    config.transcode.temp_dir = temp.path().join("tmp");
    std::fs::create_dir_all(&config.transcode.publish_dir).unwrap();
    std::fs::create_dir_all(&config.transcode.temp_dir).unwrap();

    let ingest = Arc::new(StreamIngest::new());
    let stats = Arc::new(PipelineStats::new());
    let muxer = Muxer::new(
        Arc::new(ScriptedTranscoder::succeeding(4096)),
        config.transcode,
        config.ingest.clone(),
    );
    let scheduler = ChunkScheduler::new(
        Arc::clone(&ingest),
        muxer,
        config.chunking,
        Arc::clone(&stats),
    )
    .spawn();

    let state = AppState {
        ingest,
        stats: Arc::clone(&stats),
        started_at: Instant::now(),
    };
    let addr = serve(state).await;

    let (mut video, _) = connect_async(format!("ws://{addr}/recall-video-endpoint"))
        .await
        .unwrap();
    video
        .send(WsMessage::binary(b"frame-before".to_vec()))
        .await
        .unwrap();
    wait_for("first published chunk", || stats.published_chunks() >= 1).await;

    drop(video);

    let (mut video, _) = connect_async(format!("ws://{addr}/recall-video-endpoint"))
        .await
        .unwrap();
    video
        .send(WsMessage::binary(b"frame-after".to_vec()))
        .await
        .unwrap();
    wait_for("chunk published after disconnect", || {
        stats.published_chunks() >= 2
    })
    .await;

    scheduler.shutdown().await;
}
