//! WebSocket receivers and the health endpoint.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::{IntoResponse, Json};
use livebridge_core::ingest::{InboundFrame, MediaKind};
use serde::Serialize;
use tracing::{info, warn};

use crate::server::AppState;

/// Upgrade handler for the video stream endpoint.
pub async fn video_stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| receive_stream(socket, state, MediaKind::Video))
}

/// Upgrade handler for the audio stream endpoint.
pub async fn audio_stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| receive_stream(socket, state, MediaKind::Audio))
}

/// Per-connection receiver loop.
///
/// Runs until the peer disconnects or the transport errors. Either
/// ending is local to this receiver: the sibling stream and the chunk
/// scheduler keep running, and nothing propagates to the process.
async fn receive_stream(mut socket: WebSocket, state: AppState, kind: MediaKind) {
    info!("{kind} stream connected");

    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                warn!("{kind} stream transport error: {e}");
                break;
            }
        };

        match message {
            Message::Binary(data) => {
                state.ingest.accept_frame(kind, InboundFrame::Binary(data));
            }
            Message::Text(text) => {
                state
                    .ingest
                    .accept_frame(kind, InboundFrame::Text(text.to_string()));
            }
            Message::Close(_) => {
                info!("{kind} stream disconnected cleanly");
                break;
            }
            // Ping/pong are answered by axum itself.
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    info!("{kind} receiver stopped");
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub uptime_seconds: u64,
    pub buffered_video_packets: usize,
    pub buffered_audio_packets: usize,
    pub stream_header_captured: bool,
    pub published_chunks: u64,
    pub failed_chunks: u64,
    pub discarded_ticks: u64,
}

/// Liveness and pipeline statistics.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        uptime_seconds: state.started_at.elapsed().as_secs(),
        buffered_video_packets: state.ingest.buffered(MediaKind::Video),
        buffered_audio_packets: state.ingest.buffered(MediaKind::Audio),
        stream_header_captured: state.ingest.stream_header().is_some(),
        published_chunks: state.stats.published_chunks(),
        failed_chunks: state.stats.failed_chunks(),
        discarded_ticks: state.stats.discarded_ticks(),
    })
}
