//! Server assembly and process lifecycle.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::get;
use livebridge_core::chunking::{ChunkScheduler, PipelineStats};
use livebridge_core::config::BridgeConfig;
use livebridge_core::ingest::StreamIngest;
use livebridge_core::mux::{Muxer, Transcoder};
use tracing::info;

use crate::handlers::{audio_stream, health, video_stream};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub ingest: Arc<StreamIngest>,
    pub stats: Arc<PipelineStats>,
    pub started_at: Instant,
}

/// Builds the ingest router. Split out so tests can assemble the app
/// without binding a listener.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/recall-video-endpoint", get(video_stream))
        .route("/recall-audio-endpoint", get(audio_stream))
        .route("/health", get(health))
        .with_state(state)
}

/// Runs the bridge server until ctrl-c.
///
/// Startup-time resource acquisition is fatal: if the publish
/// directory cannot be created or the listener cannot bind, the
/// process does not start. Everything after that survives per-chunk
/// and per-connection failures indefinitely.
///
/// # Errors
///
/// Returns an error only for startup failures or a listener-level
/// serve error.
pub async fn run_server(
    config: BridgeConfig,
    transcoder: Arc<dyn Transcoder>,
) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&config.transcode.publish_dir)?;
    std::fs::create_dir_all(&config.transcode.temp_dir)?;

    let ingest = Arc::new(StreamIngest::new());
    let stats = Arc::new(PipelineStats::new());

    let muxer = Muxer::new(
        transcoder,
        config.transcode.clone(),
        config.ingest.clone(),
    );
    let scheduler = ChunkScheduler::new(
        Arc::clone(&ingest),
        muxer,
        config.chunking.clone(),
        Arc::clone(&stats),
    )
    .spawn();

    let state = AppState {
        ingest,
        stats,
        started_at: Instant::now(),
    };

    let listener = tokio::net::TcpListener::bind(&config.ingest.listen_addr).await?;
    info!(
        "Livebridge listening on {}, publishing chunks to {}",
        config.ingest.listen_addr,
        config.transcode.publish_dir.display()
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the scheduler so no in-flight transcoder outlives the
    // process.
    scheduler.shutdown().await;
    info!("Livebridge stopped");

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_router_builds_with_fresh_state() {
        let state = AppState {
            ingest: Arc::new(StreamIngest::new()),
            stats: Arc::new(PipelineStats::new()),
            started_at: Instant::now(),
        };

        // Route registration panics on conflicts; building the router
        // is the assertion.
        let _ = router(state);
    }
}
