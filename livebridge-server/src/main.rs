//! Livebridge - meeting stream ingestion and chunking bridge.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use livebridge_core::config::BridgeConfig;
use livebridge_core::mux::{FfmpegTranscoder, Transcoder};
use tracing::warn;

#[derive(Parser)]
#[command(name = "livebridge")]
#[command(about = "Ingests live meeting streams and muxes them into playable chunks")]
struct Cli {
    /// Listen address for the WebSocket ingest endpoints
    #[arg(long)]
    listen: Option<String>,

    /// Directory where finished chunks are published
    #[arg(long)]
    publish_dir: Option<PathBuf>,

    /// Seconds between chunk scheduler ticks
    #[arg(long)]
    chunk_interval: Option<u64>,

    /// Transcoder binary to invoke per chunk
    #[arg(long)]
    ffmpeg: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = BridgeConfig::from_env();

    if let Some(listen) = cli.listen {
        config.ingest.listen_addr = listen;
    }
    if let Some(dir) = cli.publish_dir {
        config.transcode.publish_dir = dir;
    }
    if let Some(seconds) = cli.chunk_interval {
        config.chunking.chunk_interval = Duration::from_secs(seconds);
    }
    if let Some(binary) = cli.ffmpeg {
        config.transcode.ffmpeg_binary = binary;
    }

    let transcoder: Arc<dyn Transcoder> =
        Arc::new(FfmpegTranscoder::new(config.transcode.ffmpeg_binary.clone()));
    if !transcoder.is_available() {
        warn!(
            "Transcoder binary '{}' not found; chunks will fail until it is installed",
            config.transcode.ffmpeg_binary
        );
    }

    livebridge_server::run_server(config, transcoder).await
}
