//! Livebridge Core - Stream ingestion and chunk muxing pipeline
//!
//! This crate provides the building blocks for bridging a live meeting
//! recording into short, independently playable MP4 chunks: payload
//! extraction from inbound frames, ordered media buffering with an
//! atomic drain, periodic chunk scheduling, and muxing through an
//! external transcoder process.

pub mod chunking;
pub mod config;
pub mod ingest;
pub mod mux;

// Re-export main types for convenient access
pub use chunking::{ChunkScheduler, PipelineStats, SchedulerHandle};
pub use config::BridgeConfig;
pub use ingest::{InboundFrame, MediaKind, StreamIngest};
pub use mux::{FfmpegTranscoder, MuxError, Muxer, Transcoder};

/// Core errors that can bubble up from any Livebridge subsystem.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Mux error: {0}")]
    Mux(#[from] MuxError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
