//! Periodic chunk scheduling.
//!
//! A single background task drains the media buffers on a fixed
//! cadence, applies admission checks, and hands each admitted chunk
//! to the muxer. Chunk failures never stop the loop.

pub mod chunk;
pub mod scheduler;

use std::sync::atomic::{AtomicU64, Ordering};

pub use chunk::{Chunk, estimate_frame_rate, video_span};
pub use scheduler::{ChunkScheduler, SchedulerHandle};

/// Shared pipeline counters, updated by the scheduler and exposed by
/// the health endpoint.
#[derive(Debug, Default)]
pub struct PipelineStats {
    published_chunks: AtomicU64,
    failed_chunks: AtomicU64,
    discarded_ticks: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_published(&self) {
        self.published_chunks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed_chunks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded_tick(&self) {
        self.discarded_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn published_chunks(&self) -> u64 {
        self.published_chunks.load(Ordering::Relaxed)
    }

    pub fn failed_chunks(&self) -> u64 {
        self.failed_chunks.load(Ordering::Relaxed)
    }

    pub fn discarded_ticks(&self) -> u64 {
        self.discarded_ticks.load(Ordering::Relaxed)
    }
}
