//! The periodic muxing task.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::PipelineStats;
use super::chunk::{Chunk, estimate_frame_rate, video_span};
use crate::config::ChunkingConfig;
use crate::ingest::{MediaKind, Packet, StreamIngest};
use crate::mux::Muxer;

/// Drains the media buffers on a fixed cadence and hands admitted
/// chunks to the muxer.
///
/// The loop runs for the lifetime of the process; neither an empty
/// tick nor a failed chunk stops it. A long transcode delays the next
/// tick rather than bursting ticks afterwards, so the transcoder wait
/// overlaps ongoing ingestion but never overlaps itself.
pub struct ChunkScheduler {
    ingest: Arc<StreamIngest>,
    muxer: Muxer,
    config: ChunkingConfig,
    stats: Arc<PipelineStats>,
    sequence: u64,
    consecutive_chunks: u32,
}

impl ChunkScheduler {
    pub fn new(
        ingest: Arc<StreamIngest>,
        muxer: Muxer,
        config: ChunkingConfig,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            ingest,
            muxer,
            config,
            stats,
            sequence: 0,
            consecutive_chunks: 0,
        }
    }

    /// Spawns the scheduling loop and returns a handle that stops it.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(shutdown_rx));
        SchedulerHandle {
            shutdown_tx: Some(shutdown_tx),
            task,
        }
    }

    async fn run(mut self, mut shutdown_rx: oneshot::Receiver<()>) {
        info!(
            "Chunk scheduler started: interval {:?}, min span {:?}",
            self.config.chunk_interval, self.config.min_video_span
        );

        let mut interval = tokio::time::interval(self.config.chunk_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately; skip it
        // so the first chunk covers a full period.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => self.tick().await,
                _ = &mut shutdown_rx => {
                    info!("Chunk scheduler shutting down");
                    break;
                }
            }
        }
    }

    /// Runs one scheduling pass: cooldown valve, drain, admission
    /// checks, mux.
    pub async fn tick(&mut self) {
        if self.consecutive_chunks >= self.config.cooldown_after_chunks {
            self.cooldown().await;
            return;
        }

        let video = self.ingest.drain(MediaKind::Video);
        let audio = self.ingest.drain(MediaKind::Audio);

        // Audio-only chunks are never produced; downstream analysis
        // requires video.
        if video.is_empty() {
            debug!("No video packets buffered, skipping tick");
            return;
        }

        let Some(chunk) = self.assemble(video, audio) else {
            return;
        };

        info!(
            "Processing chunk {}: {} video packets, {} audio packets, ~{:.1} fps",
            chunk.sequence,
            chunk.video.len(),
            chunk.audio.len(),
            chunk.frame_rate
        );

        let header = self.ingest.stream_header();
        match self.muxer.mux_chunk(&chunk, header.as_ref()).await {
            Ok(path) => {
                info!("Published chunk {}: {}", chunk.sequence, path.display());
                self.stats.record_published();
                self.consecutive_chunks += 1;
            }
            Err(e) => {
                // A missed chunk's data is permanently lost; the next
                // tick proceeds independently.
                error!("Failed to mux chunk {}: {e}", chunk.sequence);
                self.stats.record_failed();
            }
        }
    }

    /// Applies admission checks and assembles the chunk, advancing the
    /// sequence counter only for admitted chunks.
    fn assemble(&mut self, video: Vec<Packet>, audio: Vec<Packet>) -> Option<Chunk> {
        let span = video_span(&video);
        if span < self.config.min_video_span {
            warn!(
                "Discarding tick: video span {span:?} below minimum {:?}",
                self.config.min_video_span
            );
            self.stats.record_discarded_tick();
            return None;
        }

        let frame_rate = estimate_frame_rate(
            &video,
            self.config.min_frame_rate,
            self.config.max_frame_rate,
        );

        let sequence = self.sequence;
        self.sequence += 1;

        Some(Chunk {
            sequence,
            video,
            audio,
            frame_rate,
        })
    }

    /// Backpressure valve: pause, then shed whatever accumulated
    /// during the pause. A deliberately lossy policy that bounds
    /// resource growth instead of queueing indefinitely.
    async fn cooldown(&mut self) {
        warn!(
            "Cooling down for {:?} after {} consecutive chunks",
            self.config.cooldown_duration, self.consecutive_chunks
        );
        tokio::time::sleep(self.config.cooldown_duration).await;

        let video = self.ingest.drain(MediaKind::Video);
        let audio = self.ingest.drain(MediaKind::Audio);
        if !video.is_empty() || !audio.is_empty() {
            warn!(
                "Discarded {} video and {} audio packets accumulated during cooldown",
                video.len(),
                audio.len()
            );
        }
        self.consecutive_chunks = 0;
    }

    /// Next sequence number to be assigned; advanced only when a chunk
    /// passes admission.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Stops the scheduling loop on demand.
///
/// Dropping the handle without calling [`shutdown`](Self::shutdown)
/// also stops the loop, since the shutdown sender closes.
pub struct SchedulerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signals the loop to stop and waits for it to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!("Chunk scheduler task ended abnormally: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use bytes::Bytes;

    use super::*;
    use crate::config::{BridgeConfig, ChunkingConfig};
    use crate::ingest::InboundFrame;
    use crate::mux::{Muxer, ScriptedTranscoder};

    fn test_scheduler(temp: &tempfile::TempDir) -> (ChunkScheduler, Arc<StreamIngest>) {
        let mut config = BridgeConfig::for_testing();
        config.transcode.publish_dir = temp.path().join("chunks");
        config.transcode.temp_dir = temp.path().join("tmp");
        std::fs::create_dir_all(&config.transcode.publish_dir).unwrap();
        std::fs::create_dir_all(&config.transcode.temp_dir).unwrap();

        let ingest = Arc::new(StreamIngest::new());
        let muxer = Muxer::new(
            Arc::new(ScriptedTranscoder::succeeding(2048)),
            config.transcode,
            config.ingest,
        );
        let scheduler = ChunkScheduler::new(
            Arc::clone(&ingest),
            muxer,
            config.chunking,
            Arc::new(PipelineStats::new()),
        );
        (scheduler, ingest)
    }

    #[tokio::test]
    async fn test_empty_tick_does_not_advance_sequence() {
        let temp = tempfile::tempdir().unwrap();
        let (mut scheduler, _ingest) = test_scheduler(&temp);

        scheduler.tick().await;

        assert_eq!(scheduler.sequence(), 0);
    }

    #[tokio::test]
    async fn test_tick_with_video_publishes_and_advances() {
        let temp = tempfile::tempdir().unwrap();
        let (mut scheduler, ingest) = test_scheduler(&temp);

        ingest.accept_frame(
            MediaKind::Video,
            InboundFrame::Binary(Bytes::from_static(b"frame")),
        );
        scheduler.tick().await;

        assert_eq!(scheduler.sequence(), 1);
        assert_eq!(scheduler.stats.published_chunks(), 1);
    }

    #[tokio::test]
    async fn test_below_minimum_span_discards_tick() {
        let temp = tempfile::tempdir().unwrap();
        let (mut scheduler, ingest) = test_scheduler(&temp);
        scheduler.config.min_video_span = Duration::from_secs(5);

        // Two packets captured back to back: span far below 5 seconds.
        for _ in 0..2 {
            ingest.accept_frame(
                MediaKind::Video,
                InboundFrame::Binary(Bytes::from_static(b"frame")),
            );
        }
        scheduler.tick().await;

        assert_eq!(scheduler.sequence(), 0);
        assert_eq!(scheduler.stats.discarded_ticks(), 1);
        assert_eq!(scheduler.stats.published_chunks(), 0);
    }

    #[tokio::test]
    async fn test_cooldown_sheds_buffered_packets() {
        let temp = tempfile::tempdir().unwrap();
        let (mut scheduler, ingest) = test_scheduler(&temp);
        scheduler.config.cooldown_after_chunks = 1;
        scheduler.config.cooldown_duration = Duration::ZERO;
        scheduler.consecutive_chunks = 1;

        ingest.accept_frame(
            MediaKind::Video,
            InboundFrame::Binary(Bytes::from_static(b"stale")),
        );
        scheduler.tick().await;

        // The cooldown tick discards everything and publishes nothing.
        assert_eq!(ingest.buffered(MediaKind::Video), 0);
        assert_eq!(scheduler.sequence(), 0);
        assert_eq!(scheduler.consecutive_chunks, 0);
    }

    #[tokio::test]
    async fn test_mux_failure_does_not_stop_scheduling() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = BridgeConfig::for_testing();
        config.transcode.publish_dir = temp.path().join("chunks");
        config.transcode.temp_dir = temp.path().join("tmp");
        std::fs::create_dir_all(&config.transcode.publish_dir).unwrap();
        std::fs::create_dir_all(&config.transcode.temp_dir).unwrap();

        let ingest = Arc::new(StreamIngest::new());
        let muxer = Muxer::new(
            Arc::new(ScriptedTranscoder::failing(1)),
            config.transcode,
            config.ingest,
        );
        let stats = Arc::new(PipelineStats::new());
        let mut scheduler = ChunkScheduler::new(
            Arc::clone(&ingest),
            muxer,
            ChunkingConfig {
                min_video_span: Duration::ZERO,
                ..ChunkingConfig::default()
            },
            Arc::clone(&stats),
        );

        for _ in 0..2 {
            ingest.accept_frame(
                MediaKind::Video,
                InboundFrame::Binary(Bytes::from_static(b"frame")),
            );
            scheduler.tick().await;
        }

        // Both ticks failed, both advanced the counter, loop survived.
        assert_eq!(stats.failed_chunks(), 2);
        assert_eq!(scheduler.sequence(), 2);
    }

    #[test]
    fn test_assemble_estimates_frame_rate() {
        let temp = tempfile::tempdir().unwrap();
        let (mut scheduler, _ingest) = test_scheduler(&temp);

        let start = Instant::now() - Duration::from_secs(10);
        let video: Vec<Packet> = (0..100)
            .map(|i| Packet {
                payload: Bytes::from_static(b"frame"),
                captured_at: start + Duration::from_millis(i * 100),
            })
            .collect();

        let chunk = scheduler.assemble(video, Vec::new()).unwrap();

        assert!((chunk.frame_rate - 10.0).abs() < 0.2);
        assert!(!chunk.has_audio());
    }
}
