//! Centralized configuration for Livebridge.
//!
//! All tunable parameters are defined here to avoid hard-coded values
//! scattered throughout the codebase. The original bridge accumulated
//! several inconsistent variants of these knobs; they are fixed as
//! explicit defaults with environment overrides.

use std::path::PathBuf;
use std::time::Duration;

/// Central configuration for all Livebridge components.
///
/// Groups related settings into logical sections and supports
/// environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    pub ingest: IngestConfig,
    pub chunking: ChunkingConfig,
    pub transcode: TranscodeConfig,
}

/// Inbound stream and raw audio format configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Listen address for the WebSocket ingest endpoints
    pub listen_addr: String,
    /// Sample rate of the inbound raw PCM audio
    pub audio_sample_rate: u32,
    /// Channel count of the inbound raw PCM audio
    pub audio_channels: u8,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:5000".to_string(),
            audio_sample_rate: 16_000,
            audio_channels: 1,
        }
    }
}

/// Chunk scheduling configuration.
///
/// Controls the muxing cadence, admission thresholds, and the lossy
/// backpressure valve.
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Period between scheduler ticks
    pub chunk_interval: Duration,
    /// Minimum video packet span for a tick to be admitted
    /// (zero disables the check)
    pub min_video_span: Duration,
    /// Lower clamp for the estimated source frame rate
    pub min_frame_rate: f64,
    /// Upper clamp for the estimated source frame rate
    pub max_frame_rate: f64,
    /// Consecutive successful chunks before a forced cooldown
    pub cooldown_after_chunks: u32,
    /// Length of the cooldown pause; buffered packets accumulated
    /// during the pause are discarded
    pub cooldown_duration: Duration,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_interval: Duration::from_secs(10),
            min_video_span: Duration::from_secs(1),
            min_frame_rate: 1.0,
            max_frame_rate: 60.0,
            cooldown_after_chunks: 10,
            cooldown_duration: Duration::from_secs(10),
        }
    }
}

/// External transcoder and publish configuration.
#[derive(Debug, Clone)]
pub struct TranscodeConfig {
    /// Transcoder binary invoked per chunk
    pub ffmpeg_binary: String,
    /// Directory where finished chunks are published
    pub publish_dir: PathBuf,
    /// Directory for temporary elementary-stream inputs and logs
    pub temp_dir: PathBuf,
    /// Video codec: "copy" to avoid re-encoding, or e.g. "libx264"
    pub video_codec: String,
    /// Audio codec used when the chunk carries audio
    pub audio_codec: String,
    /// Optimize output for playback start (moov atom up front)
    pub faststart: bool,
    /// Optional trim window to discard transcoder warm-up artifacts
    pub trim: Option<TrimWindow>,
    /// Minimum size for a transcoder output to count as success
    pub min_output_bytes: u64,
    /// Keep temporary input files when a chunk fails, for diagnosis.
    /// The per-chunk transcoder log is always kept on failure.
    pub keep_failed_inputs: bool,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_binary: "ffmpeg".to_string(),
            publish_dir: PathBuf::from("chunks"),
            temp_dir: std::env::temp_dir(),
            video_codec: "copy".to_string(),
            audio_codec: "aac".to_string(),
            faststart: true,
            trim: None,
            min_output_bytes: 1024,
            keep_failed_inputs: false,
        }
    }
}

/// Trim window applied to the transcoder output: skip a leading
/// offset, keep a fixed duration.
#[derive(Debug, Clone, Copy)]
pub struct TrimWindow {
    pub skip: Duration,
    pub keep: Duration,
}

impl BridgeConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via `LIVEBRIDGE_*` variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("LIVEBRIDGE_LISTEN_ADDR") {
            config.ingest.listen_addr = addr;
        }

        if let Ok(interval) = std::env::var("LIVEBRIDGE_CHUNK_INTERVAL") {
            if let Ok(seconds) = interval.parse::<u64>() {
                config.chunking.chunk_interval = Duration::from_secs(seconds);
            }
        }

        if let Ok(span) = std::env::var("LIVEBRIDGE_MIN_VIDEO_SPAN_MS") {
            if let Ok(millis) = span.parse::<u64>() {
                config.chunking.min_video_span = Duration::from_millis(millis);
            }
        }

        if let Ok(rate) = std::env::var("LIVEBRIDGE_AUDIO_SAMPLE_RATE") {
            if let Ok(hz) = rate.parse::<u32>() {
                config.ingest.audio_sample_rate = hz;
            }
        }

        if let Ok(channels) = std::env::var("LIVEBRIDGE_AUDIO_CHANNELS") {
            if let Ok(count) = channels.parse::<u8>() {
                config.ingest.audio_channels = count;
            }
        }

        if let Ok(min) = std::env::var("LIVEBRIDGE_MIN_FRAME_RATE") {
            if let Ok(fps) = min.parse::<f64>() {
                config.chunking.min_frame_rate = fps;
            }
        }

        if let Ok(max) = std::env::var("LIVEBRIDGE_MAX_FRAME_RATE") {
            if let Ok(fps) = max.parse::<f64>() {
                config.chunking.max_frame_rate = fps;
            }
        }

        if let Ok(chunks) = std::env::var("LIVEBRIDGE_COOLDOWN_CHUNKS") {
            if let Ok(count) = chunks.parse::<u32>() {
                config.chunking.cooldown_after_chunks = count;
            }
        }

        if let Ok(pause) = std::env::var("LIVEBRIDGE_COOLDOWN_SECS") {
            if let Ok(seconds) = pause.parse::<u64>() {
                config.chunking.cooldown_duration = Duration::from_secs(seconds);
            }
        }

        if let Ok(codec) = std::env::var("LIVEBRIDGE_VIDEO_CODEC") {
            config.transcode.video_codec = codec;
        }

        if let Ok(codec) = std::env::var("LIVEBRIDGE_AUDIO_CODEC") {
            config.transcode.audio_codec = codec;
        }

        if let Ok(faststart) = std::env::var("LIVEBRIDGE_FASTSTART") {
            config.transcode.faststart = faststart.parse().unwrap_or(true);
        }

        // The trim window only makes sense with both halves present.
        if let (Ok(skip), Ok(keep)) = (
            std::env::var("LIVEBRIDGE_TRIM_SKIP_MS"),
            std::env::var("LIVEBRIDGE_TRIM_KEEP_MS"),
        ) {
            if let (Ok(skip), Ok(keep)) = (skip.parse::<u64>(), keep.parse::<u64>()) {
                config.transcode.trim = Some(TrimWindow {
                    skip: Duration::from_millis(skip),
                    keep: Duration::from_millis(keep),
                });
            }
        }

        if let Ok(binary) = std::env::var("LIVEBRIDGE_FFMPEG") {
            config.transcode.ffmpeg_binary = binary;
        }

        if let Ok(dir) = std::env::var("LIVEBRIDGE_PUBLISH_DIR") {
            config.transcode.publish_dir = PathBuf::from(dir);
        }

        if let Ok(min) = std::env::var("LIVEBRIDGE_MIN_OUTPUT_BYTES") {
            if let Ok(bytes) = min.parse::<u64>() {
                config.transcode.min_output_bytes = bytes;
            }
        }

        if let Ok(keep) = std::env::var("LIVEBRIDGE_KEEP_FAILED_INPUTS") {
            config.transcode.keep_failed_inputs = keep.parse().unwrap_or(false);
        }

        config
    }

    /// Creates a configuration optimized for testing: short intervals,
    /// no admission threshold, tiny output floor.
    pub fn for_testing() -> Self {
        Self {
            chunking: ChunkingConfig {
                chunk_interval: Duration::from_millis(50),
                min_video_span: Duration::ZERO,
                cooldown_after_chunks: u32::MAX,
                ..ChunkingConfig::default()
            },
            transcode: TranscodeConfig {
                min_output_bytes: 1,
                ..TranscodeConfig::default()
            },
            ..Self::default()
        }
    }
}
