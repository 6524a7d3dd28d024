//! Chunk muxing: temp input serialization, transcoder invocation,
//! validation, and atomic publish.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use super::transcoder::{TranscodeJob, Transcoder};
use super::{MuxError, MuxResult};
use crate::chunking::Chunk;
use crate::config::{IngestConfig, TranscodeConfig};
use crate::ingest::Packet;

/// Turns one drained chunk into a published MP4 file.
///
/// The output is written under a hidden temp name inside the publish
/// directory and moved to its final name with one `rename`, so the
/// directory watcher that reacts to new chunk files can never observe
/// a partially written one.
pub struct Muxer {
    transcoder: Arc<dyn Transcoder>,
    config: TranscodeConfig,
    audio_sample_rate: u32,
    audio_channels: u8,
}

/// Per-chunk scratch paths, namespaced by timestamp and sequence so
/// overlapping ticks can never collide.
struct ChunkPaths {
    temp_video: PathBuf,
    temp_audio: PathBuf,
    log: PathBuf,
    temp_output: PathBuf,
    published: PathBuf,
}

impl Muxer {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        config: TranscodeConfig,
        ingest: IngestConfig,
    ) -> Self {
        Self {
            transcoder,
            config,
            audio_sample_rate: ingest.audio_sample_rate,
            audio_channels: ingest.audio_channels,
        }
    }

    /// Muxes one chunk and publishes it atomically.
    ///
    /// Returns the final published path. On any failure the publish
    /// directory is left without a new visible entry; the transcoder
    /// log is retained for diagnosis, and temp inputs are removed
    /// unless `keep_failed_inputs` is set.
    ///
    /// # Errors
    ///
    /// - `MuxError::TranscoderFailed` - non-zero transcoder exit
    /// - `MuxError::MissingOutput` - exit 0 but no output file
    /// - `MuxError::UndersizedOutput` - output below the size floor
    /// - `MuxError::Io` - temp write or rename failure
    pub async fn mux_chunk(&self, chunk: &Chunk, header: Option<&Bytes>) -> MuxResult<PathBuf> {
        let paths = self.chunk_paths(chunk.sequence);

        let result = self.mux_inner(chunk, header, &paths).await;

        match &result {
            Ok(_) => {
                // Success path: inputs and log have served their purpose.
                remove_quietly(&paths.temp_video);
                remove_quietly(&paths.temp_audio);
                remove_quietly(&paths.log);
            }
            Err(_) => {
                remove_quietly(&paths.temp_output);
                if !self.config.keep_failed_inputs {
                    remove_quietly(&paths.temp_video);
                    remove_quietly(&paths.temp_audio);
                }
                // The log stays for diagnosis.
            }
        }

        result
    }

    async fn mux_inner(
        &self,
        chunk: &Chunk,
        header: Option<&Bytes>,
        paths: &ChunkPaths,
    ) -> MuxResult<PathBuf> {
        self.write_video_input(&paths.temp_video, header, &chunk.video)
            .await?;

        let audio_input = if chunk.has_audio() {
            write_concatenated(&paths.temp_audio, &chunk.audio).await?;
            Some(paths.temp_audio.clone())
        } else {
            None
        };

        let job = TranscodeJob {
            video_input: paths.temp_video.clone(),
            audio_input,
            output: paths.temp_output.clone(),
            log: paths.log.clone(),
            frame_rate_hint: chunk.frame_rate,
            audio_sample_rate: self.audio_sample_rate,
            audio_channels: self.audio_channels,
            video_codec: self.config.video_codec.clone(),
            audio_codec: self.config.audio_codec.clone(),
            faststart: self.config.faststart,
            trim: self.config.trim,
        };

        self.transcoder.run(&job).await?;
        self.validate_output(&paths.temp_output)?;

        tokio::fs::rename(&paths.temp_output, &paths.published)
            .await
            .map_err(|e| MuxError::io("publish chunk", e))?;

        Ok(paths.published.clone())
    }

    /// Temp video input: stream header first (when captured), then the
    /// chunk's payloads in arrival order, so every chunk starts with
    /// the codec parameter sets and stays decodable on its own.
    async fn write_video_input(
        &self,
        path: &Path,
        header: Option<&Bytes>,
        packets: &[Packet],
    ) -> MuxResult<()> {
        let header_len = header.map_or(0, |h| h.len());
        let total: usize = header_len + packets.iter().map(|p| p.payload.len()).sum::<usize>();

        let mut data = Vec::with_capacity(total);
        if let Some(header) = header {
            data.extend_from_slice(header);
        }
        for packet in packets {
            data.extend_from_slice(&packet.payload);
        }

        tokio::fs::write(path, data)
            .await
            .map_err(|e| MuxError::io("write temp video input", e))
    }

    fn validate_output(&self, path: &Path) -> MuxResult<()> {
        let size = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(_) => {
                return Err(MuxError::MissingOutput {
                    path: path.to_path_buf(),
                });
            }
        };

        if size < self.config.min_output_bytes {
            return Err(MuxError::UndersizedOutput {
                size,
                minimum: self.config.min_output_bytes,
            });
        }

        debug!("Transcoder output validated: {} bytes", size);
        Ok(())
    }

    fn chunk_paths(&self, sequence: u64) -> ChunkPaths {
        let stamp = chrono::Utc::now().timestamp_millis();
        let base = format!("chunk_{stamp}_{sequence}");
        let published_name = format!("live_stream_{stamp}_{sequence}.mp4");

        ChunkPaths {
            temp_video: self.config.temp_dir.join(format!("{base}.h264")),
            temp_audio: self.config.temp_dir.join(format!("{base}.pcm")),
            log: self.config.temp_dir.join(format!("{base}.ffmpeg.log")),
            // Hidden name in the publish directory: same filesystem as
            // the final name, so the rename is atomic, and the leading
            // dot keeps the watcher away until then.
            temp_output: self
                .config
                .publish_dir
                .join(format!(".{published_name}.tmp")),
            published: self.config.publish_dir.join(published_name),
        }
    }
}

async fn write_concatenated(path: &Path, packets: &[Packet]) -> MuxResult<()> {
    let total: usize = packets.iter().map(|p| p.payload.len()).sum();
    let mut data = Vec::with_capacity(total);
    for packet in packets {
        data.extend_from_slice(&packet.payload);
    }
    tokio::fs::write(path, data)
        .await
        .map_err(|e| MuxError::io("write temp audio input", e))
}

fn remove_quietly(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove {}: {e}", path.display());
        }
    }
}
