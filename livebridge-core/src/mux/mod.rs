//! Chunk muxing through an external transcoder process.
//!
//! The muxer serializes drained packets to temporary elementary-stream
//! files, invokes the transcoder with derived timing parameters,
//! validates the result, and publishes it with a single atomic rename
//! so a directory watcher never observes a partial file.

pub mod muxer;
pub mod transcoder;

use std::path::PathBuf;

pub use muxer::Muxer;
pub use transcoder::{FfmpegTranscoder, ScriptedTranscoder, TranscodeJob, Transcoder};

/// Errors from the muxing path. All of them are survivable: the
/// scheduler logs the failure and moves on to the next tick.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    #[error("Transcoder failed with exit code {code:?}, log retained at {}", log.display())]
    TranscoderFailed { code: Option<i32>, log: PathBuf },

    #[error("Transcoder produced no output at {}", path.display())]
    MissingOutput { path: PathBuf },

    #[error("Transcoder output too small: {size} bytes, minimum {minimum}")]
    UndersizedOutput { size: u64, minimum: u64 },

    #[error("I/O error during {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

impl MuxError {
    pub(crate) fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

pub type MuxResult<T> = Result<T, MuxError>;
