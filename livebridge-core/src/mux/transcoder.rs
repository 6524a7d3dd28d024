//! Transcoder abstraction for both production and test use.
//!
//! The muxer only needs file paths in, exit status out; keeping the
//! interface that narrow lets tests substitute a scripted transcoder
//! without invoking real media tooling.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{MuxError, MuxResult};
use crate::config::TrimWindow;

/// One transcoding invocation: elementary-stream inputs, format hints,
/// and the output/log destinations.
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    /// Raw H.264 elementary video input
    pub video_input: PathBuf,
    /// Raw PCM audio input, when the chunk carries audio
    pub audio_input: Option<PathBuf>,
    /// Output file; hidden temp name, renamed by the muxer on success
    pub output: PathBuf,
    /// Destination for the transcoder's stdout/stderr
    pub log: PathBuf,
    /// Estimated source frame rate for the raw video demuxer
    pub frame_rate_hint: f64,
    /// PCM sample rate of the audio input
    pub audio_sample_rate: u32,
    /// PCM channel count of the audio input
    pub audio_channels: u8,
    /// Video codec selection ("copy" or an encoder name)
    pub video_codec: String,
    /// Audio codec selection, applied when audio is present
    pub audio_codec: String,
    /// Optimize the container for playback start
    pub faststart: bool,
    /// Optional warm-up trim window
    pub trim: Option<TrimWindow>,
}

/// Runs one transcode job to completion.
///
/// `Ok(())` means the process exited with status 0; output validation
/// is the muxer's concern.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// # Errors
    ///
    /// - `MuxError::TranscoderFailed` - non-zero exit
    /// - `MuxError::Io` - log creation or process spawn failure
    async fn run(&self, job: &TranscodeJob) -> MuxResult<()>;

    /// Whether the underlying tooling is present. Informational only;
    /// used for a startup warning.
    fn is_available(&self) -> bool {
        true
    }
}

/// Production transcoder shelling out to ffmpeg.
pub struct FfmpegTranscoder {
    binary: String,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn build_command(&self, job: &TranscodeJob) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.arg("-y");

        // Raw H.264 input with the estimated source frame rate; without
        // the hint ffmpeg assumes 25 fps and chunk durations drift.
        cmd.arg("-framerate")
            .arg(format!("{:.2}", job.frame_rate_hint))
            .arg("-f")
            .arg("h264")
            .arg("-i")
            .arg(&job.video_input);

        if let Some(audio) = &job.audio_input {
            cmd.arg("-f")
                .arg("s16le")
                .arg("-ar")
                .arg(job.audio_sample_rate.to_string())
                .arg("-ac")
                .arg(job.audio_channels.to_string())
                .arg("-i")
                .arg(audio);
        }

        if let Some(trim) = &job.trim {
            cmd.arg("-ss")
                .arg(format!("{:.3}", trim.skip.as_secs_f64()))
                .arg("-t")
                .arg(format!("{:.3}", trim.keep.as_secs_f64()));
        }

        cmd.arg("-c:v").arg(&job.video_codec);
        if job.audio_input.is_some() {
            cmd.arg("-c:a").arg(&job.audio_codec);
        }

        if job.faststart {
            cmd.arg("-movflags").arg("faststart");
        }

        cmd.arg("-f").arg("mp4");
        cmd.arg(&job.output);
        cmd
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn run(&self, job: &TranscodeJob) -> MuxResult<()> {
        let log_file = std::fs::File::create(&job.log)
            .map_err(|e| MuxError::io("create transcoder log", e))?;
        let log_clone = log_file
            .try_clone()
            .map_err(|e| MuxError::io("clone transcoder log handle", e))?;

        let mut cmd = self.build_command(job);
        cmd.stdout(Stdio::from(log_file))
            .stderr(Stdio::from(log_clone))
            // Process shutdown must not leave an orphaned transcoder.
            .kill_on_drop(true);

        tracing::debug!("Executing transcoder: {:?}", cmd);

        let status = cmd
            .status()
            .await
            .map_err(|e| MuxError::io("spawn transcoder", e))?;

        if status.success() {
            Ok(())
        } else {
            Err(MuxError::TranscoderFailed {
                code: status.code(),
                log: job.log.clone(),
            })
        }
    }

    fn is_available(&self) -> bool {
        std::process::Command::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

/// Scripted transcoder for tests: writes a fixed-size output and
/// succeeds, or exits with a given code and writes nothing.
///
/// Records every job it receives so tests can assert on the derived
/// parameters.
pub struct ScriptedTranscoder {
    output_bytes: Option<usize>,
    exit_code: i32,
    jobs: Mutex<Vec<TranscodeJob>>,
}

impl ScriptedTranscoder {
    /// Succeeds, writing `output_bytes` zero bytes to the output path.
    pub fn succeeding(output_bytes: usize) -> Self {
        Self {
            output_bytes: Some(output_bytes),
            exit_code: 0,
            jobs: Mutex::new(Vec::new()),
        }
    }

    /// Fails with the given exit code without producing output.
    pub fn failing(exit_code: i32) -> Self {
        Self {
            output_bytes: None,
            exit_code,
            jobs: Mutex::new(Vec::new()),
        }
    }

    /// All jobs run so far, in order.
    pub fn jobs(&self) -> Vec<TranscodeJob> {
        self.jobs.lock().clone()
    }
}

#[async_trait]
impl Transcoder for ScriptedTranscoder {
    async fn run(&self, job: &TranscodeJob) -> MuxResult<()> {
        self.jobs.lock().push(job.clone());

        // Mirror the production contract: the log exists whether the
        // run succeeds or fails.
        std::fs::write(&job.log, b"scripted transcoder log\n")
            .map_err(|e| MuxError::io("create transcoder log", e))?;

        match self.output_bytes {
            Some(size) => {
                std::fs::write(&job.output, vec![0u8; size])
                    .map_err(|e| MuxError::io("write scripted output", e))?;
                Ok(())
            }
            None => Err(MuxError::TranscoderFailed {
                code: Some(self.exit_code),
                log: job.log.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn job(temp: &tempfile::TempDir) -> TranscodeJob {
        TranscodeJob {
            video_input: temp.path().join("chunk_0.h264"),
            audio_input: Some(temp.path().join("chunk_0.pcm")),
            output: temp.path().join(".out.mp4.tmp"),
            log: temp.path().join("chunk_0.ffmpeg.log"),
            frame_rate_hint: 12.5,
            audio_sample_rate: 16_000,
            audio_channels: 1,
            video_codec: "copy".to_string(),
            audio_codec: "aac".to_string(),
            faststart: true,
            trim: None,
        }
    }

    fn args_of(cmd: &tokio::process::Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_command_declares_input_formats_and_rate_hint() {
        let temp = tempfile::tempdir().unwrap();
        let transcoder = FfmpegTranscoder::new("ffmpeg");

        let args = args_of(&transcoder.build_command(&job(&temp)));

        let text = args.join(" ");
        assert!(text.contains("-framerate 12.50 -f h264 -i"));
        assert!(text.contains("-f s16le -ar 16000 -ac 1 -i"));
        assert!(text.contains("-c:v copy"));
        assert!(text.contains("-c:a aac"));
        assert!(text.contains("-movflags faststart"));
    }

    #[test]
    fn test_command_omits_audio_options_without_audio() {
        let temp = tempfile::tempdir().unwrap();
        let transcoder = FfmpegTranscoder::new("ffmpeg");
        let mut job = job(&temp);
        job.audio_input = None;

        let text = args_of(&transcoder.build_command(&job)).join(" ");

        assert!(!text.contains("s16le"));
        assert!(!text.contains("-c:a"));
    }

    #[test]
    fn test_command_applies_trim_window() {
        let temp = tempfile::tempdir().unwrap();
        let transcoder = FfmpegTranscoder::new("ffmpeg");
        let mut job = job(&temp);
        job.trim = Some(TrimWindow {
            skip: Duration::from_millis(500),
            keep: Duration::from_secs(9),
        });

        let text = args_of(&transcoder.build_command(&job)).join(" ");

        assert!(text.contains("-ss 0.500 -t 9.000"));
    }

    #[tokio::test]
    async fn test_scripted_transcoder_records_jobs() {
        let temp = tempfile::tempdir().unwrap();
        let transcoder = ScriptedTranscoder::succeeding(16);

        transcoder.run(&job(&temp)).await.unwrap();

        let jobs = transcoder.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].frame_rate_hint, 12.5);
        assert_eq!(std::fs::metadata(&jobs[0].output).unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_scripted_failure_reports_exit_code() {
        let temp = tempfile::tempdir().unwrap();
        let transcoder = ScriptedTranscoder::failing(187);

        let err = transcoder.run(&job(&temp)).await.unwrap_err();

        assert!(matches!(
            err,
            MuxError::TranscoderFailed {
                code: Some(187),
                ..
            }
        ));
    }
}
