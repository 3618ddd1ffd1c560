/*!
 * Media decoding.
 *
 * An `AudioDecoder` turns any media file into mono PCM audio at a fixed
 * sample rate. The production decoder shells out to `ffmpeg` and writes
 * into a scoped temporary WAV that is deleted when the `DecodedAudio` value
 * is dropped.
 */

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use hound::WavReader;
use log::{debug, error};
use tempfile::TempPath;
use tokio::process::Command;

use crate::chunker::AudioChunker;
use crate::errors::PipelineError;

/// Backing storage of decoded audio
#[derive(Debug)]
pub enum AudioSource {
    /// Temp file removed on drop
    Temporary(TempPath),
    /// File owned by the caller
    Persistent(PathBuf),
}

impl AudioSource {
    pub fn path(&self) -> &Path {
        match self {
            AudioSource::Temporary(path) => path,
            AudioSource::Persistent(path) => path,
        }
    }
}

// @struct: Mono PCM audio ready for chunking
#[derive(Debug)]
pub struct DecodedAudio {
    // @field: WAV file holding the samples
    pub source: AudioSource,

    // @field: Samples per second
    pub sample_rate: u32,

    // @field: Frames in the stream
    pub total_samples: u32,

    // @field: Length in seconds
    pub duration: f64,
}

impl DecodedAudio {
    /// Inspect a WAV file and wrap it
    pub fn from_source(source: AudioSource) -> Result<Self, PipelineError> {
        let reader = WavReader::open(source.path()).map_err(|e| PipelineError::DecodeFailure {
            path: source.path().to_path_buf(),
            reason: format!("Unreadable WAV output: {}", e),
        })?;
        let spec = reader.spec();
        let total_samples = reader.duration();
        let duration = if spec.sample_rate == 0 {
            0.0
        } else {
            total_samples as f64 / spec.sample_rate as f64
        };

        Ok(DecodedAudio {
            source,
            sample_rate: spec.sample_rate,
            total_samples,
            duration,
        })
    }

    /// Wrap an existing WAV file without taking ownership of it
    pub fn from_wav_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        Self::from_source(AudioSource::Persistent(path.as_ref().to_path_buf()))
    }

    /// Fresh lazy chunk iterator over the audio
    pub fn chunks(&self, window_secs: f64) -> Result<AudioChunker<std::io::BufReader<std::fs::File>>, PipelineError> {
        AudioChunker::open(self.source.path(), window_secs)
    }
}

/// Decodes media into mono PCM audio
#[async_trait]
pub trait AudioDecoder: Send + Sync + std::fmt::Debug {
    async fn decode(&self, media: &Path) -> Result<DecodedAudio, PipelineError>;
}

/// `AudioDecoder` backed by the ffmpeg binary
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    /// Binary name or path
    pub ffmpeg_path: String,

    /// Output sample rate
    pub sample_rate: u32,

    /// Process time budget
    pub timeout: Duration,
}

impl FfmpegDecoder {
    pub fn new(ffmpeg_path: impl Into<String>, sample_rate: u32, timeout: Duration) -> Self {
        FfmpegDecoder {
            ffmpeg_path: ffmpeg_path.into(),
            sample_rate,
            timeout,
        }
    }

    /// Filter ffmpeg stderr down to the lines that explain a failure,
    /// dropping the version banner and stream metadata.
    fn filter_ffmpeg_stderr(stderr: &str) -> String {
        let noise_prefixes = [
            "ffmpeg version",
            "built with",
            "configuration:",
            "lib",
            "Input #",
            "Metadata:",
            "Duration:",
            "Chapter",
            "Stream #",
            "encoder",
            "handler_name",
            "Output #",
            "Stream mapping:",
            "Press [q]",
            "size=",
        ];

        let meaningful: Vec<&str> = stderr
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !noise_prefixes.iter().any(|p| line.starts_with(p)))
            .collect();

        if meaningful.is_empty() {
            "unknown ffmpeg error (stderr was empty after filtering)".to_string()
        } else {
            meaningful.join("\n")
        }
    }
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        FfmpegDecoder::new("ffmpeg", 16_000, Duration::from_secs(600))
    }
}

#[async_trait]
impl AudioDecoder for FfmpegDecoder {
    async fn decode(&self, media: &Path) -> Result<DecodedAudio, PipelineError> {
        let failure = |reason: String| PipelineError::DecodeFailure {
            path: media.to_path_buf(),
            reason,
        };

        if !media.exists() {
            return Err(failure("Media file does not exist".to_string()));
        }

        let output_path = tempfile::Builder::new()
            .prefix("polysub-decoded-")
            .suffix(".wav")
            .tempfile()?
            .into_temp_path();

        debug!("Decoding {:?} into {:?}", media, &*output_path);

        let rate = self.sample_rate.to_string();
        let ffmpeg_future = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-i")
            .arg(media)
            .args(["-vn", "-ac", "1", "-ar", &rate, "-c:a", "pcm_s16le"])
            .arg(&*output_path)
            .kill_on_drop(true)
            .output();

        let output = tokio::select! {
            result = ffmpeg_future => {
                result.map_err(|e| failure(format!("Failed to execute {}: {}", self.ffmpeg_path, e)))?
            },
            _ = tokio::time::sleep(self.timeout) => {
                return Err(failure(format!("ffmpeg timed out after {}s", self.timeout.as_secs())));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let filtered = Self::filter_ffmpeg_stderr(&stderr);
            error!("Audio decoding failed: {}", filtered);
            return Err(failure(format!("ffmpeg exited with {}: {}", output.status, filtered)));
        }

        DecodedAudio::from_source(AudioSource::Temporary(output_path)).map_err(|e| match e {
            PipelineError::DecodeFailure { reason, .. } => failure(reason),
            other => other,
        })
    }
}
