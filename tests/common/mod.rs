/*!
 * Common test utilities for the polysub test suite
 */

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use hound::{SampleFormat, WavSpec, WavWriter};
use tempfile::TempDir;

use polysub::app_config::Config;
use polysub::audio::{AudioDecoder, DecodedAudio};
use polysub::errors::PipelineError;
use polysub::subtitle_processor::SubtitleTrack;

/// Route library logs to the test harness; RUST_LOG picks the level
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Three-unit English track
pub fn sample_track() -> SubtitleTrack {
    let mut track = SubtitleTrack::new("en");
    track.push(1.0, 4.0, "This is a test subtitle.");
    track.push(5.0, 9.0, "It contains multiple entries.");
    track.push(10.0, 14.0, "For testing purposes.");
    track
}

/// Creates a sample subtitle file for testing
pub fn create_test_subtitle(dir: &Path, filename: &str) -> Result<PathBuf> {
    create_test_file(dir, filename, &sample_track().serialize())
}

/// Writes a silent 16-bit mono WAV of the given length
pub fn create_test_wav(dir: &Path, filename: &str, seconds: f64, sample_rate: u32) -> Result<PathBuf> {
    let path = dir.join(filename);
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let frames = (seconds * sample_rate as f64).round() as u64;
    let mut writer = WavWriter::create(&path, spec)?;
    for _ in 0..frames {
        writer.write_sample(0i16)?;
    }
    writer.finalize()?;
    Ok(path)
}

/// Decoder that hands back a prepared WAV instead of running ffmpeg
#[derive(Debug)]
pub struct MockDecoder {
    wav: PathBuf,
    calls: Arc<AtomicUsize>,
}

impl MockDecoder {
    pub fn new(wav: impl Into<PathBuf>) -> Self {
        Self {
            wav: wav.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioDecoder for MockDecoder {
    async fn decode(&self, media: &Path) -> Result<DecodedAudio, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !media.exists() {
            return Err(PipelineError::DecodeFailure {
                path: media.to_path_buf(),
                reason: "Input file does not exist".to_string(),
            });
        }
        DecodedAudio::from_wav_file(&self.wav)
    }
}

/// Config with fast retries for tests
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.transcription.retry_count = 1;
    config.transcription.retry_backoff_ms = 1;
    config.transcription.timeout_secs = 5;
    config.translation.common.retry_count = 1;
    config.translation.common.retry_backoff_ms = 1;
    for provider in &mut config.translation.available_providers {
        provider.api_key = "test-key".to_string();
        provider.timeout_secs = 5;
    }
    config
}
