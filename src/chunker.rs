/*!
 * Fixed-window audio chunking.
 *
 * `AudioChunker` walks a decoded WAV stream and yields consecutive,
 * non-overlapping windows of `W` seconds. Chunks are produced lazily so only
 * the window being handed out is held in memory. Boundaries are purely
 * time-based; a phrase may be split between two chunks.
 */

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;

use crate::errors::PipelineError;

/// Mono samples of one chunk
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPayload {
    /// Samples normalized to [-1, 1]
    pub samples: Vec<f32>,

    /// Samples per second
    pub sample_rate: u32,
}

impl AudioPayload {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        AudioPayload { samples, sample_rate }
    }

    /// Length in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Encode the samples as an in-memory 16-bit PCM WAV file
    pub fn to_wav_bytes(&self) -> io::Result<Vec<u8>> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::with_capacity(44 + self.samples.len() * 2));
        {
            let mut writer = WavWriter::new(&mut cursor, spec).map_err(io::Error::other)?;
            for sample in &self.samples {
                let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
                writer.write_sample(value).map_err(io::Error::other)?;
            }
            writer.finalize().map_err(io::Error::other)?;
        }

        Ok(cursor.into_inner())
    }
}

// @struct: Bounded time slice of the source audio
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    // @field: Zero-based position
    pub index: usize,

    // @field: Absolute start in seconds
    pub offset: f64,

    // @field: Length in seconds, at most the window
    pub duration: f64,

    // @field: Owned samples
    pub payload: AudioPayload,
}

impl AudioChunk {
    /// Absolute end in seconds
    pub fn end(&self) -> f64 {
        self.offset + self.duration
    }
}

/// Lazy fixed-window iterator over a WAV stream
pub struct AudioChunker<R: Read> {
    reader: WavReader<R>,
    source: PathBuf,
    sample_rate: u32,
    channels: usize,
    frames_per_chunk: usize,
    total_frames: usize,
    frames_read: usize,
    next_index: usize,
    failed: bool,
}

impl AudioChunker<BufReader<File>> {
    /// Open a WAV file and chunk it with a window of `window_secs`
    pub fn open<P: AsRef<Path>>(path: P, window_secs: f64) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let reader = WavReader::open(path).map_err(|e| PipelineError::DecodeFailure {
            path: path.to_path_buf(),
            reason: format!("Failed to open WAV file: {}", e),
        })?;
        Ok(Self::new(reader, window_secs)?.with_source(path))
    }
}

impl<R: Read> AudioChunker<R> {
    /// Wrap a WAV reader. Rejects windows that are not positive or shorter
    /// than a single sample.
    pub fn new(reader: WavReader<R>, window_secs: f64) -> Result<Self, PipelineError> {
        let spec = reader.spec();
        let invalid = |reason: String| PipelineError::DecodeFailure {
            path: PathBuf::new(),
            reason,
        };

        if !window_secs.is_finite() || window_secs <= 0.0 {
            return Err(invalid(format!("Chunk window must be positive, got {}", window_secs)));
        }
        if spec.sample_rate == 0 || spec.channels == 0 {
            return Err(invalid("WAV header has no samples per second or no channels".to_string()));
        }

        let frames_per_chunk = (window_secs * spec.sample_rate as f64).round() as usize;
        if frames_per_chunk < 1 {
            return Err(invalid(format!(
                "Chunk window {}s is shorter than one sample at {} Hz",
                window_secs, spec.sample_rate
            )));
        }

        let total_frames = reader.duration() as usize;
        debug!(
            "Chunking {} frames at {} Hz into {}s windows",
            total_frames, spec.sample_rate, window_secs
        );

        Ok(AudioChunker {
            reader,
            source: PathBuf::new(),
            sample_rate: spec.sample_rate,
            channels: spec.channels as usize,
            frames_per_chunk,
            total_frames,
            frames_read: 0,
            next_index: 0,
            failed: false,
        })
    }

    /// Name the file behind the stream for error reporting
    pub fn with_source<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.source = path.as_ref().to_path_buf();
        self
    }

    /// Total audio length in seconds
    pub fn total_duration(&self) -> f64 {
        self.total_frames as f64 / self.sample_rate as f64
    }

    /// Number of chunks the stream splits into
    pub fn chunk_count(&self) -> usize {
        self.total_frames.div_ceil(self.frames_per_chunk)
    }

    fn read_frames(&mut self, frames: usize) -> Result<Vec<f32>, String> {
        let spec = self.reader.spec();
        let wanted = frames * self.channels;

        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => self
                .reader
                .samples::<f32>()
                .take(wanted)
                .collect::<Result<_, _>>()
                .map_err(|e| e.to_string())?,
            SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                self.reader
                    .samples::<i32>()
                    .take(wanted)
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()
                    .map_err(|e| e.to_string())?
            }
        };

        if interleaved.len() < wanted {
            return Err(format!(
                "WAV stream ended after {} of {} expected samples",
                interleaved.len(),
                wanted
            ));
        }

        if self.channels == 1 {
            return Ok(interleaved);
        }

        // Downmix interleaved frames
        Ok(interleaved
            .chunks(self.channels)
            .map(|frame| frame.iter().sum::<f32>() / self.channels as f32)
            .collect())
    }
}

impl<R: Read> Iterator for AudioChunker<R> {
    type Item = Result<AudioChunk, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.frames_read >= self.total_frames {
            return None;
        }

        let start_frame = self.frames_read;
        let frames = self.frames_per_chunk.min(self.total_frames - start_frame);

        match self.read_frames(frames) {
            Ok(samples) => {
                let index = self.next_index;
                self.next_index += 1;
                self.frames_read += frames;

                let rate = self.sample_rate as f64;
                Some(Ok(AudioChunk {
                    index,
                    offset: start_frame as f64 / rate,
                    duration: frames as f64 / rate,
                    payload: AudioPayload::new(samples, self.sample_rate),
                }))
            }
            Err(reason) => {
                self.failed = true;
                Some(Err(PipelineError::DecodeFailure {
                    path: self.source.clone(),
                    reason: format!("chunk {}: {}", self.next_index, reason),
                }))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.chunk_count().saturating_sub(self.next_index);
        if self.failed { (0, Some(0)) } else { (remaining, Some(remaining)) }
    }
}
