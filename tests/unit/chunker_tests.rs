/*!
 * Tests for fixed-window audio chunking
 */

use std::path::Path;

use anyhow::Result;
use polysub::audio::{AudioDecoder, DecodedAudio, FfmpegDecoder};
use polysub::chunker::AudioChunker;
use polysub::errors::PipelineError;
use crate::common;

/// Test that a 65 second stream splits into 30/30/5 second chunks
#[test]
fn test_chunks_withPartialTail_shouldCoverWholeStream() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let wav = common::create_test_wav(temp_dir.path(), "talk.wav", 65.0, 8000)?;

    let chunker = AudioChunker::open(&wav, 30.0)?;
    assert_eq!(chunker.chunk_count(), 3);
    assert!((chunker.total_duration() - 65.0).abs() < 1e-9);

    let chunks = chunker.collect::<Result<Vec<_>, _>>()?;
    let offsets: Vec<f64> = chunks.iter().map(|c| c.offset).collect();
    assert_eq!(offsets, vec![0.0, 30.0, 60.0]);
    assert!((chunks[2].duration - 5.0).abs() < 1e-9);
    assert_eq!(chunks.iter().map(|c| c.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(chunks[2].payload.samples.len(), 5 * 8000);
    Ok(())
}

/// Test that an exact multiple of the window has no empty trailing chunk
#[test]
fn test_chunks_withExactMultiple_shouldNotEmitEmptyChunk() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let wav = common::create_test_wav(temp_dir.path(), "even.wav", 60.0, 8000)?;

    let chunks = AudioChunker::open(&wav, 30.0)?.collect::<Result<Vec<_>, _>>()?;

    assert_eq!(chunks.len(), 2);
    assert!(chunks.iter().all(|c| (c.duration - 30.0).abs() < 1e-9));
    Ok(())
}

/// Test that empty audio yields no chunks
#[test]
fn test_chunks_withEmptyAudio_shouldYieldNothing() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let wav = common::create_test_wav(temp_dir.path(), "empty.wav", 0.0, 8000)?;

    let chunker = AudioChunker::open(&wav, 30.0)?;
    assert_eq!(chunker.chunk_count(), 0);
    assert_eq!(chunker.count(), 0);
    Ok(())
}

/// Test that non-positive windows are rejected
#[test]
fn test_open_withNonPositiveWindow_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let wav = common::create_test_wav(temp_dir.path(), "short.wav", 1.0, 8000)?;

    assert!(matches!(AudioChunker::open(&wav, 0.0), Err(PipelineError::DecodeFailure { .. })));
    assert!(matches!(AudioChunker::open(&wav, -3.0), Err(PipelineError::DecodeFailure { .. })));
    Ok(())
}

/// Test that decoded audio reports its duration and chunks lazily
#[test]
fn test_decoded_audio_fromWavFile_shouldReportDuration() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let wav = common::create_test_wav(temp_dir.path(), "talk.wav", 12.5, 16000)?;

    let audio = DecodedAudio::from_wav_file(&wav)?;

    assert_eq!(audio.sample_rate, 16000);
    assert!((audio.duration - 12.5).abs() < 1e-9);
    assert_eq!(audio.chunks(5.0)?.chunk_count(), 3);
    Ok(())
}

/// Test that a chunk payload encodes to a readable upload body
#[test]
fn test_to_wav_bytes_withChunk_shouldBeReadable() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let wav = common::create_test_wav(temp_dir.path(), "talk.wav", 2.0, 8000)?;
    let chunk = AudioChunker::open(&wav, 1.5)?.next().expect("first chunk")?;

    let bytes = chunk.payload.to_wav_bytes()?;
    let reader = hound::WavReader::new(std::io::Cursor::new(bytes))?;

    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.duration() as usize, chunk.payload.samples.len());
    Ok(())
}

/// Test that the ffmpeg decoder rejects a missing input before spawning
#[test]
fn test_ffmpeg_decoder_withMissingInput_shouldFailDecode() {
    let decoder = FfmpegDecoder::default();

    let result = tokio_test::block_on(decoder.decode(Path::new("/nonexistent/talk.mp4")));

    assert!(matches!(result, Err(PipelineError::DecodeFailure { .. })));
}
