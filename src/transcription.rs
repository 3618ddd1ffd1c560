/*!
 * Chunked transcription and ordered reassembly.
 *
 * Chunks are transcribed concurrently with a bounded number of requests in
 * flight. Each chunk's segments are shifted from chunk-relative to absolute
 * time, then everything is merged by chunk index (never by completion
 * order) into one normalized, densely indexed track. A chunk whose calls
 * all fail contributes no units and one `ChunkFailure`.
 */

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::cancellation::Cancellation;
use crate::chunker::AudioChunk;
use crate::errors::PipelineError;
use crate::providers::{RawSegment, Transcriber};
use crate::retry::{RetryFailure, RetryPolicy};
use crate::subtitle_processor::{self, SubtitleTrack, TranscriptUnit};

// @struct: Chunk that produced no units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkFailure {
    // @field: Zero-based chunk position
    pub chunk_index: usize,

    // @field: Absolute chunk start
    pub offset: f64,

    // @field: Chunk length
    pub duration: f64,

    // @field: Calls made before giving up
    pub attempts: u32,

    // @field: Last collaborator error
    pub reason: String,
}

impl ChunkFailure {
    pub fn as_error(&self) -> PipelineError {
        PipelineError::ChunkTranscriptionFailure {
            chunk: self.chunk_index,
            offset: self.offset,
            reason: self.reason.clone(),
        }
    }
}

/// Aggregated transcription of one media file
#[derive(Debug, Clone)]
pub struct Transcript {
    /// Normalized source-language track
    pub track: SubtitleTrack,

    /// Chunks that failed after all retries, ordered by index
    pub failures: Vec<ChunkFailure>,

    /// Chunks that were scheduled
    pub chunks_attempted: usize,
}

impl Transcript {
    /// Whether every chunk was transcribed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

enum ChunkOutcome {
    Transcribed {
        chunk: ChunkSpan,
        result: Result<Vec<RawSegment>, RetryFailure>,
    },
    Unreadable(PipelineError),
}

#[derive(Debug, Clone, Copy)]
struct ChunkSpan {
    index: usize,
    offset: f64,
    duration: f64,
}

/// Transcribes chunk streams through an injected `Transcriber`
#[derive(Debug, Clone)]
pub struct TranscriptionAggregator {
    transcriber: Arc<dyn Transcriber>,
    retry: RetryPolicy,
    concurrency: usize,
}

impl TranscriptionAggregator {
    pub fn new(transcriber: Arc<dyn Transcriber>, retry: RetryPolicy, concurrency: usize) -> Self {
        TranscriptionAggregator {
            transcriber,
            retry,
            concurrency: concurrency.max(1),
        }
    }

    /// Transcribe every chunk and assemble a single track.
    ///
    /// `progress` is called with `(finished, total)` after each chunk.
    /// A chunk read error aborts with `DecodeFailure`; cancellation stops
    /// scheduling and returns `Cancelled`.
    pub async fn aggregate<I, P>(
        &self,
        chunks: I,
        language: &str,
        cancel: &Cancellation,
        progress: P,
    ) -> Result<Transcript, PipelineError>
    where
        I: IntoIterator<Item = Result<AudioChunk, PipelineError>>,
        I::IntoIter: Send + 'static,
        P: Fn(usize, usize),
    {
        let chunks = chunks.into_iter();
        let (lower, upper) = chunks.size_hint();
        let total = upper.unwrap_or(lower);

        // Chunk reads hit the disk, so they run on the blocking pool. The
        // reader stops once the receiver is dropped or a read fails.
        let (sender, receiver) = mpsc::channel(self.concurrency);
        let _reader = tokio::task::spawn_blocking(move || {
            for item in chunks {
                let unreadable = item.is_err();
                if sender.blocking_send(item).is_err() || unreadable {
                    break;
                }
            }
        });
        let chunk_stream = stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|item| (item, receiver))
        });

        info!(
            "Transcribing {} chunk(s) with up to {} concurrent request(s)",
            total, self.concurrency
        );

        let outcomes = chunk_stream
            .map(|item| {
                let transcriber = self.transcriber.clone();
                let retry = self.retry;
                let language = language.to_string();
                async move {
                    let chunk = match item {
                        Ok(chunk) => chunk,
                        Err(e) => return ChunkOutcome::Unreadable(e),
                    };
                    let span = ChunkSpan {
                        index: chunk.index,
                        offset: chunk.offset,
                        duration: chunk.duration,
                    };
                    let label = format!("Transcription of chunk {}", chunk.index);
                    let result = retry
                        .run(&label, || transcriber.transcribe(&chunk, &language))
                        .await;
                    ChunkOutcome::Transcribed { chunk: span, result }
                }
            })
            .buffer_unordered(self.concurrency)
            .take_until(cancel.cancelled());
        tokio::pin!(outcomes);

        let mut finished: Vec<(ChunkSpan, Result<Vec<RawSegment>, RetryFailure>)> = Vec::new();
        while let Some(outcome) = outcomes.next().await {
            match outcome {
                ChunkOutcome::Transcribed { chunk, result } => {
                    finished.push((chunk, result));
                    progress(finished.len(), total.max(finished.len()));
                }
                ChunkOutcome::Unreadable(e) => {
                    error!("Audio stream became unreadable: {}", e);
                    return Err(e);
                }
            }
        }

        if cancel.is_cancelled() {
            warn!("Transcription cancelled after {} chunk(s)", finished.len());
            return Err(PipelineError::Cancelled);
        }

        finished.sort_by_key(|(chunk, _)| chunk.index);

        let mut units = Vec::new();
        let mut failures = Vec::new();
        for (chunk, result) in &finished {
            match result {
                Ok(segments) => units.extend(shift_segments(*chunk, segments)),
                Err(failure) => {
                    let failure = ChunkFailure {
                        chunk_index: chunk.index,
                        offset: chunk.offset,
                        duration: chunk.duration,
                        attempts: failure.attempts,
                        reason: failure.last_error.to_string(),
                    };
                    error!("{}", failure.as_error());
                    failures.push(failure);
                }
            }
        }

        let track = SubtitleTrack::from_units(language, units);
        info!(
            "Assembled {} unit(s) from {} chunk(s), {} failed",
            track.len(),
            finished.len(),
            failures.len()
        );

        Ok(Transcript {
            track,
            failures,
            chunks_attempted: finished.len(),
        })
    }
}

/// Move chunk-relative segments to absolute time, clamped to the chunk span
fn shift_segments(chunk: ChunkSpan, segments: &[RawSegment]) -> Vec<TranscriptUnit> {
    let mut units = Vec::with_capacity(segments.len());

    for segment in segments {
        let text = subtitle_processor::normalize_text(segment.text.trim());
        if text.is_empty() {
            debug!("Dropping empty segment in chunk {}", chunk.index);
            continue;
        }
        if !(segment.start.is_finite() && segment.end.is_finite()) {
            warn!("Dropping segment with invalid timing in chunk {}: '{}'", chunk.index, text);
            continue;
        }

        let start = chunk.offset + segment.start.clamp(0.0, chunk.duration);
        let end = chunk.offset + segment.end.clamp(0.0, chunk.duration);
        if end <= start {
            warn!(
                "Dropping zero-length segment in chunk {} ({:.3}s -> {:.3}s): '{}'",
                chunk.index, segment.start, segment.end, text
            );
            continue;
        }

        units.push(TranscriptUnit::new(0, start, end, text));
    }

    units
}
