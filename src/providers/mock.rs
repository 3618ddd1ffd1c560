/*!
 * Mock collaborators for testing.
 *
 * - `MockTranscriber`: returns scripted segments per chunk index, can fail
 *   selected chunks or every call.
 * - `MockTranslator`: returns `[<code>] <text>`, can fail selected texts,
 *   every call, every Nth call, or answer slowly.
 */

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::chunker::AudioChunk;
use crate::errors::ProviderError;
use crate::language_utils::TargetLanguage;
use crate::providers::{RawSegment, Transcriber, Translator};

/// Scripted transcriber
#[derive(Debug, Default)]
pub struct MockTranscriber {
    /// Segments per chunk index; unlisted chunks yield nothing
    segments: HashMap<usize, Vec<RawSegment>>,
    /// Chunks that always fail
    failing_chunks: HashSet<usize>,
    /// Error returned for failing chunks
    error: Option<ProviderError>,
    /// Simulated latency per chunk index
    delays: HashMap<usize, Duration>,
    /// Calls made so far
    request_count: Arc<AtomicUsize>,
}

impl MockTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the segments of one chunk
    pub fn with_segments(mut self, chunk: usize, segments: Vec<RawSegment>) -> Self {
        self.segments.insert(chunk, segments);
        self
    }

    /// Make one chunk fail on every attempt
    pub fn failing_on(mut self, chunk: usize) -> Self {
        self.failing_chunks.insert(chunk);
        self
    }

    /// Error used for failing chunks
    pub fn with_error(mut self, error: ProviderError) -> Self {
        self.error = Some(error);
        self
    }

    /// Delay the answer for one chunk
    pub fn with_delay(mut self, chunk: usize, delay: Duration) -> Self {
        self.delays.insert(chunk, delay);
        self
    }

    /// Number of transcription calls made
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, chunk: &AudioChunk, _language: &str) -> Result<Vec<RawSegment>, ProviderError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(&chunk.index) {
            tokio::time::sleep(*delay).await;
        }

        if self.failing_chunks.contains(&chunk.index) {
            return Err(self
                .error
                .clone()
                .unwrap_or_else(|| ProviderError::ApiError {
                    status_code: 500,
                    message: format!("mock failure for chunk {}", chunk.index),
                }));
        }

        Ok(self.segments.get(&chunk.index).cloned().unwrap_or_default())
    }
}

/// Behavior mode for the mock translator
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Fails whenever the source text equals this value
    FailingOn(String),
    /// Fails every Nth request
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Rejects the credentials
    Unauthorized,
    /// Succeeds after a delay
    Slow { delay_ms: u64 },
}

/// Mock translator for testing fan-out behavior
#[derive(Debug)]
pub struct MockTranslator {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter
    request_count: Arc<AtomicUsize>,
}

impl MockTranslator {
    /// Create a new mock translator with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a translator that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a translator that fails for one source text
    pub fn failing_on(text: impl Into<String>) -> Self {
        Self::new(MockBehavior::FailingOn(text.into()))
    }

    /// Create an intermittently failing translator
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    /// Create a translator that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a slow translator
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Get the number of requests made
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Translation the working mock produces
    pub fn expected_translation(text: &str, target: &TargetLanguage) -> String {
        format!("[{}] {}", target.code, text)
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(
        &self,
        text: &str,
        _source_language: &str,
        target: &TargetLanguage,
    ) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst) + 1;

        match &self.behavior {
            MockBehavior::Working => Ok(Self::expected_translation(text, target)),
            MockBehavior::FailingOn(bad) if bad == text => Err(ProviderError::ApiError {
                status_code: 500,
                message: format!("mock failure for '{}'", text),
            }),
            MockBehavior::FailingOn(_) => Ok(Self::expected_translation(text, target)),
            MockBehavior::Intermittent { fail_every } => {
                if *fail_every > 0 && count % fail_every == 0 {
                    Err(ProviderError::ConnectionError(format!("mock intermittent failure #{}", count)))
                } else {
                    Ok(Self::expected_translation(text, target))
                }
            }
            MockBehavior::Failing => Err(ProviderError::RequestFailed("mock provider failure".to_string())),
            MockBehavior::Unauthorized => Err(ProviderError::AuthenticationError("mock invalid key".to_string())),
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                Ok(Self::expected_translation(text, target))
            }
        }
    }
}
