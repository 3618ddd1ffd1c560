/*!
 * External speech-to-text and translation collaborators.
 *
 * The pipeline only sees the `Transcriber` and `Translator` traits; the
 * controller builds one implementation of each and hands it down as an
 * `Arc<dyn ...>`:
 * - `openai`: OpenAI-compatible HTTP client (also serves LM Studio)
 * - `mock`: scripted implementations for tests and benchmarks
 */

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chunker::AudioChunk;
use crate::errors::ProviderError;
use crate::language_utils::TargetLanguage;

/// Segment as returned by a transcriber, relative to its chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSegment {
    /// Seconds from the chunk start
    pub start: f64,

    /// Seconds from the chunk start
    pub end: f64,

    /// Recognized text
    pub text: String,
}

impl RawSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        RawSegment {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Speech-to-text collaborator
#[async_trait]
pub trait Transcriber: Send + Sync + Debug {
    /// Transcribe one chunk into chunk-relative segments
    ///
    /// # Arguments
    /// * `chunk` - The chunk to transcribe
    /// * `language` - ISO code of the spoken language
    async fn transcribe(&self, chunk: &AudioChunk, language: &str) -> Result<Vec<RawSegment>, ProviderError>;
}

/// Translation collaborator
#[async_trait]
pub trait Translator: Send + Sync + Debug {
    /// Translate one piece of text
    ///
    /// # Arguments
    /// * `text` - Source text of a single unit
    /// * `source_language` - English name of the source language
    /// * `target` - Requested target
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target: &TargetLanguage,
    ) -> Result<String, ProviderError>;
}

pub mod mock;
pub mod openai;
