/*!
 * Error types for the polysub pipeline.
 *
 * Collaborator calls fail with `ProviderError`, clock strings with
 * `TimecodeError`, and pipeline stages with `PipelineError`. Only
 * `PipelineError::DecodeFailure` and the reconciliation variants abort the
 * operation that raised them; chunk and unit failures are recorded as
 * diagnostics and the run keeps going.
 */

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when calling an external collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The call did not finish within its time budget
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl ProviderError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::AuthenticationError(_))
    }
}

/// Errors produced while parsing clock strings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimecodeError {
    /// The text does not have the expected shape
    #[error("Invalid timestamp format: '{0}'")]
    InvalidFormat(String),

    /// A component is outside its allowed range
    #[error("Timestamp component out of range: '{0}'")]
    OutOfRange(String),
}

/// Errors raised by the pipeline stages
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Media could not be turned into audio
    #[error("Failed to decode audio from {path:?}: {reason}")]
    DecodeFailure {
        /// Media file that was being decoded
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// One chunk could not be transcribed
    #[error("Transcription of chunk {chunk} (offset {offset:.3}s) failed: {reason}")]
    ChunkTranscriptionFailure {
        /// Zero-based chunk position
        chunk: usize,
        /// Absolute chunk start in seconds
        offset: f64,
        /// Last error reported by the transcriber
        reason: String,
    },

    /// Edited text does not have one block per original unit
    #[error(
        "Edited transcript has {found} blocks but the original has {expected} units; \
         provide the full list of {expected} corrected blocks separated by blank lines"
    )]
    ReconciliationShapeMismatch {
        /// Units in the original track
        expected: usize,
        /// Non-empty blocks found in the edited text
        found: usize,
    },

    /// An edited block holds no text once the time range is removed
    #[error("Edited block {index} is empty")]
    EmptyEditedBlock {
        /// One-based block position
        index: usize,
    },

    /// One unit could not be translated into one language
    #[error("Translation of unit {index} into {language} failed: {reason}")]
    TranslationFailure {
        /// Canonical language name
        language: String,
        /// One-based unit index
        index: usize,
        /// Last error reported by the translator
        reason: String,
    },

    /// Malformed subtitle text
    #[error("Malformed subtitle block {index}: {reason}")]
    SerializationFormatError {
        /// One-based position of the offending block
        index: usize,
        /// What is wrong with it
        reason: String,
    },

    /// A track breaks the ordering or indexing invariants
    #[error("Invalid track at unit {index}: {reason}")]
    InvalidTrack {
        /// One-based position of the offending unit
        index: usize,
        /// Which invariant is broken
        reason: String,
    },

    /// The run was cancelled before this stage finished
    #[error("Operation cancelled")]
    Cancelled,

    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
