/*!
 * # polysub - multilingual subtitles from spoken media
 *
 * A Rust library that turns an audio or video file into time-aligned
 * subtitle tracks in several languages.
 *
 * ## Features
 *
 * - Decode any media ffmpeg understands into mono PCM
 * - Transcribe fixed-length audio chunks concurrently and merge them onto
 *   one absolute timeline
 * - Apply a human-edited transcript without touching the timings
 * - Translate every unit into many languages at once, sharing one bounded
 *   pool of requests
 * - Failed chunks and units are reported, never fatal
 *
 * ## Architecture
 *
 * - `timecode`: clock string parsing and formatting
 * - `subtitle_processor`: subtitle units, tracks and the SRT format
 * - `audio`: media decoding through ffmpeg
 * - `chunker`: fixed-window audio chunking
 * - `transcription`: concurrent chunk transcription and timeline merge
 * - `reconcile`: editable transcript rendering and edit application
 * - `translation`: multi-language fan-out and the translation cache
 * - `providers`: collaborator traits, the OpenAI-compatible client, mocks
 * - `retry`: per-call timeout and exponential backoff
 * - `cancellation`: run-wide cancellation flag
 * - `app_config`, `app_controller`, `file_utils`, `language_utils`
 * - `errors`: error types
 */

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod app_config;
pub mod app_controller;
pub mod audio;
pub mod cancellation;
pub mod chunker;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod providers;
pub mod reconcile;
pub mod retry;
pub mod subtitle_processor;
pub mod timecode;
pub mod transcription;
pub mod translation;

pub use app_config::Config;
pub use app_controller::{Controller, RunReport, RunRequest};
pub use cancellation::Cancellation;
pub use errors::{PipelineError, ProviderError, TimecodeError};
pub use language_utils::{TargetLanguage, language_codes_match, normalize_to_part2t};
pub use subtitle_processor::{SubtitleTrack, TranscriptUnit};
pub use translation::{FanOut, FanOutReport};
