/*!
 * Subtitle translation.
 *
 * - `fanout`: per-unit, per-language translation with a shared worker pool
 * - `cache`: in-memory reuse of identical lines
 */

pub use self::cache::TranslationCache;
pub use self::fanout::{FallbackMode, FanOut, FanOutReport, LanguageTrack, UnitFailure};

pub mod cache;
pub mod fanout;
