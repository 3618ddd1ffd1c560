/*!
 * Multi-language translation fan-out.
 *
 * Every unit of every requested language is translated by its own
 * collaborator call. Calls from all languages draw from one shared pool of
 * permits, results land in index-keyed slots, and each derived unit keeps
 * the index and timing of its source unit. A unit that can not be
 * translated gets fallback text and a `UnitFailure`; it never affects its
 * siblings or other languages.
 */

use std::sync::Arc;

use futures::stream::{self, FuturesUnordered, StreamExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::cancellation::Cancellation;
use crate::errors::{PipelineError, ProviderError};
use crate::language_utils::TargetLanguage;
use crate::providers::Translator;
use crate::retry::RetryPolicy;
use crate::subtitle_processor::{self, SubtitleTrack, TranscriptUnit};
use crate::translation::cache::TranslationCache;

/// Prefix of marker fallback text
pub const UNTRANSLATED_MARKER: &str = "[untranslated]";

/// Text given to a unit whose translation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FallbackMode {
    /// Keep the source text
    #[default]
    Source,
    /// `[untranslated] <source text>`
    Marker,
}

impl FallbackMode {
    pub fn apply(&self, source: &str) -> String {
        match self {
            FallbackMode::Source => source.to_string(),
            FallbackMode::Marker => format!("{} {}", UNTRANSLATED_MARKER, source),
        }
    }
}

// @struct: Unit that kept fallback text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitFailure {
    // @field: Canonical target language name
    pub language: String,

    // @field: One-based unit index
    pub index: usize,

    // @field: Calls made before giving up
    pub attempts: u32,

    // @field: Last collaborator error
    pub reason: String,
}

impl UnitFailure {
    pub fn as_error(&self) -> PipelineError {
        PipelineError::TranslationFailure {
            language: self.language.clone(),
            index: self.index,
            reason: self.reason.clone(),
        }
    }
}

/// Derived track for one target language
#[derive(Debug, Clone)]
pub struct LanguageTrack {
    pub language: TargetLanguage,
    pub track: SubtitleTrack,
    pub degraded: Vec<UnitFailure>,
}

/// Result of a fan-out run
#[derive(Debug, Clone, Default)]
pub struct FanOutReport {
    /// Completed languages, in request order
    pub tracks: Vec<LanguageTrack>,

    /// Whether some languages were abandoned
    pub cancelled: bool,
}

impl FanOutReport {
    /// Degraded units across all languages
    pub fn degraded_count(&self) -> usize {
        self.tracks.iter().map(|t| t.degraded.len()).sum()
    }
}

/// Translates one source track into many target languages
#[derive(Debug, Clone)]
pub struct FanOut {
    translator: Arc<dyn Translator>,
    retry: RetryPolicy,
    permits: Arc<Semaphore>,
    concurrency: usize,
    fallback: FallbackMode,
    cache: TranslationCache,
    source_language: String,
}

impl FanOut {
    /// `concurrency` bounds in-flight calls across all languages
    pub fn new(translator: Arc<dyn Translator>, retry: RetryPolicy, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        FanOut {
            translator,
            retry,
            permits: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            fallback: FallbackMode::default(),
            cache: TranslationCache::new(true),
            source_language: "English".to_string(),
        }
    }

    pub fn with_fallback(mut self, fallback: FallbackMode) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_cache(mut self, cache: TranslationCache) -> Self {
        self.cache = cache;
        self
    }

    /// English name of the source language, used in prompts
    pub fn with_source_language(mut self, name: impl Into<String>) -> Self {
        self.source_language = name.into();
        self
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    /// Translate `track` into every target.
    ///
    /// `progress` is called with `(language, finished, total)` after each
    /// unit. On cancellation the languages still in flight are dropped and
    /// the finished ones are returned with `cancelled` set.
    pub async fn translate_all<P>(
        &self,
        track: &SubtitleTrack,
        targets: &[TargetLanguage],
        cancel: &Cancellation,
        progress: P,
    ) -> FanOutReport
    where
        P: Fn(&TargetLanguage, usize, usize),
    {
        info!(
            "Translating {} unit(s) into {} language(s) with up to {} concurrent request(s)",
            track.len(),
            targets.len(),
            self.concurrency
        );

        let progress = &progress;
        let mut pending: FuturesUnordered<_> = targets
            .iter()
            .enumerate()
            .map(|(position, target)| async move {
                (position, self.translate_language(track, target, progress).await)
            })
            .collect();

        let mut finished: Vec<(usize, LanguageTrack)> = Vec::with_capacity(targets.len());
        let mut cancelled = false;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                next = pending.next() => match next {
                    Some(result) => finished.push(result),
                    None => break,
                }
            }
        }

        if cancelled {
            warn!(
                "Translation cancelled; keeping {} of {} language(s)",
                finished.len(),
                targets.len()
            );
        }

        finished.sort_by_key(|(position, _)| *position);
        FanOutReport {
            tracks: finished.into_iter().map(|(_, track)| track).collect(),
            cancelled,
        }
    }

    /// Translate every unit of `track` into one language
    pub async fn translate_language<P>(
        &self,
        track: &SubtitleTrack,
        target: &TargetLanguage,
        progress: &P,
    ) -> LanguageTrack
    where
        P: Fn(&TargetLanguage, usize, usize),
    {
        let total = track.len();
        let mut slots: Vec<(usize, Result<String, UnitFailure>)> = Vec::with_capacity(total);

        let mut results = stream::iter(track.units.iter().enumerate())
            .map(|(position, unit)| async move { (position, self.translate_unit(unit, target).await) })
            .buffer_unordered(self.concurrency);

        while let Some(slot) = results.next().await {
            slots.push(slot);
            progress(target, slots.len(), total);
        }
        // Completion order back to source order
        slots.sort_by_key(|(position, _)| *position);

        let mut units = Vec::with_capacity(total);
        let mut degraded = Vec::new();
        for (unit, (_, result)) in track.units.iter().zip(slots) {
            match result {
                Ok(text) => units.push(unit.with_text(text)),
                Err(failure) => {
                    warn!("{}", failure.as_error());
                    units.push(unit.with_text(self.fallback.apply(&unit.text)));
                    degraded.push(failure);
                }
            }
        }

        info!(
            "{}: {} unit(s) translated, {} degraded",
            target.canonical_name,
            total - degraded.len(),
            degraded.len()
        );

        LanguageTrack {
            language: target.clone(),
            track: SubtitleTrack {
                language: target.code.clone(),
                units,
            },
            degraded,
        }
    }

    async fn translate_unit(&self, unit: &TranscriptUnit, target: &TargetLanguage) -> Result<String, UnitFailure> {
        if unit.text.trim().is_empty() {
            return Ok(unit.text.clone());
        }
        if let Some(cached) = self.cache.get(&unit.text, &target.code) {
            return Ok(cached);
        }

        // Shared with every other language
        let _permit = self.permits.acquire().await.ok();

        let label = format!("Translation of unit {} into {}", unit.index, target.canonical_name);
        let outcome = self
            .retry
            .run(&label, || async move {
                let text = self.translator.translate(&unit.text, &self.source_language, target).await?;
                let text = subtitle_processor::normalize_text(&text);
                if text.is_empty() {
                    return Err(ProviderError::ParseError("empty translation".to_string()));
                }
                Ok(text)
            })
            .await;

        match outcome {
            Ok(text) => {
                debug!("Unit {} translated into {}", unit.index, target.code);
                self.cache.store(&unit.text, &target.code, &text);
                Ok(text)
            }
            Err(failure) => Err(UnitFailure {
                language: target.canonical_name.clone(),
                index: unit.index,
                attempts: failure.attempts,
                reason: failure.last_error.to_string(),
            }),
        }
    }
}
