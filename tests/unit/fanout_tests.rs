/*!
 * Tests for multi-language translation fan-out
 */

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use polysub::cancellation::Cancellation;
use polysub::errors::ProviderError;
use polysub::language_utils::TargetLanguage;
use polysub::providers::Translator;
use polysub::providers::mock::{MockBehavior, MockTranslator};
use polysub::retry::RetryPolicy;
use polysub::subtitle_processor::SubtitleTrack;
use polysub::translation::{FallbackMode, FanOut, TranslationCache};
use crate::common;

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(1, 1, Duration::from_secs(5))
}

fn targets(codes: &[&str]) -> Vec<TargetLanguage> {
    codes.iter().map(|c| TargetLanguage::parse(c).unwrap()).collect()
}

/// Translator that records the highest number of calls in flight
#[derive(Debug, Default)]
struct ConcurrencyProbe {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Translator for ConcurrencyProbe {
    async fn translate(&self, text: &str, _source: &str, target: &TargetLanguage) -> Result<String, ProviderError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("{}:{}", target.code, text))
    }
}

/// Translator that answers later units sooner and rejects one unit in German
#[derive(Debug)]
struct ReversedDelayTranslator {
    units: u64,
}

#[async_trait]
impl Translator for ReversedDelayTranslator {
    async fn translate(&self, text: &str, _source: &str, target: &TargetLanguage) -> Result<String, ProviderError> {
        let position: u64 = text.trim_start_matches("line ").parse().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis((self.units - position) * 15)).await;
        if target.code == "de" && position == 3 {
            return Err(ProviderError::ApiError {
                status_code: 500,
                message: "rejected".to_string(),
            });
        }
        Ok(format!("{}:{}", target.code, text))
    }
}

/// Translator whose replies carry stray whitespace, and nothing for one line
#[derive(Debug)]
struct PaddedTranslator;

#[async_trait]
impl Translator for PaddedTranslator {
    async fn translate(&self, text: &str, _source: &str, target: &TargetLanguage) -> Result<String, ProviderError> {
        if text == "line 1" {
            return Ok(" \n ".to_string());
        }
        Ok(format!("{}:{}  \n\n", target.code, text))
    }
}

fn numbered_track(units: usize) -> SubtitleTrack {
    let mut source = SubtitleTrack::new("en");
    for i in 0..units {
        source.push(i as f64 * 2.0, i as f64 * 2.0 + 1.0, format!("line {}", i));
    }
    source
}

/// Translator that records which texts it was asked for
#[derive(Debug, Default)]
struct RecordingTranslator {
    seen: Mutex<HashMap<String, usize>>,
}

#[async_trait]
impl Translator for RecordingTranslator {
    async fn translate(&self, text: &str, _source: &str, target: &TargetLanguage) -> Result<String, ProviderError> {
        *self.seen.lock().entry(text.to_string()).or_default() += 1;
        Ok(MockTranslator::expected_translation(text, target))
    }
}

/// Test that every language gets every unit with the source timing
#[tokio::test]
async fn test_translate_all_withWorkingTranslator_shouldMirrorSourceTrack() {
    let source = common::sample_track();
    let fanout = FanOut::new(Arc::new(MockTranslator::working()), fast_retry(), 4);
    let targets = targets(&["fr", "de", "ja"]);

    let report = fanout.translate_all(&source, &targets, &Cancellation::new(), |_, _, _| {}).await;

    assert!(!report.cancelled);
    assert_eq!(report.degraded_count(), 0);
    assert_eq!(report.tracks.len(), 3);
    for (language_track, target) in report.tracks.iter().zip(&targets) {
        assert_eq!(&language_track.language, target);
        assert_eq!(language_track.track.language, target.code);
        assert_eq!(language_track.track.len(), source.len());
        for (unit, original) in language_track.track.units.iter().zip(&source.units) {
            assert_eq!((unit.index, unit.start, unit.end), (original.index, original.start, original.end));
            assert_eq!(unit.text, MockTranslator::expected_translation(&original.text, target));
        }
    }
}

/// Test that one failing unit only degrades that unit, in every language
#[tokio::test]
async fn test_translate_all_withOneFailingUnit_shouldFallBackForThatUnit() {
    let source = common::sample_track();
    let bad = source.units[1].text.clone();
    let fanout = FanOut::new(Arc::new(MockTranslator::failing_on(bad.clone())), fast_retry(), 2);

    let report = fanout
        .translate_all(&source, &targets(&["fr", "es"]), &Cancellation::new(), |_, _, _| {})
        .await;

    assert_eq!(report.degraded_count(), 2);
    for language_track in &report.tracks {
        assert_eq!(language_track.degraded.len(), 1);
        let failure = &language_track.degraded[0];
        assert_eq!(failure.index, 2);
        assert_eq!(failure.attempts, 2);
        assert_eq!(failure.language, language_track.language.canonical_name);
        assert_eq!(language_track.track.units[1].text, bad);
        assert!(language_track.track.units[0].text.starts_with('['));
        assert!(language_track.track.units[2].text.starts_with('['));
    }
}

/// Test that output follows source order when later units finish first
#[tokio::test]
async fn test_translate_all_withReversedCompletionOrder_shouldKeepSourceOrder() {
    let source = numbered_track(8);
    let fanout = FanOut::new(Arc::new(ReversedDelayTranslator { units: 8 }), RetryPolicy::no_retry(Duration::from_secs(5)), 8);

    let report = fanout
        .translate_all(&source, &targets(&["fr", "de"]), &Cancellation::new(), |_, _, _| {})
        .await;

    assert_eq!(report.tracks.len(), 2);
    for language_track in &report.tracks {
        let code = &language_track.language.code;
        let indices: Vec<usize> = language_track.track.units.iter().map(|u| u.index).collect();
        assert_eq!(indices, (1..=8).collect::<Vec<_>>());

        for (position, unit) in language_track.track.units.iter().enumerate() {
            let expected = if code == "de" && position == 3 {
                format!("line {}", position)
            } else {
                format!("{}:line {}", code, position)
            };
            assert_eq!(unit.text, expected);
            assert_eq!(unit.start, source.units[position].start);
        }
    }
    assert!(report.tracks[0].degraded.is_empty());
    assert_eq!(report.tracks[1].degraded.iter().map(|f| f.index).collect::<Vec<_>>(), vec![4]);
}

/// Test that translations are stored in serializable form and blank replies degrade the unit
#[tokio::test]
async fn test_translate_all_withPaddedReplies_shouldNormalizeText() {
    let source = numbered_track(3);
    let fanout = FanOut::new(Arc::new(PaddedTranslator), RetryPolicy::no_retry(Duration::from_secs(5)), 2);

    let report = fanout.translate_all(&source, &targets(&["fr"]), &Cancellation::new(), |_, _, _| {}).await;

    let track = &report.tracks[0];
    assert_eq!(track.track.units[0].text, "fr:line 0");
    assert_eq!(track.track.units[1].text, "line 1");
    assert_eq!(track.degraded.iter().map(|f| f.index).collect::<Vec<_>>(), vec![2]);
    assert!(track.track.validate().is_ok());
}

/// Test that rejected credentials are not retried
#[tokio::test]
async fn test_translate_all_withUnauthorizedTranslator_shouldNotRetry() {
    let source = common::sample_track();
    let translator = Arc::new(MockTranslator::new(MockBehavior::Unauthorized));
    let fanout = FanOut::new(translator.clone(), fast_retry(), 1);

    let report = fanout.translate_all(&source, &targets(&["fr"]), &Cancellation::new(), |_, _, _| {}).await;

    let track = &report.tracks[0];
    assert_eq!(track.degraded.len(), source.len());
    assert!(track.degraded.iter().all(|f| f.attempts == 1));
    assert_eq!(translator.request_count(), source.len());
    assert_eq!(track.track.units[0].text, source.units[0].text);
}

/// Test that marker fallback flags untranslated text
#[tokio::test]
async fn test_translate_all_withMarkerFallback_shouldPrefixText() {
    let source = common::sample_track();
    let fanout = FanOut::new(Arc::new(MockTranslator::failing()), RetryPolicy::no_retry(Duration::from_secs(5)), 2)
        .with_fallback(FallbackMode::Marker);

    let report = fanout.translate_all(&source, &targets(&["it"]), &Cancellation::new(), |_, _, _| {}).await;

    let track = &report.tracks[0];
    assert_eq!(track.degraded.len(), source.len());
    assert!(track.track.units.iter().all(|u| u.text.starts_with("[untranslated] ")));
    assert!(track.degraded.iter().all(|f| f.attempts == 1));
}

/// Test that the concurrency bound holds across all languages together
#[tokio::test]
async fn test_translate_all_withManyLanguages_shouldShareConcurrencyBound() {
    let source = numbered_track(6);
    let probe = Arc::new(ConcurrencyProbe::default());
    let fanout = FanOut::new(probe.clone(), fast_retry(), 3);

    let report = fanout
        .translate_all(&source, &targets(&["fr", "de", "es", "pt"]), &Cancellation::new(), |_, _, _| {})
        .await;

    assert_eq!(report.tracks.len(), 4);
    let peak = probe.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak concurrency was {}", peak);
    assert!(peak >= 2, "work never overlapped");
}

/// Test that identical lines are translated once per language
#[tokio::test]
async fn test_translate_all_withRepeatedLines_shouldUseCache() {
    let mut source = SubtitleTrack::new("en");
    source.push(0.0, 1.0, "Thank you.");
    source.push(2.0, 3.0, "Thank you.");
    source.push(4.0, 5.0, "Goodbye.");
    let translator = Arc::new(RecordingTranslator::default());
    // One permit so the second "Thank you." runs after the first is cached
    let fanout = FanOut::new(translator.clone(), fast_retry(), 1).with_cache(TranslationCache::new(true));

    let report = fanout.translate_all(&source, &targets(&["fr"]), &Cancellation::new(), |_, _, _| {}).await;

    assert_eq!(report.tracks[0].track.units[1].text, "[fr] Thank you.");
    assert_eq!(translator.seen.lock().get("Thank you."), Some(&1));
    let (hits, _, _) = fanout.cache().stats();
    assert_eq!(hits, 1);
}

/// Test that whitespace-only units are never sent
#[tokio::test]
async fn test_translate_all_withBlankUnit_shouldSkipCall() {
    let mut source = SubtitleTrack::new("en");
    source.push(0.0, 1.0, "   ");
    source.push(2.0, 3.0, "Words");
    let translator = Arc::new(MockTranslator::working());
    let fanout = FanOut::new(translator.clone(), fast_retry(), 2);

    let report = fanout.translate_all(&source, &targets(&["fr"]), &Cancellation::new(), |_, _, _| {}).await;

    assert_eq!(translator.request_count(), 1);
    assert_eq!(report.tracks[0].track.units[0].text, "   ");
    assert!(report.tracks[0].degraded.is_empty());
}

/// Test that progress counts every unit of every language
#[tokio::test]
async fn test_translate_all_withProgress_shouldReachTotalPerLanguage() {
    let source = common::sample_track();
    let fanout = FanOut::new(Arc::new(MockTranslator::working()), fast_retry(), 2);
    let finished: Mutex<HashMap<String, usize>> = Mutex::new(HashMap::new());

    fanout
        .translate_all(&source, &targets(&["fr", "ko"]), &Cancellation::new(), |target, done, total| {
            assert_eq!(total, 3);
            let mut finished = finished.lock();
            let entry = finished.entry(target.code.clone()).or_default();
            *entry = (*entry).max(done);
        })
        .await;

    let finished = finished.lock();
    assert_eq!(finished.get("fr"), Some(&3));
    assert_eq!(finished.get("ko"), Some(&3));
}

/// Test that cancellation returns promptly with the languages finished so far
#[tokio::test]
async fn test_translate_all_withCancellation_shouldStopEarly() {
    let source = common::sample_track();
    let fanout = FanOut::new(Arc::new(MockTranslator::slow(2_000)), fast_retry(), 2);
    let cancel = Cancellation::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let report = fanout.translate_all(&source, &targets(&["fr", "de"]), &cancel, |_, _, _| {}).await;

    assert!(report.cancelled);
    assert!(report.tracks.is_empty());
    assert!(started.elapsed() < Duration::from_secs(2));
}

/// Test that a language list with no entries produces nothing
#[tokio::test]
async fn test_translate_all_withNoTargets_shouldReturnEmptyReport() {
    let translator = Arc::new(MockTranslator::working());
    let fanout = FanOut::new(translator.clone(), fast_retry(), 2);

    let report = fanout.translate_all(&common::sample_track(), &[], &Cancellation::new(), |_, _, _| {}).await;

    assert!(report.tracks.is_empty());
    assert_eq!(translator.request_count(), 0);
}
