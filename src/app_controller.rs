use anyhow::{Context, Result, anyhow};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::Config;
use crate::audio::{AudioDecoder, FfmpegDecoder};
use crate::cancellation::Cancellation;
use crate::file_utils::{FileManager, FileType};
use crate::language_utils::{self, TargetLanguage};
use crate::providers::openai::OpenAI;
use crate::providers::{Transcriber, Translator};
use crate::reconcile;
use crate::subtitle_processor::SubtitleTrack;
use crate::transcription::{ChunkFailure, Transcript, TranscriptionAggregator};
use crate::translation::{FanOut, FanOutReport, TranslationCache, UnitFailure};

// @module: Application controller for the subtitle pipeline

/// One pipeline run over a single input
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Media file or source-language SRT
    pub input: PathBuf,

    /// Languages to produce
    pub targets: Vec<TargetLanguage>,

    /// Human-edited transcript text to reconcile before translating
    pub edited: Option<PathBuf>,

    /// Output directory, the input's directory when unset
    pub output_dir: Option<PathBuf>,

    /// Replace existing outputs
    pub force_overwrite: bool,
}

/// Files produced by the transcription stage
#[derive(Debug, Clone)]
pub struct TranscribeOutcome {
    pub transcript: Transcript,
    pub srt_path: PathBuf,
    pub transcript_path: PathBuf,
}

// @struct: Per-language entry of the run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageReport {
    pub code: String,
    pub canonical_name: String,
    pub display_name: String,
    pub output: PathBuf,
    // @field: False when an existing file was kept
    pub written: bool,
    pub units: usize,
    pub degraded: Vec<UnitFailure>,
}

// @struct: Diagnostics written next to the outputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub input: PathBuf,
    pub source_language: String,
    pub original_units: usize,
    pub chunks_attempted: usize,
    pub chunk_failures: Vec<ChunkFailure>,
    pub edited: Option<PathBuf>,
    pub languages: Vec<LanguageReport>,
    pub cancelled: bool,
    pub elapsed_secs: f64,
    pub generated_at: String,
}

impl RunReport {
    /// Degraded units across all languages
    pub fn degraded_units(&self) -> usize {
        self.languages.iter().map(|l| l.degraded.len()).sum()
    }
}

/// Outcome counts of a folder run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderSummary {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Main application controller
pub struct Controller {
    // @field: App configuration
    config: Config,

    // @field: Media decode collaborator
    decoder: Arc<dyn AudioDecoder>,

    // @field: Speech-to-text collaborator
    transcriber: Arc<dyn Transcriber>,

    // @field: Translation collaborator
    translator: Arc<dyn Translator>,

    // @field: Run-wide cancellation flag
    cancel: Cancellation,

    // @field: Draw progress bars
    show_progress: bool,
}

impl Controller {
    // @method: Build the production collaborators from the configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let t = &config.transcription;
        let decoder = Arc::new(FfmpegDecoder::new(&t.ffmpeg_path, t.sample_rate, t.decode_timeout()));

        let tr = &config.translation;
        let api_key = |key: String| if key.is_empty() { None } else { Some(key) };

        let transcriber = OpenAI::new(
            tr.get_transcription_endpoint(),
            api_key(tr.get_transcription_api_key()),
            Duration::from_secs(t.timeout_secs),
        )
        .transcription_model(&t.model);

        let translator = OpenAI::new(tr.get_endpoint(), api_key(tr.get_api_key()), tr.get_timeout())
            .chat_model(tr.get_model())
            .system_prompt(&tr.common.system_prompt)
            .temperature(tr.common.temperature);

        Ok(Self::with_collaborators(
            config,
            decoder,
            Arc::new(transcriber),
            Arc::new(translator),
        ))
    }

    // @method: Build with explicit collaborators
    pub fn with_collaborators(
        config: Config,
        decoder: Arc<dyn AudioDecoder>,
        transcriber: Arc<dyn Transcriber>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            config,
            decoder,
            transcriber,
            translator,
            cancel: Cancellation::new(),
            show_progress: false,
        }
    }

    /// Share an externally owned cancellation flag
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancel
    }

    // @returns: File tag of the source language
    fn source_tag(&self) -> String {
        language_utils::normalize_to_part1_or_part2t(&self.config.source_language)
            .unwrap_or_else(|_| self.config.source_language.to_lowercase())
    }

    fn output_dir_for(input: &Path, requested: Option<&Path>) -> PathBuf {
        requested
            .map(Path::to_path_buf)
            .unwrap_or_else(|| FileManager::default_output_dir(input))
    }

    fn progress_bar(&self, multi: Option<&MultiProgress>, len: u64, unit: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len);
        let style = ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{percent}}%) {{msg}} {{eta}}",
                unit
            ))
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style.progress_chars("█▓▒░"));

        match multi {
            Some(multi) => multi.add(pb),
            None => pb,
        }
    }

    /// Decode, chunk and transcribe a media file, then write the source SRT
    /// and the editable transcript
    pub async fn transcribe_media(&self, input: &Path, output_dir: &Path, force_overwrite: bool) -> Result<TranscribeOutcome> {
        let t = &self.config.transcription;
        let source_tag = self.source_tag();

        info!("Decoding audio: {:?}", input);
        let audio = self.decoder.decode(input).await?;
        info!(
            "Decoded {} of audio at {} Hz",
            Self::format_duration(Duration::from_secs_f64(audio.duration.max(0.0))),
            audio.sample_rate
        );

        let chunks = audio.chunks(t.chunk_secs)?;
        let aggregator = TranscriptionAggregator::new(self.transcriber.clone(), t.retry_policy(), t.concurrent_requests);

        let pb = self.progress_bar(None, chunks.chunk_count() as u64, "chunks");
        pb.set_message("Transcribing");
        let transcript = aggregator
            .aggregate(chunks, &source_tag, &self.cancel, |done, total| {
                pb.set_length(total as u64);
                pb.set_position(done as u64);
            })
            .await;
        pb.finish_and_clear();
        let transcript = transcript?;
        drop(audio);

        if !transcript.is_complete() {
            warn!(
                "{} of {} chunk(s) could not be transcribed; their time ranges have no subtitles",
                transcript.failures.len(),
                transcript.chunks_attempted
            );
        }

        let stem = FileManager::output_stem(input, None);
        let srt_path = FileManager::generate_output_path(&stem, output_dir, &source_tag, "srt");
        FileManager::write_output(&srt_path, &transcript.track.serialize(), force_overwrite)?;

        let transcript_path = FileManager::generate_output_path(&stem, output_dir, "transcript", "txt");
        FileManager::write_output(&transcript_path, &reconcile::render(&transcript.track), force_overwrite)?;

        info!("Transcript: {} unit(s) -> {}", transcript.track.len(), srt_path.display());

        Ok(TranscribeOutcome {
            transcript,
            srt_path,
            transcript_path,
        })
    }

    /// Apply an edited transcript file to `original`
    pub fn apply_edits(&self, original: &SubtitleTrack, edited_path: &Path) -> Result<SubtitleTrack> {
        let edited = FileManager::read_to_string(edited_path)?;
        let track = reconcile::reconcile(original, &edited)
            .with_context(|| format!("Failed to apply edits from {:?}", edited_path))?;
        info!("Applied edits from {:?} to {} unit(s)", edited_path, track.len());
        Ok(track)
    }

    /// Fan `source` out to every target and write one SRT per language
    pub async fn translate_track(
        &self,
        source: &SubtitleTrack,
        targets: &[TargetLanguage],
        stem: &str,
        output_dir: &Path,
        force_overwrite: bool,
    ) -> Result<(FanOutReport, Vec<LanguageReport>)> {
        let tr = &self.config.translation;
        let source_name = self
            .config
            .source_language_name()
            .unwrap_or_else(|_| self.config.source_language.clone());

        info!("Translating with {} - {}", tr.provider.display_name(), tr.get_model());

        let fanout = FanOut::new(self.translator.clone(), tr.retry_policy(), tr.optimal_concurrent_requests())
            .with_fallback(tr.common.fallback)
            .with_cache(TranslationCache::new(tr.common.cache_enabled))
            .with_source_language(source_name);

        let multi = MultiProgress::new();
        let bars: HashMap<String, ProgressBar> = targets
            .iter()
            .map(|target| {
                let pb = self.progress_bar(Some(&multi), source.len() as u64, "units");
                pb.set_message(target.display_name.clone());
                (target.code.clone(), pb)
            })
            .collect();

        let report = fanout
            .translate_all(source, targets, &self.cancel, |target, done, _total| {
                if let Some(pb) = bars.get(&target.code) {
                    pb.set_position(done as u64);
                }
            })
            .await;
        for pb in bars.values() {
            pb.finish_and_clear();
        }

        let (hits, _, hit_rate) = fanout.cache().stats();
        if hits > 0 {
            info!("Translation cache: {} hit(s) ({:.0}%)", hits, hit_rate * 100.0);
        }

        let mut languages = Vec::with_capacity(report.tracks.len());
        for language_track in &report.tracks {
            if let Err(e) = language_track.track.validate() {
                warn!("{} track breaks ordering: {}", language_track.language.canonical_name, e);
            }

            let path = FileManager::generate_output_path(stem, output_dir, &language_track.language.code, "srt");
            let written = FileManager::write_output(&path, &language_track.track.serialize(), force_overwrite)?;
            if written {
                info!("Success: {}", path.display());
            }

            languages.push(LanguageReport {
                code: language_track.language.code.clone(),
                canonical_name: language_track.language.canonical_name.clone(),
                display_name: language_track.language.display_name.clone(),
                output: path,
                written,
                units: language_track.track.len(),
                degraded: language_track.degraded.clone(),
            });
        }

        Ok((report, languages))
    }

    /// Run the whole pipeline over one input and write the run report
    pub async fn run(&self, request: RunRequest) -> Result<RunReport> {
        let start_time = Instant::now();
        let input = &request.input;
        if !input.exists() {
            return Err(anyhow!("Input file does not exist: {:?}", input));
        }

        let output_dir = Self::output_dir_for(input, request.output_dir.as_deref());
        FileManager::ensure_dir(&output_dir)?;
        let source_tag = self.source_tag();

        let targets: Vec<TargetLanguage> = request
            .targets
            .iter()
            .filter(|target| {
                let same = language_utils::language_codes_match(&target.code, &source_tag);
                if same {
                    warn!("Skipping {}: it is the source language", target.canonical_name);
                }
                !same
            })
            .cloned()
            .collect();

        // Source track: existing SRT input, a previous transcript, or a fresh one
        let file_type = FileManager::detect_file_type(input)?;
        let (stem, original, chunks_attempted, chunk_failures) = match file_type {
            FileType::Subtitle => {
                info!("Detected subtitle file, skipping transcription");
                let stem = FileManager::output_stem(input, Some(&source_tag));
                let track = SubtitleTrack::read_from_srt(input, &source_tag)?;
                (stem, track, 0, Vec::new())
            }
            FileType::Media => {
                let stem = FileManager::output_stem(input, None);
                let existing = FileManager::generate_output_path(&stem, &output_dir, &source_tag, "srt");
                if FileManager::file_exists(&existing) && !request.force_overwrite {
                    info!("Reusing existing transcript {:?} (use --force-overwrite to redo it)", existing);
                    let track = SubtitleTrack::read_from_srt(&existing, &source_tag)?;
                    (stem, track, 0, Vec::new())
                } else {
                    let outcome = self.transcribe_media(input, &output_dir, request.force_overwrite).await?;
                    let Transcript {
                        track,
                        failures,
                        chunks_attempted,
                    } = outcome.transcript;
                    (stem, track, chunks_attempted, failures)
                }
            }
            FileType::Unknown => {
                return Err(anyhow!("Unsupported input type: {:?}", input));
            }
        };

        // Originals are on disk before edits are applied
        let source = match &request.edited {
            Some(edited_path) => {
                let reconciled = self.apply_edits(&original, edited_path)?;
                let edited_tag = format!("{}.edited", source_tag);
                let path = FileManager::generate_output_path(&stem, &output_dir, &edited_tag, "srt");
                FileManager::write_output(&path, &reconciled.serialize(), true)?;
                reconciled
            }
            None => original.clone(),
        };

        let (cancelled, languages) = if targets.is_empty() {
            warn!("No target languages requested; only the source track was produced");
            (self.cancel.is_cancelled(), Vec::new())
        } else {
            let (fanout, languages) = self
                .translate_track(&source, &targets, &stem, &output_dir, request.force_overwrite)
                .await?;
            (fanout.cancelled, languages)
        };

        let report = RunReport {
            input: input.clone(),
            source_language: source_tag,
            original_units: original.len(),
            chunks_attempted,
            chunk_failures,
            edited: request.edited.clone(),
            languages,
            cancelled,
            elapsed_secs: start_time.elapsed().as_secs_f64(),
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };

        let report_path = FileManager::generate_output_path(&stem, &output_dir, "report", "json");
        let report_json = serde_json::to_string_pretty(&report).context("Failed to serialize run report")?;
        FileManager::write_to_file(&report_path, &report_json)?;

        info!(
            "Finished {:?} in {}: {} language(s), {} degraded unit(s), {} failed chunk(s){}",
            input.file_name().unwrap_or_default(),
            Self::format_duration(start_time.elapsed()),
            report.languages.len(),
            report.degraded_units(),
            report.chunk_failures.len(),
            if report.cancelled { ", cancelled" } else { "" }
        );

        Ok(report)
    }

    /// Run the pipeline for every media file under `input_dir`
    pub async fn run_folder(&self, input_dir: &Path, template: &RunRequest) -> Result<FolderSummary> {
        let start_time = Instant::now();
        if !input_dir.is_dir() {
            return Err(anyhow!("Input directory does not exist: {:?}", input_dir));
        }

        let media_files = FileManager::find_media_files(input_dir)?;
        if media_files.is_empty() {
            return Err(anyhow!("No media files found in directory: {:?}", input_dir));
        }

        let folder_pb = self.progress_bar(None, media_files.len() as u64, "files");
        folder_pb.set_message("Processing files");

        let mut summary = FolderSummary::default();
        for media_file in &media_files {
            if self.cancel.is_cancelled() {
                summary.skipped += 1;
                continue;
            }

            let file_name = media_file
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            folder_pb.set_message(format!("Processing: {}", file_name));

            let request = RunRequest {
                input: media_file.clone(),
                edited: None,
                ..template.clone()
            };
            match self.run(request).await {
                Ok(_) => summary.processed += 1,
                Err(e) => {
                    error!("Error processing file {}: {:#}", file_name, e);
                    summary.failed += 1;
                }
            }
            folder_pb.inc(1);
        }
        folder_pb.finish_and_clear();

        info!(
            "Folder processing completed in {}: {} processed, {} skipped, {} errors",
            Self::format_duration(start_time.elapsed()),
            summary.processed,
            summary.skipped,
            summary.failed
        );

        Ok(summary)
    }

    // Format duration in a human-readable format
    fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
