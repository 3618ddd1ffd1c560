use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;
use crate::timecode;

// @module: Subtitle track model and SubRip serialization

// @const: SRT timing line
static TIMING_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\S+)\s+-->\s+(\S+)$").expect("valid timing line regex")
});

// @const: One or more blank lines
static BLOCK_SEPARATOR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\n(?:[ \t]*\n)+").expect("valid separator regex")
});

// @struct: Single timestamped unit of transcript or subtitle text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptUnit {
    // @field: One-based position in the track
    pub index: usize,

    // @field: Start in seconds
    pub start: f64,

    // @field: End in seconds
    pub end: f64,

    // @field: Unit text, may span several lines
    pub text: String,
}

impl TranscriptUnit {
    /// Creates a new unit without validation
    pub fn new(index: usize, start: f64, end: f64, text: impl Into<String>) -> Self {
        TranscriptUnit {
            index,
            start,
            end,
            text: text.into(),
        }
    }

    // @creates: Validated unit
    // @validates: Time range and non-empty text
    pub fn new_validated(index: usize, start: f64, end: f64, text: &str) -> Result<Self, PipelineError> {
        if !(start.is_finite() && end.is_finite()) || start < 0.0 {
            return Err(PipelineError::InvalidTrack {
                index,
                reason: format!("invalid timing {} -> {}", start, end),
            });
        }
        if end <= start {
            return Err(PipelineError::InvalidTrack {
                index,
                reason: format!("end {:.3}s is not after start {:.3}s", end, start),
            });
        }

        let text = normalize_text(text);
        if text.is_empty() {
            return Err(PipelineError::InvalidTrack {
                index,
                reason: "empty text".to_string(),
            });
        }

        Ok(TranscriptUnit::new(index, start, end, text))
    }

    /// Same timing and index, different text
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        TranscriptUnit {
            index: self.index,
            start: self.start,
            end: self.end,
            text: text.into(),
        }
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Start time as an SRT timestamp
    pub fn format_start_time(&self) -> String {
        timecode::format_srt_timestamp(self.start)
    }

    /// End time as an SRT timestamp
    pub fn format_end_time(&self) -> String {
        timecode::format_srt_timestamp(self.end)
    }
}

impl fmt::Display for TranscriptUnit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.index)?;
        writeln!(f, "{} --> {}", self.format_start_time(), self.format_end_time())?;
        writeln!(f, "{}", normalize_text(&self.text))?;
        writeln!(f)
    }
}

/// Ordered units for one language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    /// Language code or canonical name of the text
    pub language: String,

    /// Units sorted by start time, indexed 1..N
    pub units: Vec<TranscriptUnit>,
}

impl SubtitleTrack {
    /// Create an empty track
    pub fn new(language: impl Into<String>) -> Self {
        SubtitleTrack {
            language: language.into(),
            units: Vec::new(),
        }
    }

    /// Build a track from units in any order.
    ///
    /// Units are stably sorted by start, overlaps are trimmed to the next
    /// unit's start, units sharing a start are merged and the result is
    /// re-indexed 1..N.
    pub fn from_units(language: impl Into<String>, mut units: Vec<TranscriptUnit>) -> Self {
        units.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut normalized: Vec<TranscriptUnit> = Vec::with_capacity(units.len());
        for unit in units {
            match normalized.last_mut() {
                Some(prev) if unit.start <= prev.start => {
                    debug!("Merging unit starting at {:.3}s into the previous one", unit.start);
                    prev.end = prev.end.max(unit.end);
                    prev.text = format!("{} {}", prev.text, unit.text);
                }
                Some(prev) => {
                    if prev.end > unit.start {
                        prev.end = unit.start;
                    }
                    normalized.push(unit);
                }
                None => normalized.push(unit),
            }
        }

        let mut track = SubtitleTrack {
            language: language.into(),
            units: normalized,
        };
        track.reindex();
        track
    }

    /// Append a unit, assigning the next index
    pub fn push(&mut self, start: f64, end: f64, text: impl Into<String>) {
        let index = self.units.len() + 1;
        self.units.push(TranscriptUnit::new(index, start, end, text));
    }

    /// Renumber units 1..N in their current order
    pub fn reindex(&mut self) {
        for (i, unit) in self.units.iter_mut().enumerate() {
            unit.index = i + 1;
        }
    }

    /// Number of units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the track has no units
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// End of the last unit, in seconds
    pub fn duration(&self) -> f64 {
        self.units.last().map(|u| u.end).unwrap_or(0.0)
    }

    /// Check ordering, timing, indexing and text invariants.
    ///
    /// A track that passes, with millisecond timings, parses back from its
    /// own serialization unchanged.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (position, unit) in self.units.iter().enumerate() {
            let expected = position + 1;
            if unit.text.trim().is_empty() {
                return Err(PipelineError::InvalidTrack {
                    index: expected,
                    reason: "empty text".to_string(),
                });
            }
            if normalize_text(&unit.text) != unit.text {
                return Err(PipelineError::InvalidTrack {
                    index: expected,
                    reason: "text has blank lines or trailing whitespace".to_string(),
                });
            }
            if unit.index != expected {
                return Err(PipelineError::InvalidTrack {
                    index: expected,
                    reason: format!("index is {} but position is {}", unit.index, expected),
                });
            }
            if unit.start < 0.0 || unit.end <= unit.start {
                return Err(PipelineError::InvalidTrack {
                    index: expected,
                    reason: format!("end {:.3}s is not after start {:.3}s", unit.end, unit.start),
                });
            }
            if let Some(next) = self.units.get(position + 1) {
                if unit.end > next.start {
                    return Err(PipelineError::InvalidTrack {
                        index: expected,
                        reason: format!("overlaps unit {} ({:.3}s > {:.3}s)", expected + 1, unit.end, next.start),
                    });
                }
            }
        }
        Ok(())
    }

    /// Serialize the track in SubRip format
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for unit in &self.units {
            out.push_str(&unit.to_string());
        }
        out
    }

    /// Parse SubRip text, validating indices and timing of every block
    pub fn parse(content: &str, language: impl Into<String>) -> Result<Self, PipelineError> {
        let normalized = content.trim_start_matches('\u{feff}').replace("\r\n", "\n");
        let normalized = normalized.trim();

        let mut units = Vec::new();
        if normalized.is_empty() {
            return Ok(SubtitleTrack { language: language.into(), units });
        }

        for (position, block) in BLOCK_SEPARATOR_REGEX.split(normalized).enumerate() {
            let index = position + 1;
            units.push(Self::parse_block(block, index)?);
        }

        let track = SubtitleTrack { language: language.into(), units };
        let overlaps = track.units.windows(2).filter(|w| w[0].end > w[1].start).count();
        if overlaps > 0 {
            warn!("Found {} overlapping subtitle entries", overlaps);
        }
        Ok(track)
    }

    fn parse_block(block: &str, index: usize) -> Result<TranscriptUnit, PipelineError> {
        let format_error = |reason: String| PipelineError::SerializationFormatError { index, reason };
        let mut lines = block.lines().map(str::trim_end);

        let index_line = lines.next().map(str::trim).unwrap_or_default();
        let parsed_index: usize = index_line
            .parse()
            .map_err(|_| format_error(format!("expected index line, found '{}'", index_line)))?;
        if parsed_index != index {
            return Err(format_error(format!(
                "index {} is out of sequence, expected {}",
                parsed_index, index
            )));
        }

        let timing_line = lines
            .next()
            .map(str::trim)
            .ok_or_else(|| format_error("missing timing line".to_string()))?;
        let caps = TIMING_LINE_REGEX
            .captures(timing_line)
            .ok_or_else(|| format_error(format!("invalid timing line '{}'", timing_line)))?;
        let start = timecode::parse_srt_timestamp(&caps[1]).map_err(|e| format_error(e.to_string()))?;
        let end = timecode::parse_srt_timestamp(&caps[2]).map_err(|e| format_error(e.to_string()))?;
        if start >= end {
            return Err(format_error(format!(
                "start {} is not before end {}",
                &caps[1], &caps[2]
            )));
        }

        let text = lines.collect::<Vec<_>>().join("\n");
        if text.trim().is_empty() {
            return Err(format_error("missing subtitle text".to_string()));
        }

        Ok(TranscriptUnit::new(index, start, end, text))
    }

    /// Write the track to an SRT file, creating parent directories
    pub fn write_to_srt<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        fs::write(path, self.serialize())
            .with_context(|| format!("Failed to write subtitle file: {}", path.display()))?;
        Ok(())
    }

    /// Read and parse an SRT file
    pub fn read_from_srt<P: AsRef<Path>>(path: P, language: &str) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read subtitle file: {}", path.display()))?;
        let track = Self::parse(&content, language)
            .with_context(|| format!("Failed to parse subtitle file: {}", path.display()))?;
        Ok(track)
    }
}

impl fmt::Display for SubtitleTrack {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Subtitle Track")?;
        writeln!(f, "Language: {}", self.language)?;
        writeln!(f, "Units: {}", self.units.len())?;
        writeln!(f, "Duration: {}", timecode::format_srt_timestamp(self.duration()))
    }
}

/// Unit text as SRT keeps it: trailing whitespace and blank lines dropped
/// so a block never splits in two
pub fn normalize_text(text: &str) -> String {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
