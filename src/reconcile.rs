/*!
 * Editable transcript rendering and reconciliation.
 *
 * A track is flattened into blank-line separated blocks of the form
 * `[HH:MM:SS - HH:MM:SS] text`. After a human edits the text, the blocks are
 * mapped back onto the original units by position. The bracketed time range
 * is informational only: timings always come from the original track.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::PipelineError;
use crate::subtitle_processor::{self, SubtitleTrack};
use crate::timecode;

static BLOCK_SEPARATOR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\n(?:[ \t]*\n)+").expect("valid separator regex")
});

// Leading `[HH:MM:SS - HH:MM:SS]`, hours may be wider than two digits
static TIME_RANGE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[\s*\d{2,}:\d{2}:\d{2}\s*-\s*\d{2,}:\d{2}:\d{2}\s*\]\s*").expect("valid time range regex")
});

/// Flatten a track into editable text
pub fn render(track: &SubtitleTrack) -> String {
    let mut out = String::new();
    for unit in &track.units {
        out.push_str(&format!(
            "[{} - {}] {}\n\n",
            timecode::format_clock(unit.start),
            timecode::format_clock(unit.end),
            unit.text.trim()
        ));
    }
    out
}

/// Edited text paired with the track it was rendered from
#[derive(Debug, Clone, Copy)]
pub struct EditSession<'a> {
    pub original: &'a SubtitleTrack,
    pub edited: &'a str,
}

impl<'a> EditSession<'a> {
    pub fn new(original: &'a SubtitleTrack, edited: &'a str) -> Self {
        EditSession { original, edited }
    }

    /// Non-empty blocks of the edited text with the time range removed
    pub fn blocks(&self) -> Vec<&'a str> {
        let edited: &'a str = self.edited;
        BLOCK_SEPARATOR_REGEX
            .split(edited)
            .map(str::trim)
            .filter(|block| !block.is_empty())
            .collect()
    }

    /// Build a new track with the edited text and the original timings
    pub fn reconcile(&self) -> Result<SubtitleTrack, PipelineError> {
        let normalized = self.edited.replace("\r\n", "\n").replace('\r', "\n");
        let session = EditSession::new(self.original, &normalized);
        let blocks = session.blocks();

        let expected = self.original.len();
        if blocks.len() != expected {
            return Err(PipelineError::ReconciliationShapeMismatch {
                expected,
                found: blocks.len(),
            });
        }

        let mut units = Vec::with_capacity(expected);
        for (position, (unit, block)) in self.original.units.iter().zip(blocks).enumerate() {
            let text = subtitle_processor::normalize_text(TIME_RANGE_REGEX.replace(block, "").trim());
            if text.is_empty() {
                return Err(PipelineError::EmptyEditedBlock { index: position + 1 });
            }
            units.push(unit.with_text(text));
        }

        Ok(SubtitleTrack {
            language: self.original.language.clone(),
            units,
        })
    }
}

/// Apply edited text to `original`, which is left untouched
pub fn reconcile(original: &SubtitleTrack, edited: &str) -> Result<SubtitleTrack, PipelineError> {
    EditSession::new(original, edited).reconcile()
}
