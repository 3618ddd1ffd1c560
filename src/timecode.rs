/*!
 * Clock string formatting and parsing.
 *
 * Two shapes are supported: the display clock `HH:MM:SS` used by the
 * editable transcript, and the SubRip timestamp `HH:MM:SS,mmm`. Timing math
 * stays in `f64` seconds; only the string forms are quantized.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::TimecodeError;

// @const: Display clock, two-digit hours
static CLOCK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{2}):(\d{2}):(\d{2})$").expect("valid clock regex")
});

// @const: SRT timestamp, two-digit hours and three-digit millis
static SRT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{2}):(\d{2}):(\d{2}),(\d{3})$").expect("valid srt timestamp regex")
});

/// Convert seconds to whole milliseconds, rounding to the nearest one.
/// Negative and non-finite values map to zero.
pub fn to_millis(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * 1000.0).round() as u64
}

/// Convert whole milliseconds back to seconds
pub fn from_millis(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

/// Format seconds as `HH:MM:SS`, truncating the fractional part
pub fn format_clock(seconds: f64) -> String {
    let total = if !seconds.is_finite() || seconds <= 0.0 {
        0
    } else {
        seconds.trunc() as u64
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Parse `HH:MM:SS` into seconds
pub fn parse_clock(text: &str) -> Result<f64, TimecodeError> {
    let caps = CLOCK_REGEX
        .captures(text.trim())
        .ok_or_else(|| TimecodeError::InvalidFormat(text.to_string()))?;

    let hours = component(&caps, 1, text)?;
    let minutes = component(&caps, 2, text)?;
    let seconds = component(&caps, 3, text)?;
    if minutes >= 60 || seconds >= 60 {
        return Err(TimecodeError::OutOfRange(text.to_string()));
    }

    Ok((hours * 3600 + minutes * 60 + seconds) as f64)
}

/// Format seconds as a SubRip timestamp (`HH:MM:SS,mmm`)
pub fn format_srt_timestamp(seconds: f64) -> String {
    let ms = to_millis(seconds);
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let secs = (ms % 60_000) / 1_000;
    let millis = ms % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Parse a SubRip timestamp (`HH:MM:SS,mmm`) into seconds
pub fn parse_srt_timestamp(text: &str) -> Result<f64, TimecodeError> {
    let caps = SRT_REGEX
        .captures(text.trim())
        .ok_or_else(|| TimecodeError::InvalidFormat(text.to_string()))?;

    let hours = component(&caps, 1, text)?;
    let minutes = component(&caps, 2, text)?;
    let seconds = component(&caps, 3, text)?;
    let millis = component(&caps, 4, text)?;
    if minutes >= 60 || seconds >= 60 {
        return Err(TimecodeError::OutOfRange(text.to_string()));
    }

    let total_ms = hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis;
    Ok(from_millis(total_ms))
}

fn component(caps: &regex::Captures, group: usize, text: &str) -> Result<u64, TimecodeError> {
    caps.get(group)
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .ok_or_else(|| TimecodeError::InvalidFormat(text.to_string()))
}
