/*!
 * Tests for clock string formatting and parsing
 */

use polysub::errors::TimecodeError;
use polysub::timecode::{format_clock, format_srt_timestamp, parse_clock, parse_srt_timestamp, to_millis};

/// Test that display clocks drop the fractional second
#[test]
fn test_format_clock_withFraction_shouldTruncate() {
    assert_eq!(format_clock(4.999), "00:00:04");
    assert_eq!(format_clock(35.0), "00:00:35");
    assert_eq!(format_clock(7325.2), "02:02:05");
}

/// Test that hours beyond two digits widen the clock
#[test]
fn test_format_clock_withHundredHours_shouldWiden() {
    assert_eq!(format_clock(100.0 * 3600.0), "100:00:00");
}

/// Test that SRT timestamps round to the nearest millisecond
#[test]
fn test_format_srt_timestamp_withSubMillisecond_shouldRound() {
    assert_eq!(format_srt_timestamp(1.0004), "00:00:01,000");
    assert_eq!(format_srt_timestamp(1.0006), "00:00:01,001");
    assert_eq!(format_srt_timestamp(35.0), "00:00:35,000");
}

/// Test that formatted timestamps parse back to the same milliseconds
#[test]
fn test_parse_srt_timestamp_withFormattedValue_shouldMatchMillis() {
    for seconds in [0.0, 0.001, 1.5, 59.999, 3599.5, 86399.123] {
        let parsed = parse_srt_timestamp(&format_srt_timestamp(seconds)).unwrap();
        assert_eq!(to_millis(parsed), to_millis(seconds));
    }
}

/// Test that malformed timestamps are rejected
#[test]
fn test_parse_srt_timestamp_withMalformedText_shouldFail() {
    assert!(matches!(parse_srt_timestamp("1:02:03,000"), Err(TimecodeError::InvalidFormat(_))));
    assert!(matches!(parse_srt_timestamp("00:00:03,5"), Err(TimecodeError::InvalidFormat(_))));
    assert!(matches!(parse_srt_timestamp("00:00:60,000"), Err(TimecodeError::OutOfRange(_))));
}

/// Test that display clocks parse to whole seconds
#[test]
fn test_parse_clock_withValidClock_shouldReturnSeconds() {
    assert_eq!(parse_clock("01:02:03").unwrap(), 3723.0);
    assert!(matches!(parse_clock("00:75:00"), Err(TimecodeError::OutOfRange(_))));
    assert!(matches!(parse_clock("nope"), Err(TimecodeError::InvalidFormat(_))));
}
