//! Tests for utility functions

use chrono::{Duration, Utc};
use queuectl::util::{format_ts, now_utc, parse_ts, truncate_with_marker, TRUNCATION_MARKER};

#[test]
fn test_timestamps_sort_lexically() {
    let earlier = now_utc();
    let later = earlier + Duration::microseconds(1);
    assert!(format_ts(&earlier) < format_ts(&later));
    assert_eq!(format_ts(&earlier).len(), format_ts(&later).len());
}

#[test]
fn test_parse_accepts_offsets() {
    let parsed = parse_ts("2024-05-01T12:00:00.000000+02:00").unwrap();
    assert_eq!(format_ts(&parsed), "2024-05-01T10:00:00.000000Z");
    assert!(parse_ts("yesterday").is_err());
}

#[test]
fn test_now_is_microsecond_precision() {
    let now = now_utc();
    assert_eq!(now.timestamp_subsec_nanos() % 1_000, 0);
    assert!(now <= Utc::now());
}

#[test]
fn test_truncate_long_text() {
    let text = "x".repeat(100);
    let out = truncate_with_marker(&text, 10);
    assert_eq!(out, format!("{}{}", "x".repeat(10), TRUNCATION_MARKER));
}
