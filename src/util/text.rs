//! Text helpers for stored command output.

/// Marker appended to truncated output.
pub const TRUNCATION_MARKER: &str = "...(truncated)";

/// Cut `text` to at most `max_bytes` (on a char boundary) and append
/// [`TRUNCATION_MARKER`] when anything was dropped.
#[must_use]
pub fn truncate_with_marker(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + TRUNCATION_MARKER.len());
    out.push_str(&text[..end]);
    out.push_str(TRUNCATION_MARKER);
    out
}
