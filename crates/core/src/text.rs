//! Small text helpers shared by the tools, the loop, and the supervisor.

/// Suffix appended whenever output is cut short.
pub const TRUNCATION_SUFFIX: &str = "\n... (truncated)";

/// Cut `text` to at most `max_chars` characters, appending
/// [`TRUNCATION_SUFFIX`] when anything was dropped.
pub fn truncate_with_suffix(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{TRUNCATION_SUFFIX}", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Cut `text` to at most `max_chars` characters without any marker.
pub fn clip(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
