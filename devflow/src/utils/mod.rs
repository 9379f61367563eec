//! Small shared helpers.

pub mod timestamps;

pub use timestamps::{elapsed_ms, format_iso8601, iso_timestamp, now_utc, Timestamp};

/// Returns at most `max_chars` characters of `text`, appending `...` when cut.
///
/// Used to keep request previews in log lines short.
#[must_use]
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
