//! ANSI color helpers for the rendered report.
//!
//! Section headers are printed in green and failure markers in red. Coloring
//! only wraps existing text in escape sequences, so line structure is untouched.

pub const GREEN: &str = "\x1b[32m";
pub const RED: &str = "\x1b[31m";
pub const RESET: &str = "\x1b[0m";

/// Wraps `value` in `color` followed by a reset sequence.
pub fn colorize(color: &str, value: &str) -> String {
    let mut out = String::with_capacity(color.len() + value.len() + RESET.len());
    out.push_str(color);
    out.push_str(value);
    out.push_str(RESET);
    out
}

/// Recolors every occurrence of `marker` in `text` red.
///
/// Text without the marker is returned unchanged. The result must not be fed
/// to the table formatter, which would count the escape bytes as cell width.
pub fn colorize_error(text: &str, marker: &str) -> String {
    if marker.is_empty() || !text.contains(marker) {
        return text.to_string();
    }
    let highlighted = colorize(RED, marker);
    text.split(marker).collect::<Vec<_>>().join(&highlighted)
}
