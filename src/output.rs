//! Report accumulation.
//!
//! Every cycle composes its whole report into an `OutputBuffer` and prints it
//! once, so the line count is known before the pane is resized.

use crate::ansi::{colorize, GREEN};

pub const BUILD_HEADER: &str = "-- BUILD";
pub const TEST_HEADER: &str = "-- TEST";
pub const WAIT_HEADER: &str = "-- WAIT";

/// An append-only text accumulator for one cycle's report.
///
/// Runs of newlines are capped at two, so the report never shows more than a
/// single blank line in a row.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    text: String,
}

impl OutputBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `text`, followed by a newline when `newline` is set.
    pub fn append(&mut self, text: &str, newline: bool) {
        for ch in text.chars() {
            self.push(ch);
        }
        if newline {
            self.push('\n');
        }
    }

    /// Appends a line break unless the buffer already ends in a blank line.
    ///
    /// Repeated calls are idempotent.
    pub fn add_newline(&mut self) {
        self.push('\n');
    }

    /// Appends a green section header on its own line.
    pub fn header(&mut self, title: &str) {
        self.append(&colorize(GREEN, title), true);
    }

    /// Returns the report and the number of rows to reserve for it.
    ///
    /// The count is one more than the number of newline-separated segments,
    /// leaving room for the cursor line below the report.
    pub fn render(&self) -> (&str, usize) {
        (&self.text, self.text.split('\n').count() + 1)
    }

    #[cfg(test)]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    fn push(&mut self, ch: char) {
        if ch == '\n' && self.text.ends_with("\n\n") {
            return;
        }
        self.text.push(ch);
    }
}
