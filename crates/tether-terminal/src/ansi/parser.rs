//! Stateful stream parser wrapping `vte::Parser` and [`LineBuilder`].

use std::sync::atomic::{AtomicU64, Ordering};

use super::perform::LineBuilder;
use super::types::{OutputLine, StyledSpan};

/// Shared so ids stay unique when a consumer resets or rebuilds its parser.
static NEXT_LINE_ID: AtomicU64 = AtomicU64::new(1);

fn next_line_id() -> u64 {
    NEXT_LINE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Converts a raw terminal byte stream into [`OutputLine`]s.
///
/// The trailing incomplete line is held back until its line feed arrives;
/// [`AnsiParser::buffer_spans`] exposes it for progressive display and
/// [`AnsiParser::flush`] forces it out at stream teardown. SGR state
/// carries over from one line to the next, as on a real terminal.
pub struct AnsiParser {
    parser: vte::Parser,
    builder: LineBuilder,
    /// Raw bytes of the pending line, escapes included.
    raw: Vec<u8>,
}

impl AnsiParser {
    pub fn new() -> Self {
        Self {
            parser: vte::Parser::new(),
            builder: LineBuilder::default(),
            raw: Vec::new(),
        }
    }

    /// Feed a chunk and return every line it completed, in order.
    pub fn parse(&mut self, chunk: impl AsRef<[u8]>) -> Vec<OutputLine> {
        let mut lines = Vec::new();
        for &byte in chunk.as_ref() {
            self.raw.push(byte);
            self.parser.advance(&mut self.builder, &[byte]);
            if !self.builder.completed.is_empty() {
                for spans in std::mem::take(&mut self.builder.completed) {
                    let raw = std::mem::take(&mut self.raw);
                    lines.push(make_line(spans, &raw));
                }
            }
        }
        lines
    }

    /// Styled spans of the still-pending partial line.
    pub fn buffer_spans(&self) -> Vec<StyledSpan> {
        self.builder.spans.clone()
    }

    /// Plain text of the still-pending partial line.
    pub fn buffer_text(&self) -> String {
        self.builder.spans.iter().map(|s| s.text.as_str()).collect()
    }

    /// Emit the pending partial line, if any, and clear it.
    ///
    /// An escape sequence cut off mid-way is discarded.
    pub fn flush(&mut self) -> Option<OutputLine> {
        self.parser = vte::Parser::new();
        let spans = std::mem::take(&mut self.builder.spans);
        let raw = std::mem::take(&mut self.raw);
        if spans.is_empty() && raw.is_empty() {
            return None;
        }
        Some(make_line(spans, &raw))
    }

    /// Drop all state: pending text, partial escapes and current style.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for AnsiParser {
    fn default() -> Self {
        Self::new()
    }
}

fn make_line(spans: Vec<StyledSpan>, raw: &[u8]) -> OutputLine {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    OutputLine {
        id: next_line_id(),
        timestamp: chrono::Utc::now().timestamp_millis(),
        spans,
        raw: String::from_utf8_lossy(raw).into_owned(),
    }
}
