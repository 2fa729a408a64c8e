//! Styled text types produced by the parser.

use serde::Serialize;

/// A color selected by SGR parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SpanColor {
    /// Palette index: 0-7 standard, 8-15 bright, 16-255 extended.
    Indexed { index: u8 },
    /// 24-bit true color.
    Rgb { r: u8, g: u8, b: u8 },
}

impl SpanColor {
    pub fn indexed(index: u8) -> Self {
        SpanColor::Indexed { index }
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        SpanColor::Rgb { r, g, b }
    }
}

/// Text attributes shared by a run of characters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SpanStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fg: Option<SpanColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg: Option<SpanColor>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub dim: bool,
}

impl SpanStyle {
    pub fn is_plain(&self) -> bool {
        *self == SpanStyle::default()
    }
}

/// A run of text with a single style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyledSpan {
    pub text: String,
    #[serde(flatten)]
    pub style: SpanStyle,
}

impl StyledSpan {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: SpanStyle::default(),
        }
    }
}

/// One completed line of output. Never mutated after the parser emits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputLine {
    /// Monotonic across every parser in the process.
    pub id: u64,
    /// Unix milliseconds at emission.
    pub timestamp: i64,
    pub spans: Vec<StyledSpan>,
    /// Source text of the line, escapes included, line terminator removed.
    pub raw: String,
}

impl OutputLine {
    /// Concatenated text of all spans (escape sequences removed).
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}
