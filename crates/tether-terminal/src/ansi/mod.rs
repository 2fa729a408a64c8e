//! ANSI stream parser: raw PTY bytes → styled, immutable output lines.
//!
//! Built on `vte`, so partial escape sequences and partial UTF-8 sequences
//! carry over between [`AnsiParser::parse`] calls. Line content never
//! depends on where the byte stream was split.

mod parser;
mod perform;
mod sgr;
mod types;


pub use parser::AnsiParser;
pub use types::{OutputLine, SpanColor, SpanStyle, StyledSpan};
