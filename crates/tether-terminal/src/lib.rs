//! Text pipeline for mirrored terminal output.
//!
//! [`AnsiParser`] turns a raw PTY byte stream into immutable styled lines,
//! and [`detect_prompt`] / [`PromptTracker`] recognise interactive prompts
//! (yes/no questions, numbered menus, single-key choices) in recent output.
//! Neither touches the PTY; both are fed by output consumers.

pub mod ansi;
pub mod prompt;

pub use ansi::{AnsiParser, OutputLine, SpanColor, SpanStyle, StyledSpan};
pub use prompt::{
    detect_prompt, InteractivePrompt, PromptKind, PromptOption, PromptTracker, PROMPT_LOOKBACK,
};
