//! Heuristic detection of interactive prompts in recent terminal output.
//!
//! Patterns are evaluated in a fixed priority order and the first match
//! wins. False positives and negatives are acceptable: the result only
//! drives UI affordances such as quick-reply buttons.

mod detect;
mod patterns;
mod tracker;
mod types;


pub use detect::{detect_prompt, detect_prompt_in};
pub use tracker::PromptTracker;
pub use types::{InteractivePrompt, PromptKind, PromptOption};

/// Number of completed lines the detector looks back over.
pub const PROMPT_LOOKBACK: usize = 20;
