//! Keeps the detection window and the currently active prompt.

use std::collections::VecDeque;

use crate::ansi::OutputLine;

use super::detect::detect_prompt;
use super::types::InteractivePrompt;
use super::PROMPT_LOOKBACK;

/// Tracks recent lines for one session and reports prompt changes.
///
/// A detected prompt only replaces the active one when its raw match text
/// differs from the last reported prompt, so re-detecting an unchanged
/// prompt on every output event does not flicker.
#[derive(Debug, Default)]
pub struct PromptTracker {
    recent: VecDeque<OutputLine>,
    active: Option<InteractivePrompt>,
    last_raw: Option<String>,
}

impl PromptTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append completed lines, keeping only the lookback window.
    pub fn push_lines(&mut self, lines: impl IntoIterator<Item = OutputLine>) {
        for line in lines {
            if self.recent.len() == PROMPT_LOOKBACK {
                self.recent.pop_front();
            }
            self.recent.push_back(line);
        }
    }

    /// Run detection over the window plus `pending`.
    ///
    /// Returns the prompt when it became active on this call.
    pub fn observe(&mut self, pending: &str) -> Option<&InteractivePrompt> {
        let lines = self.recent.make_contiguous();
        let detected = detect_prompt(lines, pending)?;
        if self.last_raw.as_deref() == Some(detected.raw_text.as_str()) {
            return None;
        }
        self.last_raw = Some(detected.raw_text.clone());
        self.active = Some(detected);
        self.active.as_ref()
    }

    pub fn active(&self) -> Option<&InteractivePrompt> {
        self.active.as_ref()
    }

    /// Dismiss the active prompt. The dismissed prompt's text is remembered,
    /// so it is not raised again while it stays on screen.
    pub fn clear(&mut self) {
        self.active = None;
    }

    /// Forget the window, the active prompt and the remembered prompt text.
    pub fn reset(&mut self) {
        self.recent.clear();
        self.active = None;
        self.last_raw = None;
    }

    pub fn recent_lines(&self) -> impl Iterator<Item = &OutputLine> {
        self.recent.iter()
    }
}
