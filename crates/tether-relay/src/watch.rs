//! Prompt watching over live session output.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tether_common::SessionId;
use tether_pty::OutputSink;
use tether_terminal::{AnsiParser, InteractivePrompt, PromptTracker};

#[derive(Default)]
struct Watch {
    parser: AnsiParser,
    tracker: PromptTracker,
}

/// [`OutputSink`] that runs every session's output through an
/// [`AnsiParser`] and a [`PromptTracker`], logging each prompt that appears.
#[derive(Default)]
pub struct PromptWatchSink {
    sessions: Mutex<HashMap<SessionId, Watch>>,
}

impl PromptWatchSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, Watch>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The prompt currently showing in a session, if any.
    pub fn active_prompt(&self, session_id: &str) -> Option<InteractivePrompt> {
        self.sessions()
            .get(session_id)
            .and_then(|w| w.tracker.active().cloned())
    }
}

impl OutputSink for PromptWatchSink {
    fn on_data(&self, session_id: &SessionId, data: &str) {
        let mut sessions = self.sessions();
        let watch = sessions.entry(session_id.clone()).or_default();

        let lines = watch.parser.parse(data);
        watch.tracker.push_lines(lines);
        let pending = watch.parser.buffer_text();
        if let Some(prompt) = watch.tracker.observe(&pending) {
            tracing::info!(
                session = %session_id,
                kind = ?prompt.kind,
                options = prompt.options.len(),
                text = %prompt.raw_text,
                "interactive prompt detected"
            );
        }
    }

    fn on_exit(&self, session_id: &SessionId, _exit_code: Option<u32>) {
        self.sessions().remove(session_id);
    }
}
