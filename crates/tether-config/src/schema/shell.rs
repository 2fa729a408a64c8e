//! `[shell]` section.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The shell launched for every session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Program to run. Empty picks `$SHELL` (or `%COMSPEC%` on Windows).
    pub program: String,
    /// Arguments appended after the login flag.
    pub args: Vec<String>,
    /// Variables set on top of the inherited environment.
    pub env: HashMap<String, String>,
    /// Pass `-l` on Unix so profile scripts run.
    pub login_shell: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: Vec::new(),
            env: HashMap::new(),
            login_shell: true,
        }
    }
}

impl ShellConfig {
    /// The explicitly configured program, if any.
    pub fn program(&self) -> Option<&str> {
        let program = self.program.trim();
        (!program.is_empty()).then_some(program)
    }
}
