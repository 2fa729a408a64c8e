use serde::{Deserialize, Serialize};

/// PTY session manager settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PtyConfig {
    /// Output chunks retained per session for replay (valid range: 1-100000).
    pub buffer_capacity: usize,
    /// Delay before a startup command is typed into a fresh shell (0-10000 ms).
    pub startup_delay_ms: u64,
    /// Initial terminal columns.
    pub default_cols: u16,
    /// Initial terminal rows.
    pub default_rows: u16,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 1000,
            startup_delay_ms: 500,
            default_cols: 80,
            default_rows: 24,
        }
    }
}
