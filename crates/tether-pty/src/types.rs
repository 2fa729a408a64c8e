//! Session manager types: constants, execution state, spawn requests and
//! the output sink trait consumers implement.

use serde::{Deserialize, Serialize};
use tether_common::{SessionId, WorkspaceId};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Maximum bytes to read from a PTY in a single call (8 KB).
pub const PTY_READ_CHUNK: usize = 8_192;

/// Default ring buffer capacity, in chunks.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1_000;

/// Default terminal columns.
pub const DEFAULT_COLS: u16 = 80;

/// Default terminal rows.
pub const DEFAULT_ROWS: u16 = 24;

// =============================================================================
// EXECUTION STATE
// =============================================================================

/// Whether the shell is sitting at a prompt or running a command.
///
/// Best effort: driven by line terminators written to the session and by
/// shell prompt patterns seen in its output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecState {
    #[default]
    Idle,
    Executing,
}

// =============================================================================
// SPAWN REQUEST
// =============================================================================

/// Parameters for [`crate::SessionManager::spawn`].
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub session_id: SessionId,
    pub workspace_id: WorkspaceId,
    /// Working directory. `None` inherits the manager's own.
    pub cwd: Option<String>,
    pub display_name: String,
    /// Typed into the shell once it has settled.
    pub startup_command: Option<String>,
    /// Initial size. `None` uses the configured defaults.
    pub cols: Option<u16>,
    pub rows: Option<u16>,
}

impl SpawnRequest {
    pub fn new(session_id: impl Into<SessionId>, workspace_id: impl Into<WorkspaceId>) -> Self {
        let session_id = session_id.into();
        Self {
            display_name: session_id.to_string(),
            session_id,
            workspace_id: workspace_id.into(),
            cwd: None,
            startup_command: None,
            cols: None,
            rows: None,
        }
    }

    pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn startup_command(mut self, command: impl Into<String>) -> Self {
        self.startup_command = Some(command.into());
        self
    }

    pub fn size(mut self, cols: u16, rows: u16) -> Self {
        self.cols = Some(cols);
        self.rows = Some(rows);
        self
    }
}

// =============================================================================
// SESSION SUMMARY
// =============================================================================

/// Snapshot of a live session, as listed to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: SessionId,
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub state: ExecState,
    pub cols: u16,
    pub rows: u16,
}

// =============================================================================
// OUTPUT SINK
// =============================================================================

/// A consumer of session output.
///
/// Called from the session's reader thread; implementations must not
/// block for long. Output for one session arrives in order, with no
/// ordering guarantee across sessions.
pub trait OutputSink: Send + Sync {
    fn on_data(&self, session_id: &SessionId, data: &str);

    /// The session's process exited or was killed. Fired once per session
    /// instance.
    fn on_exit(&self, session_id: &SessionId, exit_code: Option<u32>);
}

// =============================================================================
// TESTS
// =============================================================================
