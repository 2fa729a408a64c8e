//! Wire protocol between the relay and remote clients.
//!
//! One JSON object per WebSocket text frame, discriminated by `type`.
//! Field names are camelCase.

use serde::{Deserialize, Serialize};
use tether_common::{ProtocolError, SessionId, WorkspaceId};
use tether_pty::ExecState;

/// Terminal size in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    pub cols: u16,
    pub rows: u16,
}

/// Session metadata sent to remote clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: SessionId,
    pub name: String,
    pub workspace_id: WorkspaceId,
    /// Whether a shell is currently running for this session.
    pub alive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ExecState>,
}

// =============================================================================
// CLIENT -> SERVER
// =============================================================================

/// Messages received from remote clients.
///
/// An omitted `workspaceId` means the workspace the connection
/// authenticated against.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "input", rename_all = "camelCase")]
    Input { session_id: SessionId, data: String },

    #[serde(rename = "getSessions", rename_all = "camelCase")]
    GetSessions { workspace_id: Option<WorkspaceId> },

    /// Start a shell when the desktop has none for the workspace yet.
    #[serde(rename = "spawn", rename_all = "camelCase")]
    Spawn {
        workspace_id: Option<WorkspaceId>,
        session_id: Option<SessionId>,
        name: Option<String>,
        cwd: Option<String>,
        command: Option<String>,
    },

    #[serde(rename = "resize", rename_all = "camelCase")]
    Resize {
        session_id: SessionId,
        cols: u16,
        rows: u16,
    },

    /// Request the full buffered history of a session.
    #[serde(rename = "syncSession", rename_all = "camelCase")]
    SyncSession { session_id: SessionId },

    #[serde(rename = "getSettings", rename_all = "camelCase")]
    GetSettings { workspace_id: Option<WorkspaceId> },

    /// Out-of-band payload (e.g. an image) for the desktop UI. Never
    /// written to a terminal.
    #[serde(rename = "paste", rename_all = "camelCase")]
    Paste {
        session_id: Option<SessionId>,
        mime_type: Option<String>,
        data: String,
    },
}

const CLIENT_TYPES: &[&str] = &[
    "input",
    "getSessions",
    "spawn",
    "resize",
    "syncSession",
    "getSettings",
    "paste",
];

impl ClientMessage {
    /// Decode one text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ProtocolError::Malformed("missing \"type\" field".into()))?;
        if !CLIENT_TYPES.contains(&kind) {
            return Err(ProtocolError::UnknownType(kind.to_string()));
        }

        serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

// =============================================================================
// SERVER -> CLIENT
// =============================================================================

/// Messages sent to remote clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "connected", rename_all = "camelCase")]
    Connected { workspace_id: WorkspaceId },

    #[serde(rename = "sessions", rename_all = "camelCase")]
    Sessions {
        workspace_id: WorkspaceId,
        sessions: Vec<SessionInfo>,
    },

    #[serde(rename = "history", rename_all = "camelCase")]
    History {
        session_id: SessionId,
        chunks: Vec<String>,
        dimensions: TerminalSize,
    },

    #[serde(rename = "settings", rename_all = "camelCase")]
    Settings {
        workspace_id: WorkspaceId,
        settings: serde_json::Value,
    },

    #[serde(rename = "dimensions", rename_all = "camelCase")]
    Dimensions {
        session_id: SessionId,
        cols: u16,
        rows: u16,
    },

    #[serde(rename = "data", rename_all = "camelCase")]
    Data { session_id: SessionId, data: String },

    #[serde(rename = "exit", rename_all = "camelCase")]
    Exit {
        session_id: SessionId,
        exit_code: Option<u32>,
    },

    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!("{{\"type\":\"error\",\"message\":\"encode failed: {e}\"}}"))
    }
}

// =============================================================================
// TESTS
// =============================================================================
