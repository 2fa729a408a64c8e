//! Connection handshake: query parameters in, workspace or close code out.

use serde::Deserialize;
use tether_common::WorkspaceId;

use crate::tokens::TokenStore;

/// Query parameters of the WebSocket upgrade request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeParams {
    pub token: Option<String>,
    pub workspace_id: Option<String>,
    /// Older clients send the workspace under this name.
    pub directory_id: Option<String>,
    /// Informational only.
    pub ws_port: Option<String>,
}

impl HandshakeParams {
    fn workspace(&self) -> Option<&str> {
        self.workspace_id
            .as_deref()
            .or(self.directory_id.as_deref())
            .filter(|w| !w.is_empty())
    }
}

/// Why a handshake was refused. Each reason has its own close code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingParams,
    NoActiveSession,
    InvalidToken,
}

impl Rejection {
    pub fn code(self) -> u16 {
        match self {
            Rejection::MissingParams => 4001,
            Rejection::NoActiveSession => 4002,
            Rejection::InvalidToken => 4003,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Rejection::MissingParams => "missing token or workspaceId",
            Rejection::NoActiveSession => "no active session",
            Rejection::InvalidToken => "invalid token",
        }
    }
}

/// Check the handshake against the active tokens.
pub fn authenticate(tokens: &TokenStore, params: &HandshakeParams) -> Result<WorkspaceId, Rejection> {
    let token = params
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or(Rejection::MissingParams)?;
    let workspace = params.workspace().ok_or(Rejection::MissingParams)?;

    let active = tokens
        .active(workspace)
        .ok_or(Rejection::NoActiveSession)?;
    if active != token {
        return Err(Rejection::InvalidToken);
    }
    Ok(WorkspaceId::from(workspace))
}
