//! Per-workspace access tokens. At most one active token per workspace,
//! held in memory for the life of the process.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tether_common::{new_token, WorkspaceId};

pub struct TokenStore {
    tokens: Mutex<HashMap<WorkspaceId, String>>,
    length: usize,
}

impl TokenStore {
    pub fn new(length: usize) -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
            length,
        }
    }

    fn tokens(&self) -> MutexGuard<'_, HashMap<WorkspaceId, String>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The workspace's active token, minted on first call.
    ///
    /// Repeated calls return the same token, so links already handed out
    /// stay valid.
    pub fn generate(&self, workspace_id: &WorkspaceId) -> String {
        self.tokens()
            .entry(workspace_id.clone())
            .or_insert_with(|| {
                tracing::info!(workspace = %workspace_id, "token generated");
                new_token(self.length)
            })
            .clone()
    }

    /// Drop the workspace's token. Returns whether one was active.
    ///
    /// Connections that already authenticated are not affected.
    pub fn invalidate(&self, workspace_id: &str) -> bool {
        let removed = self.tokens().remove(workspace_id).is_some();
        if removed {
            tracing::info!(workspace = workspace_id, "token invalidated");
        }
        removed
    }

    pub fn active(&self, workspace_id: &str) -> Option<String> {
        self.tokens().get(workspace_id).cloned()
    }
}
