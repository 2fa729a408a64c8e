//! Seams to the rest of the application: the session backend, the
//! workspace metadata store and the desktop UI.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tether_common::{SessionId, WorkspaceId};
use tether_pty::{SessionManager, SessionSummary, SpawnRequest};

// =============================================================================
// SESSION HOST
// =============================================================================

/// The live sessions the relay drives.
pub trait SessionHost: Send + Sync + 'static {
    fn write(&self, session_id: &str, data: &str);
    fn resize(&self, session_id: &str, cols: u16, rows: u16);
    /// Start a session, or leave a live one as is. `false` on failure.
    fn spawn(&self, request: SpawnRequest) -> bool;
    fn buffer(&self, session_id: &str) -> Option<Vec<String>>;
    fn dimensions(&self, session_id: &str) -> Option<(u16, u16)>;
    fn list(&self, workspace_id: &str) -> Vec<SessionSummary>;
}

impl SessionHost for SessionManager {
    fn write(&self, session_id: &str, data: &str) {
        SessionManager::write(self, session_id, data);
    }

    fn resize(&self, session_id: &str, cols: u16, rows: u16) {
        SessionManager::resize(self, session_id, cols, rows);
    }

    fn spawn(&self, request: SpawnRequest) -> bool {
        SessionManager::spawn(self, request, None)
    }

    fn buffer(&self, session_id: &str) -> Option<Vec<String>> {
        SessionManager::buffer(self, session_id)
    }

    fn dimensions(&self, session_id: &str) -> Option<(u16, u16)> {
        SessionManager::dimensions(self, session_id)
    }

    fn list(&self, workspace_id: &str) -> Vec<SessionSummary> {
        SessionManager::list(self, Some(workspace_id))
    }
}

// =============================================================================
// WORKSPACE STORE
// =============================================================================

/// A session as recorded in workspace metadata, live or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub id: SessionId,
    pub name: String,
}

/// Read access to workspace metadata.
pub trait WorkspaceStore: Send + Sync + 'static {
    fn sessions(&self, workspace_id: &WorkspaceId) -> Vec<StoredSession>;
    fn settings(&self, workspace_id: &WorkspaceId) -> serde_json::Value;
    /// Root folder of the workspace, used as the cwd of remote spawns.
    fn workspace_path(&self, workspace_id: &WorkspaceId) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
struct WorkspaceRecord {
    path: Option<String>,
    sessions: Vec<StoredSession>,
    settings: serde_json::Value,
}

/// [`WorkspaceStore`] kept in memory.
#[derive(Debug, Default)]
pub struct MemoryWorkspaceStore {
    workspaces: RwLock<HashMap<WorkspaceId, WorkspaceRecord>>,
}

impl MemoryWorkspaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_path(&self, workspace_id: impl Into<WorkspaceId>, path: impl Into<String>) {
        self.update(workspace_id.into(), |w| w.path = Some(path.into()));
    }

    pub fn set_settings(&self, workspace_id: impl Into<WorkspaceId>, settings: serde_json::Value) {
        self.update(workspace_id.into(), |w| w.settings = settings);
    }

    /// Record a session, replacing any earlier entry with the same id.
    pub fn add_session(&self, workspace_id: impl Into<WorkspaceId>, session: StoredSession) {
        self.update(workspace_id.into(), |w| {
            w.sessions.retain(|s| s.id != session.id);
            w.sessions.push(session);
        });
    }

    fn update(&self, workspace_id: WorkspaceId, f: impl FnOnce(&mut WorkspaceRecord)) {
        let mut workspaces = self
            .workspaces
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(workspaces.entry(workspace_id).or_default());
    }

    fn read<T>(&self, workspace_id: &WorkspaceId, f: impl FnOnce(&WorkspaceRecord) -> T) -> Option<T> {
        self.workspaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(workspace_id)
            .map(f)
    }
}

impl WorkspaceStore for MemoryWorkspaceStore {
    fn sessions(&self, workspace_id: &WorkspaceId) -> Vec<StoredSession> {
        self.read(workspace_id, |w| w.sessions.clone())
            .unwrap_or_default()
    }

    fn settings(&self, workspace_id: &WorkspaceId) -> serde_json::Value {
        self.read(workspace_id, |w| w.settings.clone())
            .filter(|v| !v.is_null())
            .unwrap_or_else(|| serde_json::json!({}))
    }

    fn workspace_path(&self, workspace_id: &WorkspaceId) -> Option<String> {
        self.read(workspace_id, |w| w.path.clone()).flatten()
    }
}

// =============================================================================
// DESKTOP BRIDGE
// =============================================================================

/// An out-of-band payload a remote client pasted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PastePayload {
    pub workspace_id: WorkspaceId,
    pub session_id: Option<SessionId>,
    pub mime_type: Option<String>,
    pub data: String,
}

/// Events the relay pushes to the desktop UI layer.
pub trait DesktopBridge: Send + Sync + 'static {
    fn on_paste(&self, paste: PastePayload);
    /// A remote client started a session the desktop should show.
    fn on_remote_spawn(&self, workspace_id: &WorkspaceId, session_id: &SessionId);
}

/// [`DesktopBridge`] for headless use: logs and drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogBridge;

impl DesktopBridge for LogBridge {
    fn on_paste(&self, paste: PastePayload) {
        tracing::info!(
            workspace = %paste.workspace_id,
            mime = paste.mime_type.as_deref().unwrap_or("text/plain"),
            bytes = paste.data.len(),
            "paste received, no desktop attached"
        );
    }

    fn on_remote_spawn(&self, workspace_id: &WorkspaceId, session_id: &SessionId) {
        tracing::info!(workspace = %workspace_id, session = %session_id, "remote spawn");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_defaults() {
        let store = MemoryWorkspaceStore::new();
        let ws = WorkspaceId::from("w");
        assert!(store.sessions(&ws).is_empty());
        assert_eq!(store.settings(&ws), serde_json::json!({}));
        assert!(store.workspace_path(&ws).is_none());
    }

    #[test]
    fn memory_store_records() {
        let store = MemoryWorkspaceStore::new();
        store.set_path("w", "/src/app");
        store.set_settings("w", serde_json::json!({"fontSize": 14}));
        store.add_session(
            "w",
            StoredSession {
                id: "s1".into(),
                name: "old".into(),
            },
        );
        store.add_session(
            "w",
            StoredSession {
                id: "s1".into(),
                name: "main".into(),
            },
        );

        let ws = WorkspaceId::from("w");
        assert_eq!(store.workspace_path(&ws).as_deref(), Some("/src/app"));
        assert_eq!(store.settings(&ws)["fontSize"], 14);
        let sessions = store.sessions(&ws);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].name, "main");
    }
}
