//! The session registry: spawns shells, tracks their state and history,
//! and fans their output out to registered sinks.

mod reader;
mod session;
mod writer;


use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use tether_common::{PtyError, SessionId};
use tether_config::{PtyConfig, ShellConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::shell_prompt::looks_like_shell_prompt;
use crate::types::{ExecState, OutputSink, SessionSummary, SpawnRequest};
use session::{open_session, Opened, Session, SessionParams};

// =============================================================================
// SESSION MANAGER
// =============================================================================

/// Owns every live shell session.
///
/// Cheap to clone; clones share the same registry. `write`, `resize` and
/// `kill` on an unknown session id are silent no-ops, since a UI closing a
/// tab mid-keystroke is expected.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    sessions: Mutex<HashMap<SessionId, Session>>,
    sinks: RwLock<Vec<Arc<dyn OutputSink>>>,
    shell: ShellConfig,
    pty: PtyConfig,
    next_generation: AtomicU64,
}

impl SessionManager {
    pub fn new(shell: ShellConfig, pty: PtyConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions: Mutex::new(HashMap::new()),
                sinks: RwLock::new(Vec::new()),
                shell,
                pty,
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Register a consumer of every session's output and exit events.
    pub fn add_sink(&self, sink: Arc<dyn OutputSink>) {
        self.inner
            .sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Start a shell for `request.session_id`, or attach to the one already
    /// running under that id.
    ///
    /// When the session is alive its buffered output is replayed to
    /// `replay` and no new process is created. Returns `false` only when a
    /// new shell could not be launched; the failure is logged.
    ///
    /// A startup command is written by a task on the current tokio runtime
    /// after the configured settle delay.
    pub fn spawn(&self, request: SpawnRequest, replay: Option<&dyn OutputSink>) -> bool {
        let history = self
            .inner
            .sessions()
            .get(&request.session_id)
            .map(|s| s.buffer.snapshot());

        if let Some(chunks) = history {
            debug!(
                session = %request.session_id,
                chunks = chunks.len(),
                "session already running, replaying buffer"
            );
            if let Some(sink) = replay {
                for chunk in &chunks {
                    sink.on_data(&request.session_id, chunk);
                }
            }
            return true;
        }

        match self.start_session(&request) {
            Ok(()) => true,
            Err(e) => {
                warn!(session = %request.session_id, error = %e, "failed to spawn session");
                false
            }
        }
    }

    fn start_session(&self, request: &SpawnRequest) -> Result<(), PtyError> {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let Opened { session, reader } = open_session(
            &self.inner.shell,
            SessionParams {
                generation,
                workspace_id: request.workspace_id.clone(),
                display_name: request.display_name.clone(),
                cwd: request.cwd.as_deref(),
                cols: request.cols.unwrap_or(self.inner.pty.default_cols),
                rows: request.rows.unwrap_or(self.inner.pty.default_rows),
                buffer_capacity: self.inner.pty.buffer_capacity,
            },
        )?;
        let lifetime = session.lifetime.clone();
        let id = request.session_id.clone();

        let raced = match self.inner.sessions().entry(id.clone()) {
            Entry::Occupied(_) => Some(session),
            Entry::Vacant(slot) => {
                slot.insert(session);
                None
            }
        };
        if let Some(mut duplicate) = raced {
            // A concurrent spawn of the same id got there first.
            duplicate.terminate();
            return Ok(());
        }

        if let Err(e) = reader::spawn_reader(Arc::clone(&self.inner), id.clone(), generation, reader) {
            if let Some(mut session) = self.inner.remove_generation(id.as_str(), generation) {
                session.terminate();
            }
            return Err(PtyError::Io(e));
        }

        info!(
            session = %id,
            workspace = %request.workspace_id,
            generation,
            "session spawned"
        );

        if let Some(command) = request
            .startup_command
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
        {
            self.schedule_startup_command(id, generation, command.to_string(), lifetime);
        }
        Ok(())
    }

    fn schedule_startup_command(
        &self,
        id: SessionId,
        generation: u64,
        command: String,
        lifetime: CancellationToken,
    ) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(session = %id, "no async runtime, startup command skipped");
            return;
        };
        let delay = Duration::from_millis(self.inner.pty.startup_delay_ms);
        let inner = Arc::clone(&self.inner);

        runtime.spawn(async move {
            tokio::select! {
                _ = lifetime.cancelled() => {
                    debug!(session = %id, "startup command cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    debug!(session = %id, "writing startup command");
                    inner.write(id.as_str(), Some(generation), &format!("{command}\r"));
                }
            }
        });
    }

    /// Terminate a session and drop its history. Sinks get `on_exit` once.
    ///
    /// Returns whether a live session was found.
    pub fn kill(&self, session_id: &str) -> bool {
        let removed = self.inner.sessions().remove_entry(session_id);
        let Some((id, mut session)) = removed else {
            return false;
        };
        let exit_code = session.terminate();
        info!(session = %id, ?exit_code, "session killed");
        self.inner.notify_exit(&id, exit_code);
        true
    }

    /// Kill every session. Used during graceful shutdown.
    pub fn kill_all(&self) {
        let drained: Vec<(SessionId, Session)> = self.inner.sessions().drain().collect();
        let count = drained.len();
        for (id, mut session) in drained {
            let exit_code = session.terminate();
            self.inner.notify_exit(&id, exit_code);
        }
        info!(count, "all sessions killed");
    }

    // =========================================================================
    // INPUT
    // =========================================================================

    /// Forward input verbatim. A line terminator marks the session as
    /// executing.
    pub fn write(&self, session_id: &str, data: &str) {
        self.inner.write(session_id, None, data);
    }

    pub fn resize(&self, session_id: &str, cols: u16, rows: u16) {
        let mut sessions = self.inner.sessions();
        let Some(session) = sessions.get_mut(session_id) else {
            debug!(session = session_id, "resize for unknown session ignored");
            return;
        };
        if let Err(e) = session.resize(cols, rows) {
            warn!(session = session_id, error = %e, "PTY resize failed");
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Buffered output chunks, oldest first.
    pub fn buffer(&self, session_id: &str) -> Option<Vec<String>> {
        self.inner
            .sessions()
            .get(session_id)
            .map(|s| s.buffer.snapshot())
    }

    pub fn exec_state(&self, session_id: &str) -> Option<ExecState> {
        self.inner.sessions().get(session_id).map(|s| s.state)
    }

    pub fn dimensions(&self, session_id: &str) -> Option<(u16, u16)> {
        self.inner
            .sessions()
            .get(session_id)
            .map(|s| (s.size.cols, s.size.rows))
    }

    pub fn is_alive(&self, session_id: &str) -> bool {
        self.inner.sessions().contains_key(session_id)
    }

    /// Live sessions, optionally restricted to one workspace, sorted by id.
    pub fn list(&self, workspace_id: Option<&str>) -> Vec<SessionSummary> {
        let sessions = self.inner.sessions();
        let mut out: Vec<SessionSummary> = sessions
            .iter()
            .filter(|(_, s)| workspace_id.map_or(true, |w| s.workspace_id.as_str() == w))
            .map(|(id, s)| SessionSummary {
                id: id.clone(),
                workspace_id: s.workspace_id.clone(),
                name: s.display_name.clone(),
                state: s.state,
                cols: s.size.cols,
                rows: s.size.rows,
            })
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    pub fn len(&self) -> usize {
        self.inner.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions().is_empty()
    }
}

// =============================================================================
// SHARED STATE
// =============================================================================

impl Inner {
    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sinks(&self) -> Vec<Arc<dyn OutputSink>> {
        self.sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove the session only if it is still the given instance.
    fn remove_generation(&self, id: &str, generation: u64) -> Option<Session> {
        let mut sessions = self.sessions();
        match sessions.get(id) {
            Some(s) if s.generation == generation => sessions.remove(id),
            _ => None,
        }
    }

    /// Write to a session, optionally only if it is still `generation`.
    fn write(&self, id: &str, generation: Option<u64>, data: &str) {
        let mut sessions = self.sessions();
        let Some(session) = sessions
            .get_mut(id)
            .filter(|s| generation.map_or(true, |g| s.generation == g))
        else {
            debug!(session = id, "write for unknown session ignored");
            return;
        };

        if let Err(e) = session.write_input(data.as_bytes()) {
            warn!(session = id, error = %e, "PTY write failed");
            return;
        }
        if data.contains(['\r', '\n']) && session.state == ExecState::Idle {
            session.state = ExecState::Executing;
            trace!(session = id, "session executing");
        }
    }

    /// Record a decoded output chunk and forward it to every sink.
    fn handle_output(&self, id: &SessionId, generation: u64, text: String) {
        {
            let mut sessions = self.sessions();
            let Some(session) = sessions
                .get_mut(id)
                .filter(|s| s.generation == generation)
            else {
                return;
            };
            session.buffer.push(text.clone());
            if session.state == ExecState::Executing && looks_like_shell_prompt(&text) {
                session.state = ExecState::Idle;
                trace!(session = %id, "session idle");
            }
        }

        trace!(session = %id, bytes = text.len(), "pty output");
        for sink in self.sinks() {
            sink.on_data(id, &text);
        }
    }

    /// The reader hit EOF. Reaps the process unless it was already killed
    /// or replaced.
    fn handle_exit(&self, id: &SessionId, generation: u64) {
        let Some(mut session) = self.remove_generation(id.as_str(), generation) else {
            debug!(session = %id, generation, "exit of killed or replaced session ignored");
            return;
        };
        session.lifetime.cancel();
        let exit_code = session.wait_exit_code();
        info!(session = %id, ?exit_code, "session exited");
        self.notify_exit(id, exit_code);
    }

    fn notify_exit(&self, id: &SessionId, exit_code: Option<u32>) {
        for sink in self.sinks() {
            sink.on_exit(id, exit_code);
        }
    }
}
