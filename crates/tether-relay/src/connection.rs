//! Per-connection handler: authenticate, register, then serve messages.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Query, State};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tether_common::{new_id, SessionId, WorkspaceId};
use tether_pty::SpawnRequest;
use tokio::sync::broadcast::error::RecvError;

use crate::collaborators::PastePayload;
use crate::handshake::{authenticate, HandshakeParams, Rejection};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::server::RelayState;

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Debug, Clone)]
pub(crate) struct ConnectionInfo {
    pub(crate) workspace_id: WorkspaceId,
    pub(crate) peer: Option<SocketAddr>,
    pub(crate) connected_at: Instant,
}

/// Authenticated connections currently open.
#[derive(Debug, Default)]
pub(crate) struct ConnectionRegistry {
    connections: Mutex<HashMap<String, ConnectionInfo>>,
}

impl ConnectionRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, ConnectionInfo>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(&self, workspace_id: WorkspaceId, peer: Option<SocketAddr>) -> String {
        let id = new_id();
        self.lock().insert(
            id.clone(),
            ConnectionInfo {
                workspace_id,
                peer,
                connected_at: Instant::now(),
            },
        );
        id
    }

    pub(crate) fn deregister(&self, id: &str) -> Option<ConnectionInfo> {
        self.lock().remove(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

/// `GET <ws_path>?token=..&workspaceId=..` upgrade handler.
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HandshakeParams>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    State(state): State<Arc<RelayState>>,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    ws.on_upgrade(move |socket| handle_socket(socket, params, peer, state))
}

async fn handle_socket(
    socket: WebSocket,
    params: HandshakeParams,
    peer: Option<SocketAddr>,
    state: Arc<RelayState>,
) {
    let workspace_id = match authenticate(&state.tokens, &params) {
        Ok(workspace_id) => workspace_id,
        Err(rejection) => {
            reject(socket, rejection, peer).await;
            return;
        }
    };

    let conn_id = state.connections.register(workspace_id.clone(), peer);
    let mut events = state.broadcaster.subscribe();
    tracing::info!(
        conn = %conn_id,
        peer = ?peer,
        workspace = %workspace_id,
        "remote client connected"
    );

    let (mut ws_tx, mut ws_rx) = socket.split();
    let connected = ServerMessage::Connected {
        workspace_id: workspace_id.clone(),
    };

    if send(&mut ws_tx, &connected).await.is_ok() {
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Ok(msg) => {
                            if send(&mut ws_tx, &msg).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(conn = %conn_id, skipped, "remote client lagging, resyncing history");
                            if send_all(&mut ws_tx, &resync(&state, &workspace_id)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                    }
                }

                frame = ws_rx.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            let Some(reply) = handle_frame(&state, &workspace_id, &conn_id, &text) else {
                                continue;
                            };
                            if send(&mut ws_tx, &reply).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = ws_tx.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => {
                            tracing::debug!(conn = %conn_id, error = %e, "websocket error");
                            break;
                        }
                        Some(Ok(_)) => {}
                    }
                }

                _ = state.shutdown.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    }

    if let Some(info) = state.connections.deregister(&conn_id) {
        tracing::info!(
            conn = %conn_id,
            peer = ?info.peer,
            workspace = %info.workspace_id,
            secs = info.connected_at.elapsed().as_secs(),
            "remote client disconnected"
        );
    }
}

async fn reject(mut socket: WebSocket, rejection: Rejection, peer: Option<SocketAddr>) {
    tracing::warn!(
        peer = ?peer,
        code = rejection.code(),
        reason = rejection.reason(),
        "handshake rejected"
    );
    let frame = CloseFrame {
        code: rejection.code(),
        reason: rejection.reason().into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

async fn send(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    ws_tx.send(Message::Text(msg.to_json())).await
}

async fn send_all(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    msgs: &[ServerMessage],
) -> Result<(), axum::Error> {
    for msg in msgs {
        send(ws_tx, msg).await?;
    }
    Ok(())
}

// =============================================================================
// DISPATCH
// =============================================================================

fn handle_frame(
    state: &RelayState,
    workspace_id: &WorkspaceId,
    conn_id: &str,
    text: &str,
) -> Option<ServerMessage> {
    match ClientMessage::decode(text) {
        Ok(msg) => dispatch(state, workspace_id, msg),
        Err(e) => {
            tracing::warn!(conn = %conn_id, error = %e, "ignoring malformed frame");
            None
        }
    }
}

/// Apply one client message. Returns the direct reply, if any.
pub(crate) fn dispatch(
    state: &RelayState,
    workspace_id: &WorkspaceId,
    msg: ClientMessage,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Input { session_id, data } => {
            tracing::trace!(session = %session_id, bytes = data.len(), "remote input");
            state.host.write(session_id.as_str(), &data);
            None
        }

        ClientMessage::GetSessions { workspace_id: ws } => {
            let ws = match scoped(workspace_id, ws) {
                Ok(ws) => ws,
                Err(reply) => return Some(reply),
            };
            Some(ServerMessage::Sessions {
                sessions: state.session_list(&ws),
                workspace_id: ws,
            })
        }

        ClientMessage::Spawn {
            workspace_id: ws,
            session_id,
            name,
            cwd,
            command,
        } => {
            let ws = match scoped(workspace_id, ws) {
                Ok(ws) => ws,
                Err(reply) => return Some(reply),
            };
            remote_spawn(state, ws, session_id, name, cwd, command)
        }

        ClientMessage::Resize {
            session_id,
            cols,
            rows,
        } => {
            state.host.resize(session_id.as_str(), cols, rows);
            state.broadcast_dimensions(&session_id, cols, rows);
            None
        }

        ClientMessage::SyncSession { session_id } => Some(history(state, session_id)),

        ClientMessage::GetSettings { workspace_id: ws } => {
            let ws = match scoped(workspace_id, ws) {
                Ok(ws) => ws,
                Err(reply) => return Some(reply),
            };
            Some(ServerMessage::Settings {
                settings: state.store.settings(&ws),
                workspace_id: ws,
            })
        }

        ClientMessage::Paste {
            session_id,
            mime_type,
            data,
        } => {
            state.bridge.on_paste(PastePayload {
                workspace_id: workspace_id.clone(),
                session_id,
                mime_type,
                data,
            });
            None
        }
    }
}

fn history(state: &RelayState, session_id: SessionId) -> ServerMessage {
    let chunks = state.host.buffer(session_id.as_str()).unwrap_or_default();
    let dimensions = state.dimensions(&session_id);
    ServerMessage::History {
        session_id,
        chunks,
        dimensions,
    }
}

/// Full history of every live session in the workspace, sent after a
/// connection fell behind the broadcast and lost output.
fn resync(state: &RelayState, workspace_id: &WorkspaceId) -> Vec<ServerMessage> {
    state
        .host
        .list(workspace_id.as_str())
        .into_iter()
        .map(|summary| history(state, summary.id))
        .collect()
}

/// Resolve the workspace a message targets. A connection only ever acts on
/// the workspace its token was issued for.
fn scoped(
    authenticated: &WorkspaceId,
    requested: Option<WorkspaceId>,
) -> Result<WorkspaceId, ServerMessage> {
    match requested {
        Some(ws) if ws != *authenticated => {
            tracing::warn!(
                workspace = %authenticated,
                requested = %ws,
                "message for another workspace refused"
            );
            Err(ServerMessage::Error {
                message: format!("workspace {ws} is not authorized on this connection"),
            })
        }
        _ => Ok(authenticated.clone()),
    }
}

fn remote_spawn(
    state: &RelayState,
    workspace_id: WorkspaceId,
    session_id: Option<SessionId>,
    name: Option<String>,
    cwd: Option<String>,
    command: Option<String>,
) -> Option<ServerMessage> {
    // Only when the desktop has nothing running for the workspace, unless
    // the client names the session it wants.
    if session_id.is_none() && !state.host.list(workspace_id.as_str()).is_empty() {
        tracing::debug!(workspace = %workspace_id, "spawn skipped, workspace has live sessions");
        return Some(ServerMessage::Sessions {
            sessions: state.session_list(&workspace_id),
            workspace_id,
        });
    }

    let session_id = session_id.unwrap_or_else(SessionId::generate);
    let cwd = cwd.or_else(|| state.store.workspace_path(&workspace_id));
    let mut request = SpawnRequest::new(session_id.clone(), workspace_id.clone())
        .size(state.default_size.cols, state.default_size.rows);
    if let Some(cwd) = cwd {
        request = request.cwd(cwd);
    }
    if let Some(name) = name {
        request = request.display_name(name);
    }
    if let Some(command) = command {
        request = request.startup_command(command);
    }

    if !state.host.spawn(request) {
        return Some(ServerMessage::Error {
            message: format!("failed to spawn session {session_id}"),
        });
    }

    tracing::info!(workspace = %workspace_id, session = %session_id, "remote spawn");
    state.bridge.on_remote_spawn(&workspace_id, &session_id);
    Some(ServerMessage::Sessions {
        sessions: state.session_list(&workspace_id),
        workspace_id,
    })
}
