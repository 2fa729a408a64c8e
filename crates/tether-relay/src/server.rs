//! The relay: HTTP listener, WebSocket endpoint and the state they share.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::routing::get;
use axum::Router;
use tether_common::{RelayError, SessionId, WorkspaceId};
use tether_config::RelayConfig;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::broadcast::RelayBroadcaster;
use crate::collaborators::{
    DesktopBridge, LogBridge, MemoryWorkspaceStore, SessionHost, WorkspaceStore,
};
use crate::connection::{ws_handler, ConnectionRegistry};
use crate::net::local_ipv4_addresses;
use crate::protocol::{ServerMessage, SessionInfo, TerminalSize};
use crate::proxy::{placeholder, proxy_assets};
use crate::sink::RelaySink;
use crate::tokens::TokenStore;

// =============================================================================
// SHARED STATE
// =============================================================================

/// State shared by every HTTP and WebSocket handler.
pub(crate) struct RelayState {
    pub(crate) config: RelayConfig,
    pub(crate) default_size: TerminalSize,
    pub(crate) host: Arc<dyn SessionHost>,
    pub(crate) store: Arc<dyn WorkspaceStore>,
    pub(crate) bridge: Arc<dyn DesktopBridge>,
    pub(crate) tokens: TokenStore,
    pub(crate) broadcaster: RelayBroadcaster,
    pub(crate) connections: ConnectionRegistry,
    pub(crate) http: reqwest::Client,
    pub(crate) shutdown: CancellationToken,
    dimensions: Mutex<HashMap<SessionId, TerminalSize>>,
}

impl RelayState {
    fn dims(&self) -> MutexGuard<'_, HashMap<SessionId, TerminalSize>> {
        self.dimensions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last known size: the last one broadcast, else the live PTY's, else
    /// the configured default.
    pub(crate) fn dimensions(&self, session_id: &SessionId) -> TerminalSize {
        if let Some(size) = self.dims().get(session_id) {
            return *size;
        }
        self.host
            .dimensions(session_id.as_str())
            .map(|(cols, rows)| TerminalSize { cols, rows })
            .unwrap_or(self.default_size)
    }

    pub(crate) fn forget_dimensions(&self, session_id: &SessionId) {
        self.dims().remove(session_id);
    }

    pub(crate) fn broadcast_dimensions(&self, session_id: &SessionId, cols: u16, rows: u16) {
        self.dims()
            .insert(session_id.clone(), TerminalSize { cols, rows });
        self.broadcaster.send(ServerMessage::Dimensions {
            session_id: session_id.clone(),
            cols,
            rows,
        });
    }

    /// Sessions recorded for the workspace, merged with the live ones.
    pub(crate) fn session_list(&self, workspace_id: &WorkspaceId) -> Vec<SessionInfo> {
        let live = self.host.list(workspace_id.as_str());

        let mut sessions: Vec<SessionInfo> = self
            .store
            .sessions(workspace_id)
            .into_iter()
            .map(|stored| {
                let running = live.iter().find(|l| l.id == stored.id);
                SessionInfo {
                    id: stored.id,
                    name: stored.name,
                    workspace_id: workspace_id.clone(),
                    alive: running.is_some(),
                    state: running.map(|l| l.state),
                }
            })
            .collect();

        for running in live {
            if sessions.iter().any(|s| s.id == running.id) {
                continue;
            }
            sessions.push(SessionInfo {
                id: running.id,
                name: running.name,
                workspace_id: running.workspace_id,
                alive: true,
                state: Some(running.state),
            });
        }
        sessions
    }
}

// =============================================================================
// RELAY
// =============================================================================

/// Where the relay is listening, as reported by [`Relay::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayInfo {
    pub port: u16,
    pub local_addresses: Vec<Ipv4Addr>,
    /// Origin unmatched requests are proxied to, in live asset mode.
    pub proxy_target: Option<String>,
}

/// Token-authenticated WebSocket relay in front of a [`SessionHost`].
///
/// Cheap to clone; clones share state and the running listener.
#[derive(Clone)]
pub struct Relay {
    state: Arc<RelayState>,
    started: Arc<tokio::sync::Mutex<Option<RelayInfo>>>,
}

impl Relay {
    pub fn builder(config: RelayConfig, host: Arc<dyn SessionHost>) -> RelayBuilder {
        RelayBuilder {
            config,
            host,
            store: None,
            bridge: None,
            default_size: TerminalSize { cols: 80, rows: 24 },
        }
    }

    /// Bind the listener and start serving. Idempotent: later calls return
    /// the info of the running listener.
    pub async fn start(&self) -> Result<RelayInfo, RelayError> {
        let mut started = self.started.lock().await;
        if let Some(info) = started.as_ref() {
            return Ok(info.clone());
        }

        let config = &self.state.config;
        let addr = format!("{}:{}", config.bind_address, config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| RelayError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let port = listener.local_addr()?.port();

        let app = self.router();
        let shutdown = self.state.shutdown.clone();
        tokio::spawn(async move {
            let service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, service)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
            {
                error!("relay server error: {e}");
            }
        });

        let info = RelayInfo {
            port,
            local_addresses: local_ipv4_addresses(),
            proxy_target: config.proxy_target().map(String::from),
        };
        info!(
            addr = %addr,
            port,
            ws_path = %config.ws_path,
            proxy = info.proxy_target.as_deref().unwrap_or("-"),
            "relay listening"
        );
        *started = Some(info.clone());
        Ok(info)
    }

    /// The HTTP app: WebSocket endpoint, asset fallback and CORS.
    pub fn router(&self) -> Router {
        let path = &self.state.config.ws_path;
        let ws_path = if path.starts_with('/') {
            path.clone()
        } else {
            format!("/{path}")
        };
        let app = Router::new().route(&ws_path, get(ws_handler));
        let app = if self.state.config.proxy_target().is_some() {
            app.fallback(proxy_assets)
        } else {
            app.fallback(placeholder)
        };
        app.layer(CorsLayer::permissive())
            .with_state(Arc::clone(&self.state))
    }

    /// Stop the listener and close every connection.
    pub fn shutdown(&self) {
        self.state.shutdown.cancel();
    }

    // =========================================================================
    // TOKENS
    // =========================================================================

    /// The workspace's active token, minted on first call.
    pub fn generate_token(&self, workspace_id: &WorkspaceId) -> String {
        self.state.tokens.generate(workspace_id)
    }

    /// Revoke the workspace's token. New handshakes fail until another is
    /// generated; open connections stay up.
    pub fn invalidate_token(&self, workspace_id: &str) -> bool {
        self.state.tokens.invalidate(workspace_id)
    }

    // =========================================================================
    // FAN-OUT
    // =========================================================================

    /// Push live output to every connection.
    pub fn broadcast(&self, session_id: &SessionId, data: &str) {
        self.state.broadcaster.send(ServerMessage::Data {
            session_id: session_id.clone(),
            data: data.to_string(),
        });
    }

    /// Remember a session's size and push it to every connection.
    pub fn broadcast_dimensions(&self, session_id: &SessionId, cols: u16, rows: u16) {
        self.state.broadcast_dimensions(session_id, cols, rows);
    }

    /// An [`tether_pty::OutputSink`] that feeds this relay.
    pub fn sink(&self) -> RelaySink {
        RelaySink::new(Arc::clone(&self.state))
    }

    pub fn connection_count(&self) -> usize {
        self.state.connections.len()
    }

    /// WebSocket URL a remote client on the network can open.
    pub fn connection_url(
        &self,
        info: &RelayInfo,
        host: IpAddr,
        workspace_id: &WorkspaceId,
        token: &str,
    ) -> Result<String, RelayError> {
        let base = format!("ws://{}{}", SocketAddr::new(host, info.port), self.state.config.ws_path);
        let port = info.port.to_string();
        let url = reqwest::Url::parse_with_params(
            &base,
            [
                ("token", token),
                ("workspaceId", workspace_id.as_str()),
                ("wsPort", port.as_str()),
            ],
        )
        .map_err(|e| RelayError::InvalidUrl(e.to_string()))?;
        Ok(url.into())
    }
}

// =============================================================================
// BUILDER
// =============================================================================

pub struct RelayBuilder {
    config: RelayConfig,
    host: Arc<dyn SessionHost>,
    store: Option<Arc<dyn WorkspaceStore>>,
    bridge: Option<Arc<dyn DesktopBridge>>,
    default_size: TerminalSize,
}

impl RelayBuilder {
    /// Defaults to an empty [`MemoryWorkspaceStore`].
    pub fn store(mut self, store: Arc<dyn WorkspaceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Defaults to [`LogBridge`].
    pub fn bridge(mut self, bridge: Arc<dyn DesktopBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// Size reported for sessions whose dimensions are unknown.
    pub fn default_size(mut self, cols: u16, rows: u16) -> Self {
        self.default_size = TerminalSize { cols, rows };
        self
    }

    pub fn build(self) -> Relay {
        let token_length = self.config.token_length;
        let state = RelayState {
            config: self.config,
            default_size: self.default_size,
            host: self.host,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryWorkspaceStore::new())),
            bridge: self.bridge.unwrap_or_else(|| Arc::new(LogBridge)),
            tokens: TokenStore::new(token_length),
            broadcaster: RelayBroadcaster::new(),
            connections: ConnectionRegistry::default(),
            http: reqwest::Client::new(),
            shutdown: CancellationToken::new(),
            dimensions: Mutex::new(HashMap::new()),
        };
        Relay {
            state: Arc::new(state),
            started: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }
}
