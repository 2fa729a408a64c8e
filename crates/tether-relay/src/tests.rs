use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tether_common::{SessionId, WorkspaceId};
use tether_config::RelayConfig;
use tether_pty::{ExecState, OutputSink, SessionSummary, SpawnRequest};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

use crate::collaborators::{
    DesktopBridge, MemoryWorkspaceStore, PastePayload, SessionHost, StoredSession,
};
use crate::server::{Relay, RelayInfo};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// FAKES
// =============================================================================

#[derive(Default)]
struct FakeHost {
    buffers: Mutex<HashMap<String, Vec<String>>>,
    live: Mutex<Vec<SessionSummary>>,
    writes: Mutex<Vec<(String, String)>>,
    resizes: Mutex<Vec<(String, u16, u16)>>,
    spawned: Mutex<Vec<SpawnRequest>>,
    fail_spawn: bool,
}

impl FakeHost {
    fn with_buffer(self, session_id: &str, chunks: &[&str]) -> Self {
        self.buffers.lock().unwrap().insert(
            session_id.to_string(),
            chunks.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    fn with_live(self, workspace_id: &str, session_id: &str) -> Self {
        self.live.lock().unwrap().push(summary(workspace_id, session_id));
        self
    }
}

fn summary(workspace_id: &str, session_id: &str) -> SessionSummary {
    SessionSummary {
        id: session_id.into(),
        workspace_id: workspace_id.into(),
        name: session_id.to_string(),
        state: ExecState::Idle,
        cols: 80,
        rows: 24,
    }
}

impl SessionHost for FakeHost {
    fn write(&self, session_id: &str, data: &str) {
        self.writes
            .lock()
            .unwrap()
            .push((session_id.to_string(), data.to_string()));
    }

    fn resize(&self, session_id: &str, cols: u16, rows: u16) {
        self.resizes
            .lock()
            .unwrap()
            .push((session_id.to_string(), cols, rows));
    }

    fn spawn(&self, request: SpawnRequest) -> bool {
        if self.fail_spawn {
            return false;
        }
        self.live.lock().unwrap().push(summary(
            request.workspace_id.as_str(),
            request.session_id.as_str(),
        ));
        self.spawned.lock().unwrap().push(request);
        true
    }

    fn buffer(&self, session_id: &str) -> Option<Vec<String>> {
        self.buffers.lock().unwrap().get(session_id).cloned()
    }

    fn dimensions(&self, _session_id: &str) -> Option<(u16, u16)> {
        None
    }

    fn list(&self, workspace_id: &str) -> Vec<SessionSummary> {
        self.live
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.workspace_id.as_str() == workspace_id)
            .cloned()
            .collect()
    }
}

#[derive(Default)]
struct RecordingBridge {
    pastes: Mutex<Vec<PastePayload>>,
    spawns: Mutex<Vec<(WorkspaceId, SessionId)>>,
}

impl DesktopBridge for RecordingBridge {
    fn on_paste(&self, paste: PastePayload) {
        self.pastes.lock().unwrap().push(paste);
    }

    fn on_remote_spawn(&self, workspace_id: &WorkspaceId, session_id: &SessionId) {
        self.spawns
            .lock()
            .unwrap()
            .push((workspace_id.clone(), session_id.clone()));
    }
}

// =============================================================================
// HARNESS
// =============================================================================

struct Harness {
    relay: Relay,
    info: RelayInfo,
    host: Arc<FakeHost>,
    store: Arc<MemoryWorkspaceStore>,
    bridge: Arc<RecordingBridge>,
}

fn local_config() -> RelayConfig {
    RelayConfig {
        bind_address: "127.0.0.1".into(),
        port: 0,
        ..Default::default()
    }
}

async fn start(host: FakeHost) -> Harness {
    start_with(host, local_config()).await
}

async fn start_with(host: FakeHost, config: RelayConfig) -> Harness {
    let host = Arc::new(host);
    let store = Arc::new(MemoryWorkspaceStore::new());
    let bridge = Arc::new(RecordingBridge::default());
    let relay = Relay::builder(config, host.clone())
        .store(store.clone())
        .bridge(bridge.clone())
        .build();
    let info = relay.start().await.unwrap();
    Harness {
        relay,
        info,
        host,
        store,
        bridge,
    }
}

impl Harness {
    fn url(&self, query: &str) -> String {
        format!("ws://127.0.0.1:{}/ws?{query}", self.info.port)
    }

    /// Connect with a valid token and consume the `connected` greeting.
    async fn connect(&self, workspace: &str) -> Client {
        let token = self.relay.generate_token(&WorkspaceId::from(workspace));
        let (mut ws, _) = connect_async(self.url(&format!("token={token}&workspaceId={workspace}")))
            .await
            .unwrap();
        let hello = recv_json(&mut ws).await;
        assert_eq!(hello, json!({"type": "connected", "workspaceId": workspace}));
        ws
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.relay.shutdown();
    }
}

async fn send_json(ws: &mut Client, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

async fn recv_json(ws: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .unwrap();
        match frame {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Close(frame) => panic!("unexpected close: {frame:?}"),
            _ => continue,
        }
    }
}

/// Wait for the close frame and return its code and reason.
async fn recv_close(ws: &mut Client) -> (u16, String) {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for close")
            .expect("stream ended")
            .unwrap();
        if let Message::Close(Some(frame)) = frame {
            return (u16::from(frame.code), frame.reason.as_str().to_string());
        }
    }
}

async fn wait_for(mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not met in time");
}

// =============================================================================
// HANDSHAKE
// =============================================================================

#[tokio::test]
async fn missing_params_close_4001() {
    let h = start(FakeHost::default()).await;
    let (mut ws, _) = connect_async(h.url("workspaceId=w")).await.unwrap();
    assert_eq!(
        recv_close(&mut ws).await,
        (4001, "missing token or workspaceId".to_string())
    );
}

#[tokio::test]
async fn unknown_workspace_close_4002() {
    let h = start(FakeHost::default()).await;
    let (mut ws, _) = connect_async(h.url("token=abc&workspaceId=w")).await.unwrap();
    assert_eq!(recv_close(&mut ws).await, (4002, "no active session".to_string()));
}

#[tokio::test]
async fn wrong_token_close_4003() {
    let h = start(FakeHost::default()).await;
    h.relay.generate_token(&WorkspaceId::from("w"));
    let (mut ws, _) = connect_async(h.url("token=wrong&workspaceId=w")).await.unwrap();
    assert_eq!(recv_close(&mut ws).await, (4003, "invalid token".to_string()));
}

#[tokio::test]
async fn legacy_directory_id_accepted() {
    let h = start(FakeHost::default()).await;
    let token = h.relay.generate_token(&WorkspaceId::from("w"));
    let (mut ws, _) = connect_async(h.url(&format!("token={token}&directoryId=w")))
        .await
        .unwrap();
    assert_eq!(recv_json(&mut ws).await["type"], "connected");
}

#[tokio::test]
async fn token_is_stable_until_invalidated() {
    let h = start(FakeHost::default()).await;
    let ws_id = WorkspaceId::from("w");
    let first = h.relay.generate_token(&ws_id);
    assert_eq!(h.relay.generate_token(&ws_id), first);

    assert!(h.relay.invalidate_token("w"));
    let (mut ws, _) = connect_async(h.url(&format!("token={first}&workspaceId=w")))
        .await
        .unwrap();
    assert_eq!(recv_close(&mut ws).await.0, 4002);

    let second = h.relay.generate_token(&ws_id);
    assert_ne!(second, first);
}

#[tokio::test]
async fn connection_count_tracks_clients() {
    let h = start(FakeHost::default()).await;
    let ws = h.connect("w").await;
    assert_eq!(h.relay.connection_count(), 1);
    drop(ws);
    let relay = h.relay.clone();
    wait_for(|| relay.connection_count() == 0).await;
}

// =============================================================================
// MESSAGES
// =============================================================================

#[tokio::test]
async fn sync_session_replays_history() {
    let h = start(FakeHost::default().with_buffer("s1", &["a", "b", "c"])).await;
    let mut ws = h.connect("w").await;

    send_json(&mut ws, json!({"type": "syncSession", "sessionId": "s1"})).await;
    assert_eq!(
        recv_json(&mut ws).await,
        json!({
            "type": "history",
            "sessionId": "s1",
            "chunks": ["a", "b", "c"],
            "dimensions": {"cols": 80, "rows": 24}
        })
    );
}

#[tokio::test]
async fn sync_unknown_session_is_empty() {
    let h = start(FakeHost::default()).await;
    let mut ws = h.connect("w").await;

    send_json(&mut ws, json!({"type": "syncSession", "sessionId": "gone"})).await;
    let reply = recv_json(&mut ws).await;
    assert_eq!(reply["type"], "history");
    assert_eq!(reply["chunks"], json!([]));
}

#[tokio::test]
async fn input_is_forwarded_to_host() {
    let h = start(FakeHost::default()).await;
    let mut ws = h.connect("w").await;

    send_json(&mut ws, json!({"type": "input", "sessionId": "s1", "data": "ls\r"})).await;
    let host = h.host.clone();
    wait_for(|| !host.writes.lock().unwrap().is_empty()).await;
    assert_eq!(
        h.host.writes.lock().unwrap()[0],
        ("s1".to_string(), "ls\r".to_string())
    );
}

#[tokio::test]
async fn output_reaches_every_connection() {
    let h = start(FakeHost::default()).await;
    let mut a = h.connect("w").await;
    let mut b = h.connect("w").await;

    h.relay.broadcast(&SessionId::from("s1"), "hello");
    let expected = json!({"type": "data", "sessionId": "s1", "data": "hello"});
    assert_eq!(recv_json(&mut a).await, expected);
    assert_eq!(recv_json(&mut b).await, expected);
}

#[tokio::test]
async fn sink_forwards_data_and_exit() {
    let h = start(FakeHost::default()).await;
    let mut ws = h.connect("w").await;
    let sink = h.relay.sink();
    let id = SessionId::from("s1");

    sink.on_data(&id, "out");
    sink.on_exit(&id, Some(2));
    assert_eq!(recv_json(&mut ws).await["data"], "out");
    assert_eq!(
        recv_json(&mut ws).await,
        json!({"type": "exit", "sessionId": "s1", "exitCode": 2})
    );
}

#[tokio::test]
async fn malformed_frames_are_ignored() {
    let h = start(FakeHost::default().with_buffer("s1", &["x"])).await;
    let mut ws = h.connect("w").await;

    ws.send(Message::Text("not json".into())).await.unwrap();
    send_json(&mut ws, json!({"type": "teleport"})).await;
    send_json(&mut ws, json!({"sessionId": "s1"})).await;

    // Still open and answering.
    send_json(&mut ws, json!({"type": "syncSession", "sessionId": "s1"})).await;
    assert_eq!(recv_json(&mut ws).await["chunks"], json!(["x"]));
}

#[tokio::test]
async fn resize_broadcasts_dimensions() {
    let h = start(FakeHost::default().with_buffer("s1", &[])).await;
    let mut a = h.connect("w").await;
    let mut b = h.connect("w").await;

    send_json(
        &mut a,
        json!({"type": "resize", "sessionId": "s1", "cols": 120, "rows": 40}),
    )
    .await;
    let expected = json!({"type": "dimensions", "sessionId": "s1", "cols": 120, "rows": 40});
    assert_eq!(recv_json(&mut a).await, expected);
    assert_eq!(recv_json(&mut b).await, expected);
    assert_eq!(
        h.host.resizes.lock().unwrap().as_slice(),
        &[("s1".to_string(), 120, 40)]
    );

    // Later history replays carry the new size.
    send_json(&mut b, json!({"type": "syncSession", "sessionId": "s1"})).await;
    assert_eq!(
        recv_json(&mut b).await["dimensions"],
        json!({"cols": 120, "rows": 40})
    );
}

#[tokio::test]
async fn get_sessions_merges_stored_and_live() {
    let h = start(FakeHost::default().with_live("w", "live").with_live("other", "x")).await;
    h.store.add_session(
        "w",
        StoredSession {
            id: "stored".into(),
            name: "build".into(),
        },
    );
    let mut ws = h.connect("w").await;

    send_json(&mut ws, json!({"type": "getSessions"})).await;
    let reply = recv_json(&mut ws).await;
    assert_eq!(reply["type"], "sessions");
    assert_eq!(reply["workspaceId"], "w");
    let sessions = reply["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0]["id"], "stored");
    assert_eq!(sessions[0]["alive"], false);
    assert_eq!(sessions[1]["id"], "live");
    assert_eq!(sessions[1]["alive"], true);
    assert_eq!(sessions[1]["state"], "idle");
}

#[tokio::test]
async fn get_settings_defaults_to_connection_workspace() {
    let h = start(FakeHost::default()).await;
    h.store.set_settings("w", json!({"fontSize": 13}));
    let mut ws = h.connect("w").await;

    send_json(&mut ws, json!({"type": "getSettings"})).await;
    assert_eq!(
        recv_json(&mut ws).await,
        json!({"type": "settings", "workspaceId": "w", "settings": {"fontSize": 13}})
    );
}

#[tokio::test]
async fn spawn_starts_session_in_workspace_root() {
    let h = start(FakeHost::default()).await;
    h.store.set_path("w", "/src/app");
    let mut ws = h.connect("w").await;

    send_json(
        &mut ws,
        json!({"type": "spawn", "name": "remote", "command": "make"}),
    )
    .await;
    let reply = recv_json(&mut ws).await;
    assert_eq!(reply["type"], "sessions");
    assert_eq!(reply["sessions"].as_array().unwrap().len(), 1);

    let spawned = h.host.spawned.lock().unwrap();
    assert_eq!(spawned.len(), 1);
    assert_eq!(spawned[0].cwd.as_deref(), Some("/src/app"));
    assert_eq!(spawned[0].display_name, "remote");
    assert_eq!(spawned[0].startup_command.as_deref(), Some("make"));
    assert_eq!(h.bridge.spawns.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn spawn_skipped_when_workspace_has_sessions() {
    let h = start(FakeHost::default().with_live("w", "desk")).await;
    let mut ws = h.connect("w").await;

    send_json(&mut ws, json!({"type": "spawn"})).await;
    let reply = recv_json(&mut ws).await;
    assert_eq!(reply["sessions"][0]["id"], "desk");
    assert!(h.host.spawned.lock().unwrap().is_empty());
    assert!(h.bridge.spawns.lock().unwrap().is_empty());
}

#[tokio::test]
async fn spawn_failure_reports_error() {
    let h = start(FakeHost {
        fail_spawn: true,
        ..Default::default()
    })
    .await;
    let mut ws = h.connect("w").await;

    send_json(&mut ws, json!({"type": "spawn", "sessionId": "s9"})).await;
    let reply = recv_json(&mut ws).await;
    assert_eq!(reply["type"], "error");
    assert!(reply["message"].as_str().unwrap().contains("s9"));
}

#[tokio::test]
async fn paste_goes_to_desktop_not_terminal() {
    let h = start(FakeHost::default()).await;
    let mut ws = h.connect("w").await;

    send_json(
        &mut ws,
        json!({"type": "paste", "sessionId": "s1", "mimeType": "image/png", "data": "iVBOR"}),
    )
    .await;
    let bridge = h.bridge.clone();
    wait_for(|| !bridge.pastes.lock().unwrap().is_empty()).await;

    let paste = h.bridge.pastes.lock().unwrap()[0].clone();
    assert_eq!(paste.workspace_id.as_str(), "w");
    assert_eq!(paste.mime_type.as_deref(), Some("image/png"));
    assert_eq!(paste.data, "iVBOR");
    assert!(h.host.writes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn spawn_for_another_workspace_is_refused() {
    let h = start(FakeHost::default()).await;
    h.store.set_path("other", "/elsewhere");
    let mut ws = h.connect("w").await;

    send_json(
        &mut ws,
        json!({"type": "spawn", "workspaceId": "other", "sessionId": "s9", "command": "id"}),
    )
    .await;
    let reply = recv_json(&mut ws).await;
    assert_eq!(reply["type"], "error");
    assert!(reply["message"].as_str().unwrap().contains("other"));
    assert!(h.host.spawned.lock().unwrap().is_empty());
    assert!(h.bridge.spawns.lock().unwrap().is_empty());
}

#[tokio::test]
async fn queries_are_scoped_to_connection_workspace() {
    let h = start(FakeHost::default().with_live("other", "x")).await;
    h.store.set_settings("other", json!({"secret": true}));
    h.store.set_settings("w", json!({"fontSize": 13}));
    let mut ws = h.connect("w").await;

    send_json(&mut ws, json!({"type": "getSessions", "workspaceId": "other"})).await;
    assert_eq!(recv_json(&mut ws).await["type"], "error");

    send_json(&mut ws, json!({"type": "getSettings", "workspaceId": "other"})).await;
    assert_eq!(recv_json(&mut ws).await["type"], "error");

    // Naming its own workspace is fine.
    send_json(&mut ws, json!({"type": "getSettings", "workspaceId": "w"})).await;
    assert_eq!(
        recv_json(&mut ws).await,
        json!({"type": "settings", "workspaceId": "w", "settings": {"fontSize": 13}})
    );
}

#[tokio::test]
async fn lagging_connection_is_resent_history() {
    let h = start(FakeHost::default().with_live("w", "s1").with_buffer("s1", &["a", "b"])).await;
    let mut ws = h.connect("w").await;

    // Nothing yields while flooding, so the connection overflows the broadcast.
    let id = SessionId::from("s1");
    for i in 0..1000 {
        h.relay.broadcast(&id, &i.to_string());
    }

    for _ in 0..1000 {
        let frame = recv_json(&mut ws).await;
        if frame["type"] == "history" {
            assert_eq!(frame["sessionId"], "s1");
            assert_eq!(frame["chunks"], json!(["a", "b"]));
            return;
        }
    }
    panic!("no history after falling behind");
}

// =============================================================================
// LIFECYCLE
// =============================================================================

#[tokio::test]
async fn start_is_idempotent() {
    let h = start(FakeHost::default()).await;
    let again = h.relay.start().await.unwrap();
    assert_eq!(again, h.info);
}

#[tokio::test]
async fn connection_url_carries_credentials() {
    let h = start(FakeHost::default()).await;
    let url = h
        .relay
        .connection_url(&h.info, "192.168.1.20".parse().unwrap(), &"w".into(), "tok")
        .unwrap();
    assert_eq!(
        url,
        format!(
            "ws://192.168.1.20:{0}/ws?token=tok&workspaceId=w&wsPort={0}",
            h.info.port
        )
    );
}

#[tokio::test]
async fn shutdown_closes_connections() {
    let h = start(FakeHost::default()).await;
    let mut ws = h.connect("w").await;
    h.relay.shutdown();

    let ended = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                _ => continue,
            }
        }
    })
    .await;
    assert!(ended.is_ok());
}

// =============================================================================
// HTTP
// =============================================================================

fn relay_for_http(config: RelayConfig) -> Relay {
    Relay::builder(config, Arc::new(FakeHost::default())).build()
}

#[tokio::test]
async fn placeholder_served_without_proxy() {
    let app = relay_for_http(local_config()).router();
    let response = app
        .oneshot(Request::get("/anything").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&body).contains("tether relay"));
}

#[tokio::test]
async fn cors_preflight_allowed() {
    let app = relay_for_http(local_config()).router();
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/ws")
                .header(header::ORIGIN, "http://phone.local")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn proxy_forwards_to_asset_server() {
    let upstream = axum::Router::new().fallback(|req: axum::extract::Request| async move {
        (
            [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "http://upstream")],
            format!("asset {}", req.uri()),
        )
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, upstream).await.unwrap();
    });

    let config = RelayConfig {
        asset_proxy: format!("http://127.0.0.1:{port}"),
        ..local_config()
    };
    let response = relay_for_http(config)
        .router()
        .oneshot(
            Request::get("/app/index.html?v=2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_ne!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|v| v.as_bytes()),
        Some(b"http://upstream".as_slice())
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body, "asset /app/index.html?v=2");
}

#[tokio::test]
async fn proxy_unreachable_is_bad_gateway() {
    let config = RelayConfig {
        asset_proxy: "http://127.0.0.1:1".into(),
        ..local_config()
    };
    let response = relay_for_http(config)
        .router()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
