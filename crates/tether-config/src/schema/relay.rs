use serde::{Deserialize, Serialize};

/// Configuration for the remote relay (HTTP + WebSocket server).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Interface to bind. `0.0.0.0` exposes the relay on the local network.
    pub bind_address: String,
    /// Listen port. `0` lets the OS pick one.
    pub port: u16,
    /// Path of the WebSocket endpoint.
    pub ws_path: String,
    /// Origin to reverse-proxy unmatched requests to. Empty disables live
    /// asset mode and serves a static placeholder instead.
    pub asset_proxy: String,
    /// Length of generated workspace tokens (valid range: 8-64).
    pub token_length: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            port: 0,
            ws_path: "/ws".into(),
            asset_proxy: String::new(),
            token_length: 16,
        }
    }
}

impl RelayConfig {
    /// The proxy origin when live asset mode is on.
    pub fn proxy_target(&self) -> Option<&str> {
        let target = self.asset_proxy.trim();
        (!target.is_empty()).then_some(target)
    }
}
