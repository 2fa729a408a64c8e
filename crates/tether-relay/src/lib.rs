//! Remote relay for Tether.
//!
//! Serves a token-authenticated WebSocket endpoint through which a client
//! on another device lists, observes and drives the sessions of one
//! workspace. Live output is fanned out over a broadcast channel; unmatched
//! HTTP requests get a placeholder page or are proxied to a live asset
//! server.

pub mod broadcast;
pub mod collaborators;
mod connection;
pub mod handshake;
pub mod net;
pub mod protocol;
mod proxy;
pub mod server;
pub mod sink;
pub mod tokens;
pub mod watch;

pub use broadcast::RelayBroadcaster;
pub use collaborators::{
    DesktopBridge, LogBridge, MemoryWorkspaceStore, PastePayload, SessionHost, StoredSession,
    WorkspaceStore,
};
pub use handshake::{authenticate, HandshakeParams, Rejection};
pub use net::local_ipv4_addresses;
pub use protocol::{ClientMessage, ServerMessage, SessionInfo, TerminalSize};
pub use server::{Relay, RelayBuilder, RelayInfo};
pub use sink::RelaySink;
pub use tokens::TokenStore;
pub use watch::PromptWatchSink;

#[cfg(test)]
mod tests;
