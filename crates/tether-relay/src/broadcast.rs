//! Broadcast channel fanning session events out to every connection.

use tokio::sync::broadcast;

use crate::protocol::ServerMessage;

/// Broadcast capacity. A connection that falls behind by more than this
/// many messages skips ahead (lagged) and is resent session history.
const BROADCAST_CAPACITY: usize = 256;

/// Provides a non-blocking `send()` for PTY reader threads and
/// `subscribe()` for new connection tasks.
pub struct RelayBroadcaster {
    tx: broadcast::Sender<ServerMessage>,
}

impl RelayBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    /// Push a message to all connected clients. No-op if none are connected.
    pub fn send(&self, msg: ServerMessage) {
        let _ = self.tx.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for RelayBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
