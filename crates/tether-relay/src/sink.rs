//! Adapter feeding PTY output into the relay.

use std::sync::Arc;

use tether_common::SessionId;
use tether_pty::OutputSink;

use crate::protocol::ServerMessage;
use crate::server::RelayState;

/// [`OutputSink`] that pushes session output and exits to every remote
/// client. Obtained from [`crate::Relay::sink`].
pub struct RelaySink {
    state: Arc<RelayState>,
}

impl RelaySink {
    pub(crate) fn new(state: Arc<RelayState>) -> Self {
        Self { state }
    }
}

impl OutputSink for RelaySink {
    fn on_data(&self, session_id: &SessionId, data: &str) {
        self.state.broadcaster.send(ServerMessage::Data {
            session_id: session_id.clone(),
            data: data.to_string(),
        });
    }

    fn on_exit(&self, session_id: &SessionId, exit_code: Option<u32>) {
        self.state.forget_dimensions(session_id);
        self.state.broadcaster.send(ServerMessage::Exit {
            session_id: session_id.clone(),
            exit_code,
        });
    }
}
