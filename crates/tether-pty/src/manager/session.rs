//! A single live session: the PTY pair, its child process and its history.

use std::sync::mpsc::Sender;

use portable_pty::{native_pty_system, Child, MasterPty, PtySize};
use tether_common::{PtyError, WorkspaceId};
use tether_config::ShellConfig;
use tokio_util::sync::CancellationToken;

use crate::buffer::OutputBuffer;
use crate::shell::{build_shell_command, resolve_shell};
use crate::types::ExecState;

use super::writer::spawn_writer;

/// One shell process bound to a workspace.
pub(super) struct Session {
    /// Distinguishes this instance from earlier ones that used the same id.
    pub(super) generation: u64,
    pub(super) workspace_id: WorkspaceId,
    pub(super) display_name: String,
    /// Input queue drained by the session's writer thread.
    pub(super) input: Sender<Vec<u8>>,
    pub(super) master: Box<dyn MasterPty + Send>,
    pub(super) child: Box<dyn Child + Send + Sync>,
    pub(super) size: PtySize,
    pub(super) state: ExecState,
    pub(super) buffer: OutputBuffer,
    /// Cancelled when the session goes away; stops a pending startup command.
    pub(super) lifetime: CancellationToken,
}

/// Everything the reader thread needs, handed out by [`open_session`].
pub(super) struct Opened {
    pub(super) session: Session,
    pub(super) reader: Box<dyn std::io::Read + Send>,
}

pub(super) struct SessionParams<'a> {
    pub(super) generation: u64,
    pub(super) workspace_id: WorkspaceId,
    pub(super) display_name: String,
    pub(super) cwd: Option<&'a str>,
    pub(super) cols: u16,
    pub(super) rows: u16,
    pub(super) buffer_capacity: usize,
}

/// Open a PTY and launch the shell in it.
pub(super) fn open_session(shell: &ShellConfig, params: SessionParams<'_>) -> Result<Opened, PtyError> {
    let size = PtySize {
        rows: params.rows,
        cols: params.cols,
        pixel_width: 0,
        pixel_height: 0,
    };

    let pair = native_pty_system()
        .openpty(size)
        .map_err(|e| PtyError::SpawnFailed(format!("failed to open PTY: {e}")))?;

    let cmd = build_shell_command(shell, params.cwd);
    let child = pair.slave.spawn_command(cmd).map_err(|e| {
        PtyError::SpawnFailed(format!("failed to spawn shell '{}': {e}", resolve_shell(shell)))
    })?;

    // Only the master side is kept.
    drop(pair.slave);

    let writer = pair
        .master
        .take_writer()
        .map_err(|e| PtyError::SpawnFailed(format!("failed to take PTY writer: {e}")))?;
    let reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| PtyError::SpawnFailed(format!("failed to clone PTY reader: {e}")))?;
    let input = spawn_writer(writer).map_err(PtyError::Io)?;

    Ok(Opened {
        session: Session {
            generation: params.generation,
            workspace_id: params.workspace_id,
            display_name: params.display_name,
            input,
            master: pair.master,
            child,
            size,
            state: ExecState::Idle,
            buffer: OutputBuffer::new(params.buffer_capacity),
            lifetime: CancellationToken::new(),
        },
        reader,
    })
}

impl Session {
    /// Queue input for the writer thread. Never blocks on the PTY.
    pub(super) fn write_input(&self, data: &[u8]) -> Result<(), PtyError> {
        self.input
            .send(data.to_vec())
            .map_err(|_| PtyError::WriteFailed("PTY writer has stopped".into()))
    }

    pub(super) fn resize(&mut self, cols: u16, rows: u16) -> Result<(), PtyError> {
        let new_size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };
        self.master
            .resize(new_size)
            .map_err(|e| PtyError::ResizeFailed(e.to_string()))?;
        self.size = new_size;
        Ok(())
    }

    /// Kill the child and reap it. Returns the exit code if it was waited on.
    pub(super) fn terminate(&mut self) -> Option<u32> {
        self.lifetime.cancel();
        if let Err(e) = self.child.kill() {
            tracing::debug!("PTY kill error (may already be dead): {e}");
        }
        self.wait_exit_code()
    }

    pub(super) fn wait_exit_code(&mut self) -> Option<u32> {
        match self.child.wait() {
            Ok(status) => Some(status.exit_code()),
            Err(e) => {
                tracing::debug!("PTY wait error: {e}");
                None
            }
        }
    }
}
