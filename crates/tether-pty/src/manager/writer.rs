//! Per-session writer thread: queued input out to the PTY.

use std::io::{self, Write};
use std::sync::mpsc::{self, Sender};
use std::thread;

/// Start the blocking writer for one session instance.
///
/// The thread owns the PTY writer and exits once every [`Sender`] is
/// dropped or a write fails.
pub(super) fn spawn_writer(mut writer: Box<dyn Write + Send>) -> io::Result<Sender<Vec<u8>>> {
    let (tx, rx) = mpsc::channel::<Vec<u8>>();
    thread::Builder::new()
        .name("pty-writer".to_string())
        .spawn(move || {
            for data in rx {
                if let Err(e) = writer.write_all(&data).and_then(|()| writer.flush()) {
                    tracing::debug!("PTY writer stopped: {e}");
                    break;
                }
            }
        })?;
    Ok(tx)
}
