//! Per-session reader thread: PTY bytes in, decoded chunks out.

use std::io::{self, Read};
use std::sync::Arc;
use std::thread;

use tether_common::SessionId;

use super::Inner;
use crate::types::PTY_READ_CHUNK;
use crate::utf8::Utf8Decoder;

/// Start the blocking reader for one session instance.
pub(super) fn spawn_reader(
    inner: Arc<Inner>,
    id: SessionId,
    generation: u64,
    mut reader: Box<dyn Read + Send>,
) -> io::Result<()> {
    thread::Builder::new()
        .name("pty-reader".to_string())
        .spawn(move || {
            let mut buf = [0u8; PTY_READ_CHUNK];
            let mut decoder = Utf8Decoder::new();
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break, // EOF, shell exited
                    Ok(n) => {
                        let text = decoder.decode(&buf[..n]);
                        if !text.is_empty() {
                            inner.handle_output(&id, generation, text);
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        // Linux reports EIO once the slave side is closed.
                        tracing::debug!(session = %id, "PTY reader stopped: {e}");
                        break;
                    }
                }
            }

            let rest = decoder.finish();
            if !rest.is_empty() {
                inner.handle_output(&id, generation, rest);
            }
            inner.handle_exit(&id, generation);
        })?;
    Ok(())
}
