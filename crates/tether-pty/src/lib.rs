//! PTY session manager for Tether.
//!
//! Owns the shell processes behind every session, keeps a bounded history
//! of their raw output for replay, tracks a best-effort idle/executing
//! flag, and fans output out to registered [`OutputSink`]s. Parsing and
//! prompt detection are left to consumers.

pub mod buffer;
pub mod manager;
pub mod shell;
pub mod shell_prompt;
pub mod types;
pub mod utf8;

pub use buffer::OutputBuffer;
pub use manager::SessionManager;
pub use shell::{build_shell_command, default_shell};
pub use shell_prompt::{looks_like_shell_prompt, strip_ansi};
pub use types::{
    ExecState, OutputSink, SessionSummary, SpawnRequest, DEFAULT_BUFFER_CAPACITY, DEFAULT_COLS,
    DEFAULT_ROWS, PTY_READ_CHUNK,
};
pub use utf8::Utf8Decoder;
