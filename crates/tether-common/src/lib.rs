pub mod errors;
pub mod id;

pub use errors::{ConfigError, ProtocolError, PtyError, RelayError, TetherError};
pub use id::{new_id, new_token, SessionId, WorkspaceId};

pub type Result<T> = std::result::Result<T, TetherError>;
