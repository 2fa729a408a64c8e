//! Configuration schema types for Tether.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod logging;
mod pty;
mod relay;
mod shell;

pub use logging::*;
pub use pty::*;
pub use relay::*;
pub use shell::*;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TetherConfig {
    pub shell: ShellConfig,
    pub pty: PtyConfig,
    pub relay: RelayConfig,
    pub logging: LoggingConfig,
}
