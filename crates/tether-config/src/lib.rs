//! Tether configuration system.
//!
//! TOML-based configuration for the shell, PTY session manager and remote
//! relay. All sections use `serde(default)` so partial configs work out of
//! the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tether_config::load_config;
//!
//! let config = load_config().expect("failed to load config");
//! println!("relay port: {}", config.relay.port);
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{LogLevel, LoggingConfig, PtyConfig, RelayConfig, ShellConfig, TetherConfig};

use tether_common::ConfigError;

/// Load config from the platform default path, creating it if missing.
///
/// Validation problems are logged, not returned.
pub fn load_config() -> Result<TetherConfig, ConfigError> {
    toml_loader::load_default()
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &TetherConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
