//! Configuration validation.
//!
//! Checks numeric ranges and string shapes, collecting every violation into
//! a single `ConfigError`.

use crate::schema::TetherConfig;
use tether_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &TetherConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_range(
        &mut errors,
        "pty.buffer_capacity",
        config.pty.buffer_capacity,
        1,
        100_000,
    );
    validate_range(
        &mut errors,
        "pty.startup_delay_ms",
        config.pty.startup_delay_ms,
        0,
        10_000,
    );
    validate_range(&mut errors, "pty.default_cols", config.pty.default_cols, 2, 1000);
    validate_range(&mut errors, "pty.default_rows", config.pty.default_rows, 1, 1000);
    validate_range(
        &mut errors,
        "relay.token_length",
        config.relay.token_length,
        8,
        64,
    );

    if !config.relay.ws_path.starts_with('/') {
        errors.push(format!(
            "relay.ws_path must start with '/', got '{}'",
            config.relay.ws_path
        ));
    }

    if config.relay.bind_address.parse::<std::net::IpAddr>().is_err() {
        errors.push(format!(
            "relay.bind_address must be an IP address, got '{}'",
            config.relay.bind_address
        ));
    }

    if let Some(target) = config.relay.proxy_target() {
        if !(target.starts_with("http://") || target.starts_with("https://")) {
            errors.push(format!(
                "relay.asset_proxy must be an http(s) origin, got '{target}'"
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_range<T>(errors: &mut Vec<String>, field: &str, value: T, min: T, max: T)
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min || value > max {
        errors.push(format!("{field} must be {min}-{max}, got {value}"));
    }
}
