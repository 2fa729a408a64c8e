//! Shell detection and command construction.

use portable_pty::CommandBuilder;
use tether_config::ShellConfig;

// =============================================================================
// SHELL DETECTION
// =============================================================================

/// Get the user's default shell.
///
/// - Unix: reads `$SHELL`, falls back to `/bin/sh`
/// - Windows: reads `$COMSPEC`, falls back to `cmd.exe`
pub fn default_shell() -> String {
    #[cfg(unix)]
    {
        std::env::var("SHELL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "/bin/sh".to_string())
    }
    #[cfg(windows)]
    {
        std::env::var("COMSPEC")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "cmd.exe".to_string())
    }
}

/// The configured shell program, or the platform default when unset.
pub fn resolve_shell(config: &ShellConfig) -> String {
    config
        .program()
        .map(str::to_string)
        .unwrap_or_else(default_shell)
}

// =============================================================================
// COMMAND
// =============================================================================

/// Build the command for a new session.
///
/// The child inherits the parent environment, with `TERM` forced to
/// `xterm-256color` and the configured extra variables layered on top.
pub fn build_shell_command(config: &ShellConfig, cwd: Option<&str>) -> CommandBuilder {
    let shell = resolve_shell(config);
    let mut cmd = CommandBuilder::new(&shell);

    cmd.env("TERM", "xterm-256color");
    for (key, val) in &config.env {
        cmd.env(key, val);
    }

    #[cfg(unix)]
    if config.login_shell {
        cmd.arg("-l");
    }
    for arg in &config.args {
        cmd.arg(arg);
    }

    if let Some(dir) = cwd.filter(|d| !d.is_empty()) {
        cmd.cwd(dir);
    }

    cmd
}

// =============================================================================
// TESTS
// =============================================================================
