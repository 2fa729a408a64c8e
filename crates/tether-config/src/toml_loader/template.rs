//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Tether Configuration
# Only override what you want to change -- missing fields use defaults.

[shell]
# program = ""            # empty = $SHELL (Unix) / %COMSPEC% (Windows)
# args = []
# login_shell = true

[shell.env]
# EDITOR = "nvim"

[pty]
# buffer_capacity = 1000  # output chunks kept per session, 1-100000
# startup_delay_ms = 500  # 0-10000
# default_cols = 80
# default_rows = 24

[relay]
# bind_address = "0.0.0.0"
# port = 0                # 0 = pick a free port
# ws_path = "/ws"
# asset_proxy = ""        # e.g. "http://localhost:5173" for live assets
# token_length = 16       # 8-64

[logging]
# level = "info"          # trace, debug, info, warn, error
"##
    .to_string()
}
