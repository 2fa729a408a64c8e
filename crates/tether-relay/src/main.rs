//! tether: run a shell and mirror it to other devices on the network.
//!
//! Starts one session for a workspace, serves it over the relay and prints
//! the URLs a remote client can connect with.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tether_common::{SessionId, TetherError, WorkspaceId};
use tether_config::{LogLevel, TetherConfig};
use tether_pty::{SessionManager, SpawnRequest};
use tether_relay::{MemoryWorkspaceStore, PromptWatchSink, Relay, SessionHost, StoredSession};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tether", about = "Mirror terminal sessions to another device")]
struct Args {
    /// Config file. Defaults to `<config dir>/tether/config.toml`.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level when `RUST_LOG` is unset (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Workspace the session belongs to.
    #[arg(short, long, default_value = "default")]
    workspace: String,

    /// Working directory of the shell. Defaults to the current directory.
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Command typed into the shell once it has started.
    #[arg(long)]
    command: Option<String>,

    /// Relay port, overriding the config file. 0 picks a free port.
    #[arg(short, long)]
    port: Option<u16>,
}

fn init_logging(args: &Args, level: LogLevel) {
    let fallback = args
        .log_level
        .as_deref()
        .map(|l| format!("tether={l}"))
        .unwrap_or_else(|| level.directive().to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .init();
}

fn load(args: &Args) -> Result<TetherConfig, TetherError> {
    let config = match &args.config {
        Some(path) => tether_config::toml_loader::load_from_path(path)?,
        None => tether_config::load_config()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), TetherError> {
    let args = Args::parse();

    let config = match load(&args) {
        Ok(config) => {
            init_logging(&args, config.logging.level);
            config
        }
        Err(e) => {
            init_logging(&args, LogLevel::default());
            tracing::warn!("failed to load config, using defaults: {e}");
            TetherConfig::default()
        }
    };

    tracing::debug!(config = %tether_config::config_to_json(&config), "effective config");

    let mut relay_config = config.relay.clone();
    if let Some(port) = args.port {
        relay_config.port = port;
    }

    let workspace_id = WorkspaceId::from(args.workspace.as_str());
    let cwd = match &args.cwd {
        Some(cwd) => cwd.clone(),
        None => std::env::current_dir()?,
    };
    let cwd = cwd.to_string_lossy().into_owned();

    let manager = SessionManager::new(config.shell.clone(), config.pty.clone());
    let store = Arc::new(MemoryWorkspaceStore::new());
    store.set_path(workspace_id.clone(), cwd.clone());

    let host: Arc<dyn SessionHost> = Arc::new(manager.clone());
    let relay = Relay::builder(relay_config, host)
        .store(store.clone())
        .default_size(config.pty.default_cols, config.pty.default_rows)
        .build();
    manager.add_sink(Arc::new(relay.sink()));
    manager.add_sink(Arc::new(PromptWatchSink::new()));

    let session_id = SessionId::generate();
    let mut request = SpawnRequest::new(session_id.clone(), workspace_id.clone())
        .cwd(cwd.clone())
        .display_name("shell");
    if let Some(command) = &args.command {
        request = request.startup_command(command.clone());
    }
    if !manager.spawn(request, None) {
        return Err(TetherError::Other(format!("failed to start a shell in {cwd}")));
    }
    store.add_session(
        workspace_id.clone(),
        StoredSession {
            id: session_id,
            name: "shell".into(),
        },
    );

    let info = relay.start().await?;
    let token = relay.generate_token(&workspace_id);

    let mut hosts: Vec<IpAddr> = info.local_addresses.iter().copied().map(IpAddr::V4).collect();
    hosts.push(IpAddr::V4(Ipv4Addr::LOCALHOST));
    println!("tether relay on port {}", info.port);
    for host in hosts {
        println!("  {}", relay.connection_url(&info, host, &workspace_id, &token)?);
    }
    if let Some(target) = &info.proxy_target {
        println!("  assets proxied to {target}");
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    let shutdown = manager.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || shutdown.kill_all()).await {
        tracing::warn!("session teardown failed: {e}");
    }
    relay.shutdown();
    Ok(())
}
