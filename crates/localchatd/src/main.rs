//! localchatd — the background service that runs a localchat node.
//!
//! # Usage
//!
//! ```bash
//! localchatd                              # listen on the default boundary socket
//! localchatd --socket-path /tmp/lc.sock   # use a non-default socket
//! localchatd --log-dir ~/.local/share/localchat  # also log to a file
//! ```
//!
//! The daemon never persists room membership, display name, or peer-id
//! across runs — joining a room is purely a boundary API call made by a
//! client after the daemon starts. Only ambient process configuration
//! (socket path, log directory) is accepted on the command line.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::NodeConfig;
use localchat_node::boundary_server::BoundaryServer;
use std::path::PathBuf;
use tracing::{error, info};

/// localchatd — LAN chat node daemon.
#[derive(Parser, Debug)]
#[command(name = "localchatd", about = "localchat LAN messenger daemon")]
struct Cli {
    /// Path to the boundary API Unix socket.
    #[arg(long)]
    socket_path: Option<PathBuf>,

    /// Directory for a rolling log file, in addition to stderr.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Accepted for boundary API compatibility; the core has no developer
    /// tools of its own to open.
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = NodeConfig::resolve(cli.socket_path, cli.log_dir);
    init_logging(&config);

    if cli.dev {
        info!("dev mode requested (no core behavior change)");
    }

    let server = BoundaryServer::bind(&config.socket_path)
        .await
        .context("failed to bind boundary socket")?;
    info!(path = %server.socket_path().display(), "boundary API listening");

    let node = localchat_node::spawn();

    tokio::spawn(server.run(node));

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "failed to listen for Ctrl+C"),
    }

    Ok(())
}

/// Sets up stderr logging, plus an optional rolling file layer under
/// `config.log_dir`. Verbosity comes from `config.log_filter`.
fn init_logging(config: &NodeConfig) {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let file_layer = config.log_dir.as_deref().and_then(|dir| {
        std::fs::create_dir_all(dir).ok()?;
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("localchatd.log"))
            .ok()
    }).map(|file| {
        fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
}
