//! viewer-guard - blocklist API server.
//!
//! Loads the configuration, starts the expiry reaper and serves the HTTP API
//! until interrupted.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use viewer_guard::Reaper;
use viewer_guard_server::{GuardServer, ServerConfig};

#[derive(Parser)]
#[command(name = "viewer-guard")]
#[command(about = "IP blocklist service for media viewers")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, env = "VIEWER_GUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on (overrides the config file)
    #[arg(short, long, env = "VIEWER_GUARD_BIND")]
    bind: Option<SocketAddr>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "VIEWER_GUARD_LOG", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    config.validate()?;

    info!(
        config = ?cli.config,
        bind = %config.bind_addr,
        snapshot = ?config.guard.snapshot_path,
        "Starting viewer-guard"
    );

    let server = GuardServer::from_config(config.clone())?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reaper = Reaper::spawn(server.guard(), &config.guard.reaper, shutdown_rx);

    server
        .serve_with_shutdown(config.bind_addr, shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = reaper {
        if let Err(e) = handle.await {
            warn!(error = %e, "Reaper task ended abnormally");
        }
    }

    Ok(())
}

fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl+C, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
