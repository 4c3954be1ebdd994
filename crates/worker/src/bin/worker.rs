//! scorebox-worker — detached probe-execution agent.
//!
//! Subscribes to the master's signal channel, runs checks for its assigned
//! teams, and pushes result batches back through the coordination store.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::Notify;
use tracing::info;

use scorebox_coord::RedisCoordStore;
use scorebox_worker::WorkerAgent;

/// Scorebox probe worker — executes service checks for its assigned teams.
#[derive(Parser, Debug)]
#[command(name = "scorebox-worker", version, about)]
struct Cli {
    /// Coordination store (Redis) URL.
    #[arg(long, env = "SCOREBOX_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Directory containing the probe scripts.
    #[arg(long, env = "SCOREBOX_SCRIPTS_DIR", default_value = "checks")]
    scripts_dir: PathBuf,

    /// Comma-separated identifying addresses of the teams this worker probes.
    #[arg(long, env = "SCOREBOX_TEAMS", value_delimiter = ',')]
    teams: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    scorebox_core::config::load_dotenv();
    let cli = Cli::parse();

    let coord = Arc::new(RedisCoordStore::connect(&cli.redis_url).await?);
    let agent = WorkerAgent::new(coord, cli.scripts_dir, cli.teams)?;

    let shutdown = Arc::new(Notify::new());
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        os_signal().await;
        info!("shutdown signal received");
        signal_shutdown.notify_waiters();
    });

    info!("scorebox-worker starting");
    agent.run(shutdown).await?;
    info!("scorebox-worker exited cleanly");

    Ok(())
}

/// Wait for SIGINT or SIGTERM (Unix) or Ctrl+C (cross-platform fallback).
async fn os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl_c");
    }
}
