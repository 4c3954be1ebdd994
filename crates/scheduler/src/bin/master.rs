//! scorebox-master — the scoring master.
//!
//! Loads the event configuration, migrates Postgres, publishes the roster
//! to the coordination store, and drives the tick loop alongside its two
//! companion loops (scheduled breaks, roster-change listener) until the
//! event window closes or a stop signal arrives.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::{mpsc, Notify};
use tracing::{error, info};

use scorebox_coord::RedisCoordStore;
use scorebox_core::config::{load_dotenv, MasterConfig};
use scorebox_scheduler::{breaks, listener, Scheduler};
use scorebox_store::{init_pg_pool, PgChangeListener, PgScoreStore};

/// Scorebox master — schedules service checks and records the scores.
#[derive(Parser, Debug)]
#[command(name = "scorebox-master", version, about)]
struct Cli {
    /// Path to the event configuration file.
    #[arg(long, env = "SCOREBOX_CONFIG", default_value = "scorebox.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let config = MasterConfig::from_file(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    config.validate()?;

    let pool = init_pg_pool(&config.postgres.url)
        .await
        .context("connecting to postgres")?;
    let store = Arc::new(PgScoreStore::new(pool));
    let coord = Arc::new(
        RedisCoordStore::connect(&config.coord.redis_url)
            .await
            .context("connecting to the coordination store")?,
    );
    let change_sub = PgChangeListener::connect(&config.postgres.url)
        .await
        .context("subscribing to roster change notifications")?;

    let shutdown = Arc::new(Notify::new());
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        os_signal().await;
        info!("shutdown signal received");
        signal_shutdown.notify_waiters();
    });

    let scheduler = Arc::new(Scheduler::new(
        coord,
        store,
        config.event.clone(),
        config.timing.interval(),
        config.timing.check_timeout(),
        shutdown.clone(),
    ));
    scheduler.load_roster().await.context("initial roster load")?;

    let (break_tx, break_rx) = mpsc::channel(4);
    let break_loop = tokio::spawn(breaks::run_break_loop(
        config.event.clone(),
        break_tx,
        shutdown.clone(),
    ));
    let change_loop = tokio::spawn(listener::run_change_listener(
        scheduler.clone(),
        Box::new(change_sub),
        shutdown.clone(),
    ));

    info!(
        starts_at = %config.event.starts_at,
        ends_at = %config.event.ends_at,
        interval_secs = config.timing.interval_secs,
        "scorebox-master starting"
    );
    scheduler.run(break_rx).await;

    // The tick loop is done; wind the companions down with it.
    shutdown.notify_waiters();
    let _ = break_loop.await;
    match change_loop.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "change listener failed"),
        Err(e) => error!(error = %e, "change listener panicked"),
    }

    info!("scorebox-master exited cleanly");
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
