//! bmd - Bitmessage-style object lifecycle daemon
//!
//! Wires together the local `sled` store, the HTTP(S) gateway client, and
//! the secp256k1 crypto provider, then either runs one-shot CLI intents
//! (`create-identity`, `send`) or drives the Periodic Driver loop (`run`).

mod commands;
mod config;

use anyhow::{Context, Result};
use bm_engine::{Driver, EngineConfig, HttpGateway};
use bm_object::Secp256k1Provider;
use bm_store::{SledStore, Store};
use clap::Parser;
use config::{Cli, Command};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("bmd=info".parse().unwrap()))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    std::fs::create_dir_all(&cli.data_dir)
        .with_context(|| format!("creating data directory {}", cli.data_dir.display()))?;
    let store = SledStore::open(&cli.data_dir)
        .with_context(|| format!("opening store at {}", cli.data_dir.display()))?;

    match cli.command {
        Command::CreateIdentity(args) => {
            commands::create_identity(&store, args)?;
            store.flush()?;
        }
        Command::Send(args) => {
            commands::send(&store, args)?;
            store.flush()?;
        }
        Command::Run { tick_interval_secs } => {
            run_driver(store, cli.gateway_url, cli.engine, tick_interval_secs).await?;
        }
    }
    Ok(())
}

/// Drives [`Driver::tick`] on a fixed interval (spec.md §4.8's external
/// wakeup) until interrupted. The data-at-rest key and database-cleaning
/// collaborators are out of scope for this daemon (spec.md §1); the key
/// gate always reports available and cleaning is a log line, not a real
/// vacuum, until those external systems exist.
async fn run_driver(
    store: SledStore,
    gateway_url: String,
    engine_config: EngineConfig,
    tick_interval_secs: u64,
) -> Result<()> {
    info!(
        "bmd v{} - object lifecycle daemon, ticking every {tick_interval_secs}s",
        env!("CARGO_PKG_VERSION")
    );

    let gateway = HttpGateway::new(gateway_url, engine_config.gateway_timeout_secs);
    let crypto = Secp256k1Provider::new();
    let mut driver = Driver::new();

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("received shutdown signal");
            shutdown.store(true, Ordering::SeqCst);
        });
    }

    let mut interval = tokio::time::interval(Duration::from_secs(tick_interval_secs));
    while !shutdown.load(Ordering::SeqCst) {
        interval.tick().await;
        let now = now();
        let next_id = || store.next_id().expect("store id generator failed");
        let event = driver
            .tick(
                &store,
                &gateway,
                &crypto,
                &engine_config,
                now,
                &next_id,
                || true,
                || tracing::info!("database-cleaning collaborator would run here"),
            )
            .await;

        match event {
            Ok(event) => info!(?event, "tick complete"),
            Err(e) => error!(%e, "tick failed"),
        }
        store.flush().context("flushing store after tick")?;
    }

    info!("shutting down");
    Ok(())
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs() as i64
}
