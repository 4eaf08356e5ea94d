//! Chat connection-resilience runner.
//!
//! # Architecture Overview
//!
//! ```text
//!                   ┌──────────────────────────────────────────────────────┐
//!                   │                  RESILIENCE SESSION                   │
//!   stdin actions   │  ┌──────────┐    ┌────────────┐    ┌──────────────┐  │
//!   ────────────────┼─▶│  handle  │───▶│   actor    │───▶│  connection  │  │
//!   config reload   │  │ (facade) │    │ event loop │    │state machine │  │
//!   ────────────────┼─▶└──────────┘    └─────┬──────┘    └──────┬───────┘  │
//!                   │                        │                  │ backoff  │
//!                   │                        ▼                  ▼          │
//!                   │                 ┌────────────┐    ┌──────────────┐   │
//!                   │                 │  polling   │    │  transport   │◀──┼── backend
//!                   │                 │  manager   │───▶│  (injected)  │   │   conductor
//!                   │                 └────────────┘    └──────────────┘   │
//!                   │                                                      │
//!   snapshot ◀──────┼── watch channel      events ◀── broadcast channel    │
//!                   └──────────────────────────────────────────────────────┘
//! ```
//!
//! Runs a session against the simulated backend. Lines on stdin are dispatched
//! as store actions (`holochain/skipBackoff`, `elementalChat/setChannelPolling 2000`),
//! and `sim/offline` / `sim/online` toggle the simulated conductor.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use chat_resilience::config::watcher::{changed_intervals, ConfigWatcher};
use chat_resilience::config::{load_config, ResilienceConfig};
use chat_resilience::lifecycle::{signals, startup, Shutdown};
use chat_resilience::observability::{logging, metrics};
use chat_resilience::transport::SimulatedTransport;
use chat_resilience::{Action, ResilienceSession};

#[derive(Parser)]
#[command(name = "chat-resilience")]
#[command(about = "Run a connection-resilience session against a simulated conductor", long_about = None)]
struct Cli {
    /// TOML configuration file (watched for polling interval changes).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(short, long)]
    duration_secs: Option<u64>,

    /// Print the final snapshot as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ResilienceConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!("chat-resilience v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let transport = Arc::new(SimulatedTransport::new(config.simulation.clone()));
    let session = Arc::new(startup::start_session(config.clone(), transport.clone())?);
    let shutdown = Shutdown::new();

    let mut loops = Vec::new();

    // Config hot reload
    let _watcher = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            let handle = watcher.run()?;
            loops.push(tokio::spawn(forward_config_updates(
                config.clone(),
                updates,
                session.clone(),
                shutdown.subscribe(),
            )));
            Some(handle)
        }
        None => None,
    };

    loops.push(tokio::spawn(read_actions(
        spawn_stdin_reader(),
        session.clone(),
        transport.clone(),
        shutdown.subscribe(),
    )));

    match cli.duration_secs {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => tracing::info!("Run duration elapsed"),
                _ = signals::wait_for_shutdown_signal() => {}
            }
        }
        None => signals::wait_for_shutdown_signal().await,
    }

    shutdown.trigger();
    for handle in loops {
        let _ = handle.await;
    }

    let final_state = session.snapshot();
    match Arc::try_unwrap(session) {
        Ok(session) => session.teardown().await?,
        Err(_) => tracing::warn!("Session handle still shared, teardown on drop"),
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&final_state)?);
    } else {
        println!(
            "status={} reconnect_attempt={:?} polling_active={} last_error={:?}",
            final_state.status, final_state.reconnect_attempt, final_state.polling_active, final_state.last_error
        );
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn forward_config_updates(
    mut current: ResilienceConfig,
    mut updates: mpsc::UnboundedReceiver<ResilienceConfig>,
    session: Arc<ResilienceSession>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            Some(new_config) = updates.recv() => {
                let (channels, chatter) = changed_intervals(&current, &new_config);
                if let Some(interval) = channels {
                    if let Err(e) = session.set_channel_polling(Some(interval)) {
                        tracing::error!(error = %e, "Failed to apply channel polling interval");
                    }
                }
                if let Some(interval) = chatter {
                    if let Err(e) = session.set_refresh_chatter_interval(Some(interval)) {
                        tracing::error!(error = %e, "Failed to apply chatter polling interval");
                    }
                }
                current = new_config;
            }
            _ = shutdown.recv() => break,
        }
    }
}

/// Blocking stdin reads live on their own thread so they never hold up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read stdin");
                    break;
                }
            }
        }
    });
    rx
}

async fn read_actions(
    mut lines: mpsc::UnboundedReceiver<String>,
    session: Arc<ResilienceSession>,
    transport: Arc<SimulatedTransport>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else { break };
                let line = line.trim();
                match line {
                    "" => continue,
                    "sim/offline" => transport.set_online(false),
                    "sim/online" => transport.set_online(true),
                    _ => match line.parse::<Action>() {
                        Ok(action) => {
                            if let Err(e) = session.dispatch(action) {
                                tracing::error!(error = %e, "Action rejected");
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "Ignoring input"),
                    },
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}
