//! tetherd - supervisory runner for the tether confinement engine
//!
//! Wires the engine against the simulated host adapter so policies can be
//! exercised end-to-end without a platform integration:
//! - Configuration loading (degrading to disabled on malformed files)
//! - Controller lifecycle and signal handling
//! - Remaining-time display at ~1 Hz
//! - Optional scripted foreground intrusions to demo bring-back
//!
//! Real deployments embed `tether-core` behind their platform's
//! `HostAdapter` instead of running this binary.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tether_api::{EndReason, EngineEvent};
use tether_config::load_config_or_disabled;
use tether_core::ConfinementController;
use tether_host_api::{HostAdapter, MockHost, PermissionStatusProvider};
use tether_util::{AppId, default_config_path, format_duration};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Confinement engine runner with a simulated host
#[derive(Parser, Debug)]
#[command(name = "tetherd")]
#[command(about = "Foreground-confinement engine runner", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/tether/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// App identity to confine
    #[arg(short, long, default_value = "org.example.reader")]
    target: String,

    /// Periodically move a foreign app to the simulated foreground
    #[arg(long)]
    simulate_interruptions: bool,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let policy = Arc::new(load_config_or_disabled(&args.config));
    if !policy.enabled {
        warn!(config = %args.config.display(), "Confinement disabled, nothing to do");
        return Ok(());
    }

    let target = AppId::new(args.target.clone());
    let host = Arc::new(MockHost::new());
    host.set_foreground(target.clone());

    let controller = ConfinementController::new(
        host.clone() as Arc<dyn HostAdapter>,
        host.clone() as Arc<dyn PermissionStatusProvider>,
    );

    let session_id = controller
        .start(policy, target.clone())
        .await
        .context("Failed to start confinement")?;
    info!(%session_id, target_app = %target, "Confinement running");

    if args.simulate_interruptions {
        spawn_intruder(host.clone());
    }

    run_until_done(&controller).await;
    Ok(())
}

/// Drive the engine's streams until it stops or the process is signalled
async fn run_until_done(controller: &ConfinementController) {
    let mut remaining = controller.remaining_ms();
    let mut events = controller.events();
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "SIGTERM handler unavailable");
            // Ctrl-C still works below
            return run_without_sigterm(controller).await;
        }
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping confinement");
                controller.stop(EndReason::Shutdown).await;
                break;
            }
            _ = sigterm.recv() => {
                info!("Terminated, stopping confinement");
                controller.stop(EndReason::Shutdown).await;
                break;
            }
            changed = remaining.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(ms) = *remaining.borrow_and_update() {
                    info!(remaining = %format_duration(Duration::from_millis(ms)), "Confinement running");
                }
            }
            event = events.recv() => match event {
                Ok(EngineEvent::EndWarning { time_remaining, .. }) => {
                    info!(remaining = %format_duration(time_remaining), "Confinement ending soon");
                }
                Ok(EngineEvent::Stopped { reason, .. }) => {
                    info!(?reason, "Confinement ended");
                    break;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    }
}

async fn run_without_sigterm(controller: &ConfinementController) {
    let mut events = controller.events();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                controller.stop(EndReason::Shutdown).await;
                break;
            }
            event = events.recv() => match event {
                Ok(EngineEvent::Stopped { .. }) | Err(_) => break,
                Ok(_) => {}
            }
        }
    }
}

/// Every ten seconds, pretend a foreign app grabbed the foreground
fn spawn_intruder(host: Arc<MockHost>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(10));
        ticker.tick().await; // skip the immediate first tick
        loop {
            ticker.tick().await;
            info!("Simulating foreground intrusion");
            host.set_foreground(AppId::new("org.example.intruder"));
        }
    });
}
