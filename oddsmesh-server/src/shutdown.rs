//! Process signals: termination and config reload.

use crate::config::ConfigLoader;
use oddsmesh_core::config::SharedConfig;
use oddsmesh_core::events::ShutdownReceiver;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;

/// Resolves once the process is asked to stop (SIGTERM or SIGINT).
pub async fn wait_for_termination() {
    let name = tokio::select! {
        _ = wait_for(SignalKind::terminate()) => "SIGTERM",
        _ = wait_for(SignalKind::interrupt()) => "SIGINT",
    };
    tracing::info!(signal = name, "stop requested, draining connections");
}

/// Await one delivery of `kind`. If the handler cannot be installed the
/// future never resolves, so the sibling signal still works.
async fn wait_for(kind: SignalKind) {
    match signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            tracing::error!(error = %e, signal = ?kind, "could not install signal handler");
            std::future::pending::<()>().await;
        }
    }
}

/// Re-read the config file on SIGHUP and swap the venue/chain/sync
/// sections in place. Adapter credentials are captured when the registry
/// is built, so changing a venue's keys still needs a restart; endpoints,
/// contract addresses and sync tunables apply on the next read.
///
/// The task ends when the shared shutdown watch flips.
pub fn spawn_config_reload_handler(
    config: SharedConfig,
    loader: Arc<ConfigLoader>,
    mut shutdown_rx: ShutdownReceiver,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = wait_for(SignalKind::hangup()) => {
                    match loader.load() {
                        Ok(loaded) => {
                            apply_reload(&config, loaded).await;
                            tracing::info!("config sections swapped after SIGHUP");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "SIGHUP reload rejected, keeping current config");
                        }
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("config reload task finished");
    })
}

async fn apply_reload(config: &SharedConfig, loaded: crate::config::LoadedConfig) {
    *config.venues.write().await = loaded.file.venues;
    *config.chain.write().await = loaded.file.chain;
    *config.sync.write().await = loaded.file.sync;
}
