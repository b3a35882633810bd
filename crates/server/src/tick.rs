//! Periodic server-side tasks: movement synchronization and autosave.
//!
//! Each task runs on its own tokio task with a fixed interval and stops when
//! the shutdown token is cancelled.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::persistence;
use crate::server::Server;

/// Spawn the movement-sync loop. Every tick, every entity in every loaded
/// level is compared against its last broadcast pose and the delta fanned out.
pub fn start_sync(server: Arc<Server>, shutdown: CancellationToken) {
    let period = server.config.tick_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::info!("Entity sync started (interval {:?})", period);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    for level in server.levels() {
                        level.update_entities();
                    }
                }
            }
        }
    });
}

/// Spawn the autosave loop for levels with unsaved edits.
pub fn start_autosave(server: Arc<Server>, dir: PathBuf, shutdown: CancellationToken) {
    let period = server.config.autosave_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await; // first tick is immediate, skip it
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let levels = server.levels();
                    match persistence::save_dirty(&levels, &dir) {
                        Ok(0) => tracing::debug!("Autosave: nothing to save"),
                        Ok(n) => tracing::info!("Autosave complete: {} levels", n),
                        Err(e) => tracing::error!("Autosave failed: {:#}", e),
                    }
                }
            }
        }
    });
}
