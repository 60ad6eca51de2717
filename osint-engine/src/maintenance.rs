//! Background housekeeping tasks
//!
//! - Artifact sweep every `artifacts.sweep_interval_secs`
//! - Daily pruning of search and visitor rows older than
//!   `storage.retention_days`

use crate::artifacts::ArtifactLifecycle;
use osint_common::StorageGateway;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

const PRUNE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Periodically delete expired artifacts
pub fn spawn_artifact_sweeper(artifacts: ArtifactLifecycle, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            artifacts.sweep_expired().await;
        }
    })
}

/// Prune history older than `retention` once a day, starting now
pub fn spawn_history_pruner(storage: StorageGateway, retention: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PRUNE_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let removed = storage.prune_older_than(retention).await;
            if removed > 0 {
                info!(removed, "Pruned old search and visitor rows");
            }
        }
    })
}
