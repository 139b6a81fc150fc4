//! Background retention sweeping for the job registry.
//!
//! Terminal jobs are kept for a retention window so clients can fetch
//! results well after completion, then evicted. The sweeper is a
//! cancellable tokio task spawned by the binary entrypoint.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::JobRegistry;

/// Tunable parameters for the retention sweeper.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// How long terminal jobs remain reachable after their last update.
    pub ttl: chrono::Duration,
    /// How often the sweeper checks for expired jobs.
    pub sweep_interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            ttl: chrono::Duration::hours(24),
            sweep_interval: Duration::from_secs(600),
        }
    }
}

/// Spawn the sweep loop. Runs until the cancellation token fires.
pub fn spawn_sweeper(
    registry: JobRegistry,
    config: RetentionConfig,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.sweep_interval);
        // The first tick fires immediately; skip it so a fresh start
        // does not race job creation.
        interval.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Retention sweeper stopped");
                    return;
                }
                _ = interval.tick() => {
                    let evicted = registry.evict_expired(config.ttl).await;
                    if evicted > 0 {
                        tracing::info!(evicted, "Retention sweep evicted jobs");
                    }
                }
            }
        }
    })
}
