//! Orchestrator module for the movies ETL.
//!
//! Triggers a synchronization cycle per entity kind on a fixed interval.

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::synchronizer::{CycleOutcome, Synchronizer};
use crate::IndexingError;
use movies_etl_shared::EntityKind;

/// Configuration for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Interval between persons cycles.
    pub persons_interval: Duration,
    /// Interval between genres cycles.
    pub genres_interval: Duration,
    /// Interval between film works cycles.
    pub film_works_interval: Duration,
    /// Delay between the first cycles of consecutive kinds.
    pub stagger: Duration,
    /// Interval between progress log lines.
    pub progress_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            persons_interval: Duration::from_secs(60),
            genres_interval: Duration::from_secs(60),
            film_works_interval: Duration::from_secs(60),
            stagger: Duration::from_secs(1),
            progress_interval: Duration::from_secs(60),
        }
    }
}

impl OrchestratorConfig {
    /// Interval between cycles of `kind`.
    pub fn interval(&self, kind: EntityKind) -> Duration {
        let interval = match kind {
            EntityKind::Persons => self.persons_interval,
            EntityKind::Genres => self.genres_interval,
            EntityKind::FilmWorks => self.film_works_interval,
        };
        interval.max(Duration::from_millis(1))
    }
}

/// Orchestrator that periodically runs the synchronizer.
///
/// The orchestrator:
/// - Runs one task per entity kind, each on its own interval
/// - Handles shutdown signals, letting running cycles finish
/// - Logs synchronization progress
pub struct Orchestrator {
    synchronizer: Arc<Synchronizer>,
    config: OrchestratorConfig,
    shutdown_tx: broadcast::Sender<()>,
}

impl Orchestrator {
    /// Create a new orchestrator with the default configuration.
    pub fn new(synchronizer: Arc<Synchronizer>) -> Self {
        Self::with_config(synchronizer, OrchestratorConfig::default())
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config(synchronizer: Arc<Synchronizer>, config: OrchestratorConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            synchronizer,
            config,
            shutdown_tx,
        }
    }

    /// Run the orchestrator.
    ///
    /// Blocks until Ctrl-C is received or [`Orchestrator::shutdown`] is
    /// called. Failed cycles are logged and retried on the next tick.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), IndexingError> {
        info!("Starting movies ETL orchestrator");

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handles: Vec<JoinHandle<()>> = EntityKind::ALL
            .into_iter()
            .enumerate()
            .map(|(position, kind)| {
                let delay = self.config.stagger * position as u32;
                tokio::spawn(run_kind(
                    Arc::clone(&self.synchronizer),
                    kind,
                    delay,
                    self.config.interval(kind),
                    self.shutdown_tx.subscribe(),
                ))
            })
            .collect();

        let mut progress_timer = interval(self.config.progress_interval.max(Duration::from_millis(1)));
        progress_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Track previous values for rate calculation
        let mut prev_docs: u64 = 0;
        let mut prev_time = std::time::Instant::now();

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    let _ = self.shutdown_tx.send(());
                    break;
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown requested");
                    break;
                }
                _ = progress_timer.tick() => {
                    let stats = self.synchronizer.stats();

                    let now = std::time::Instant::now();
                    let elapsed_secs = now.duration_since(prev_time).as_secs_f64();
                    let docs_per_sec = if elapsed_secs > 0.0 {
                        (stats.documents_loaded.saturating_sub(prev_docs) as f64) / elapsed_secs
                    } else {
                        0.0
                    };

                    info!(
                        cycles_succeeded = stats.cycles_succeeded,
                        cycles_failed = stats.cycles_failed,
                        documents_loaded = stats.documents_loaded,
                        documents_per_sec = format!("{:.2}", docs_per_sec),
                        "Synchronization progress"
                    );

                    prev_docs = stats.documents_loaded;
                    prev_time = now;
                }
            }
        }

        // Running cycles finish before their task exits.
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Synchronization task ended abnormally");
            }
        }

        let stats = self.synchronizer.stats();
        info!(
            cycles_succeeded = stats.cycles_succeeded,
            cycles_failed = stats.cycles_failed,
            documents_loaded = stats.documents_loaded,
            "Orchestrator shutdown complete"
        );
        Ok(())
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Tick loop of one entity kind.
async fn run_kind(
    synchronizer: Arc<Synchronizer>,
    kind: EntityKind,
    delay: Duration,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval_at(Instant::now() + delay, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    debug!(kind = %kind, delay_ms = delay.as_millis() as u64, period_secs = period.as_secs(), "Scheduled synchronization");

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = ticker.tick() => {
                // Not a select branch: a started cycle always runs to completion.
                match synchronizer.synchronize(kind).await {
                    Ok(CycleOutcome::Skipped) => debug!(kind = %kind, "Cycle skipped"),
                    Ok(CycleOutcome::NoChanges) => debug!(kind = %kind, "Cycle found no changes"),
                    Ok(CycleOutcome::Synchronized { .. }) => {}
                    // Already logged with its stage; the next tick replays it.
                    Err(_) => {}
                }
            }
        }
    }

    debug!(kind = %kind, "Synchronization task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_intervals() {
        let config = OrchestratorConfig::default();
        for kind in EntityKind::ALL {
            assert_eq!(config.interval(kind), Duration::from_secs(60));
        }
        assert_eq!(config.stagger, Duration::from_secs(1));
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = OrchestratorConfig {
            genres_interval: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(config.interval(EntityKind::Genres), Duration::from_millis(1));
    }
}
