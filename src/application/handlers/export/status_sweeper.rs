//! StatusSweeper - Background eviction of expired export state.
//!
//! Terminal status records are kept for the manager's retention window so
//! late status lookups still succeed; after that they are dropped. Renderer
//! caches register extra sweeps that run on the same schedule.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `interval` | 1h | How often expired state is swept |
//!
//! ## Graceful Shutdown
//!
//! The sweeper listens on a watch channel and runs one final sweep
//! before returning.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use super::export_manager::ExportManager;

/// Extra cleanup run on every sweep. Returns the number of entries removed.
pub type SweepFn = Box<dyn Fn() -> usize + Send + Sync>;

/// Configuration for the StatusSweeper service.
#[derive(Debug, Clone)]
pub struct StatusSweeperConfig {
    pub interval: Duration,
}

impl Default for StatusSweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
        }
    }
}

impl StatusSweeperConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Periodically evicts expired status records and cache entries.
pub struct StatusSweeper {
    manager: Arc<ExportManager>,
    extra: Vec<(&'static str, SweepFn)>,
    config: StatusSweeperConfig,
}

impl StatusSweeper {
    pub fn new(manager: Arc<ExportManager>, config: StatusSweeperConfig) -> Self {
        Self {
            manager,
            extra: Vec::new(),
            config,
        }
    }

    /// Adds a named cleanup step to every sweep.
    pub fn with_sweep(
        mut self,
        name: &'static str,
        sweep: impl Fn() -> usize + Send + Sync + 'static,
    ) -> Self {
        self.extra.push((name, Box::new(sweep)));
        self
    }

    /// Sweeps on every tick until shutdown is signalled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.interval);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        self.sweep_once();
                        tracing::info!("Status sweeper stopped");
                        return;
                    }
                }
                _ = interval.tick() => {
                    self.sweep_once();
                }
            }
        }
    }

    /// Runs one sweep. Returns the total number of entries removed.
    pub fn sweep_once(&self) -> usize {
        let mut removed = self.manager.sweep_expired();
        for (name, sweep) in &self.extra {
            let count = sweep();
            if count > 0 {
                tracing::debug!(cache = *name, evicted = count, "Swept cache entries");
            }
            removed += count;
        }
        removed
    }
}

impl std::fmt::Debug for StatusSweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.extra.iter().map(|(name, _)| *name).collect();
        f.debug_struct("StatusSweeper")
            .field("config", &self.config)
            .field("extra", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::resilience::InMemoryCircuitBreaker;
    use crate::adapters::status::InMemoryStatusStore;
    use crate::domain::export::{ExportError, GenerationResult};
    use crate::ports::{ExportGenerator, GenerationJob};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct UnusedGenerator;

    #[async_trait]
    impl ExportGenerator for UnusedGenerator {
        async fn generate(&self, _job: GenerationJob) -> Result<GenerationResult, ExportError> {
            Err(ExportError::internal("not used"))
        }
    }

    fn manager() -> Arc<ExportManager> {
        Arc::new(ExportManager::new(
            Arc::new(UnusedGenerator),
            Arc::new(InMemoryStatusStore::new()),
            Arc::new(InMemoryCircuitBreaker::with_defaults("export")),
        ))
    }

    #[test]
    fn sweep_runs_registered_steps() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let sweeper = StatusSweeper::new(manager(), StatusSweeperConfig::default()).with_sweep(
            "blocks",
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                3
            },
        );

        assert_eq!(sweeper.sweep_once(), 3);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let sweeper = StatusSweeper::new(
            manager(),
            StatusSweeperConfig::default().with_interval(Duration::from_millis(10)),
        )
        .with_sweep("counter", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            0
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { sweeper.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        // At least one tick plus the final sweep.
        assert!(runs.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn config_default_is_hourly() {
        assert_eq!(StatusSweeperConfig::default().interval, Duration::from_secs(3600));
    }
}
