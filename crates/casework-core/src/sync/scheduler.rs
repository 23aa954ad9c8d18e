//! Drives every domain engine from startup, reconnects and a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::engine::{DomainSync, DrainReport};
use crate::connectivity::{on_change, ConnectivityMonitor, Subscription};
use crate::models::Domain;
use crate::Result;

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

type Engines = Arc<[Arc<dyn DomainSync>]>;

pub struct SyncScheduler {
    engines: Engines,
    connectivity: Arc<dyn ConnectivityMonitor>,
    interval: Duration,
    running: Option<Running>,
}

struct Running {
    subscription: Subscription,
    ticker: JoinHandle<()>,
}

impl SyncScheduler {
    pub fn new(
        engines: Vec<Arc<dyn DomainSync>>,
        connectivity: Arc<dyn ConnectivityMonitor>,
    ) -> Self {
        Self {
            engines: engines.into(),
            connectivity,
            interval: DEFAULT_SYNC_INTERVAL,
            running: None,
        }
    }

    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub const fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn domains(&self) -> Vec<Domain> {
        self.engines.iter().map(|engine| engine.domain()).collect()
    }

    /// Begin background syncing. Calling it while running does nothing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.running.is_some() {
            return;
        }

        if self.connectivity.is_online() {
            spawn_drain(Arc::clone(&self.engines), "startup");
        }

        let engines = Arc::clone(&self.engines);
        let subscription = on_change(self.connectivity.as_ref(), move |transition| {
            if transition.is_reconnect() {
                spawn_drain(Arc::clone(&engines), "reconnect");
            }
        });

        let engines = Arc::clone(&self.engines);
        let connectivity = Arc::clone(&self.connectivity);
        let period = self.interval;
        let ticker = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                if connectivity.is_online() {
                    drain_all(&engines, "interval").await;
                }
            }
        });

        tracing::info!(
            domains = self.engines.len(),
            interval_secs = period.as_secs(),
            "Sync scheduler started"
        );
        self.running = Some(Running {
            subscription,
            ticker,
        });
    }

    /// Stop background syncing. Safe to call when never started or already stopped.
    pub fn stop(&mut self) {
        if let Some(mut running) = self.running.take() {
            running.subscription.cancel();
            running.ticker.abort();
            tracing::info!("Sync scheduler stopped");
        }
    }

    /// Drain every domain now and wait for the results.
    pub async fn trigger(&self) -> Vec<(Domain, Result<DrainReport>)> {
        drain_all(&self.engines, "manual").await
    }

    /// Unsynced artifact count per domain.
    pub async fn pending_counts(&self) -> Result<Vec<(Domain, usize)>> {
        let mut counts = Vec::with_capacity(self.engines.len());
        for engine in self.engines.iter() {
            counts.push((engine.domain(), engine.pending_count().await?));
        }
        Ok(counts)
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_drain(engines: Engines, cause: &'static str) {
    tokio::spawn(async move {
        drain_all(&engines, cause).await;
    });
}

/// Drain all domains concurrently; each engine keeps its own single-flight guard.
async fn drain_all(
    engines: &Engines,
    cause: &'static str,
) -> Vec<(Domain, Result<DrainReport>)> {
    let handles: Vec<_> = engines
        .iter()
        .map(|engine| {
            let engine = Arc::clone(engine);
            (engine.domain(), tokio::spawn(async move { engine.drain().await }))
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (domain, handle) in handles {
        match handle.await {
            Ok(result) => {
                if let Err(error) = &result {
                    tracing::error!(%domain, cause, "Drain failed: {error}");
                }
                results.push((domain, result));
            }
            Err(error) => {
                tracing::error!(%domain, cause, "Drain task panicked or was cancelled: {error}");
            }
        }
    }
    results
}
