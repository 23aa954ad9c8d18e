//! Generic per-domain drain cycle.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::metadata::SyncMetadata;
use crate::connectivity::ConnectivityMonitor;
use crate::models::{ArtifactId, ArtifactPayload, BinaryBlob, Domain, PendingArtifact};
use crate::queue::PendingQueue;
use crate::store::LocalStore;
use crate::{Error, Result};

/// Reference attached for artifacts that carry no binary content.
pub const NO_BINARY_REFERENCE: &str = "no-binary";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Domain-specific half of the two-phase write.
#[async_trait]
pub trait SyncStrategy<P: ArtifactPayload>: Send + Sync {
    /// Store the binary remotely and return its reference.
    async fn upload(&self, artifact: &PendingArtifact<P>, blob: &BinaryBlob) -> Result<String>;

    /// Submit the domain record with `reference` substituted for the binary.
    async fn attach(&self, artifact: &PendingArtifact<P>, reference: &str) -> Result<()>;
}

/// Why a drain request did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    AlreadyRunning,
    Offline,
}

/// Outcome of one drain request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    pub domain: Domain,
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
    pub skipped: Option<SkipReason>,
}

impl DrainReport {
    const fn new(domain: Domain) -> Self {
        Self {
            domain,
            attempted: 0,
            synced: 0,
            failed: 0,
            skipped: None,
        }
    }

    const fn skipped(domain: Domain, reason: SkipReason) -> Self {
        let mut report = Self::new(domain);
        report.skipped = Some(reason);
        report
    }

    pub const fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

/// Drains one domain's pending queue through a [`SyncStrategy`].
pub struct SyncEngine<P, S> {
    queue: PendingQueue<P>,
    strategy: S,
    connectivity: Arc<dyn ConnectivityMonitor>,
    metadata: SyncMetadata,
    request_timeout: Duration,
    in_flight: AtomicBool,
    failures: Mutex<HashMap<ArtifactId, u32>>,
}

impl<P: ArtifactPayload, S: SyncStrategy<P>> SyncEngine<P, S> {
    pub fn new(store: LocalStore, strategy: S, connectivity: Arc<dyn ConnectivityMonitor>) -> Self {
        Self {
            queue: PendingQueue::new(store.clone()),
            strategy,
            connectivity,
            metadata: SyncMetadata::new(store),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            in_flight: AtomicBool::new(false),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Deadline applied separately to the upload and attach calls.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub const fn queue(&self) -> &PendingQueue<P> {
        &self.queue
    }

    pub fn is_draining(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Failed attempts for an artifact since it last synced or the process started.
    pub fn failure_count(&self, id: ArtifactId) -> u32 {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .copied()
            .unwrap_or(0)
    }

    /// Run one drain cycle.
    ///
    /// Overlapping calls and calls made while offline return a skipped report
    /// without touching any artifact. Artifacts delivered by earlier cycles are
    /// removed before the queue is read. Individual artifact failures are
    /// counted and left pending; only local storage failures abort the cycle.
    pub async fn drain(&self) -> Result<DrainReport> {
        let domain = P::DOMAIN;
        let Some(_guard) = FlightGuard::acquire(&self.in_flight) else {
            tracing::debug!(%domain, "Drain already in flight, skipping");
            return Ok(DrainReport::skipped(domain, SkipReason::AlreadyRunning));
        };

        if !self.connectivity.is_online() {
            tracing::debug!(%domain, "Offline, skipping drain");
            return Ok(DrainReport::skipped(domain, SkipReason::Offline));
        }

        self.queue.purge_synced().await?;
        let pending = self.queue.list_unsynced().await?;
        let mut report = DrainReport::new(domain);

        for artifact in pending {
            report.attempted += 1;
            match self.sync_artifact(&artifact).await {
                Ok(reference) => {
                    report.synced += 1;
                    self.clear_failures(artifact.id);
                    tracing::info!(
                        %domain,
                        artifact_id = %artifact.id,
                        subject_id = %artifact.subject_id,
                        reference = %reference,
                        "Artifact synced"
                    );
                }
                Err(error @ Error::StorageUnavailable(_)) => return Err(error),
                Err(error) => {
                    report.failed += 1;
                    let failures = self.record_failure(artifact.id);
                    tracing::warn!(
                        %domain,
                        artifact_id = %artifact.id,
                        subject_id = %artifact.subject_id,
                        failures,
                        "Artifact sync failed: {error}"
                    );
                }
            }
        }

        self.metadata.record(&report).await?;
        if report.attempted > 0 {
            tracing::info!(
                %domain,
                attempted = report.attempted,
                synced = report.synced,
                failed = report.failed,
                "Drain finished"
            );
        }
        Ok(report)
    }

    async fn sync_artifact(&self, artifact: &PendingArtifact<P>) -> Result<String> {
        let reference = match (&artifact.upload_reference, artifact.payload.binary()) {
            (Some(reference), _) => {
                tracing::debug!(
                    artifact_id = %artifact.id,
                    "Reusing reference from earlier upload"
                );
                reference.clone()
            }
            (None, Some(blob)) => {
                let reference = self
                    .with_timeout("upload", artifact.id, self.strategy.upload(artifact, blob))
                    .await?;
                self.queue.record_upload(artifact.id, &reference).await?;
                reference
            }
            (None, None) => NO_BINARY_REFERENCE.to_string(),
        };

        self.with_timeout(
            "attach",
            artifact.id,
            self.strategy.attach(artifact, &reference),
        )
        .await?;
        self.queue.mark_synced(artifact.id, &reference).await?;
        Ok(reference)
    }

    async fn with_timeout<T>(
        &self,
        phase: &str,
        id: ArtifactId,
        call: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        tokio::time::timeout(self.request_timeout, call)
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "{} {phase} of artifact {id} after {:?}",
                    P::DOMAIN,
                    self.request_timeout
                ))
            })?
    }

    fn record_failure(&self, id: ArtifactId) -> u32 {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let count = failures.entry(id).or_insert(0);
        *count += 1;
        *count
    }

    fn clear_failures(&self, id: ArtifactId) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

/// Object-safe view of an engine, used by the scheduler.
#[async_trait]
pub trait DomainSync: Send + Sync {
    fn domain(&self) -> Domain;

    async fn drain(&self) -> Result<DrainReport>;

    async fn pending_count(&self) -> Result<usize>;
}

#[async_trait]
impl<P, S> DomainSync for SyncEngine<P, S>
where
    P: ArtifactPayload,
    S: SyncStrategy<P>,
{
    fn domain(&self) -> Domain {
        P::DOMAIN
    }

    async fn drain(&self) -> Result<DrainReport> {
        Self::drain(self).await
    }

    async fn pending_count(&self) -> Result<usize> {
        self.queue.pending_count().await
    }
}

/// Holds the single-flight flag; releases it when dropped.
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
