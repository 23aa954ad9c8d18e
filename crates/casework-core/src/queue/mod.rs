//! Durable per-domain queues of artifacts awaiting sync.
//!
//! Enqueueing only writes to the local store; it never touches the network,
//! so capturing a contract or photo works the same online and offline.

use std::marker::PhantomData;

use crate::models::{ArtifactId, ArtifactPayload, ArtifactRecord, Domain, PendingArtifact};
use crate::store::{LocalStore, StoredRecord};
use crate::util::unix_millis_now;
use crate::{Error, Result};

/// Queue of pending artifacts for one domain.
pub struct PendingQueue<P> {
    store: LocalStore,
    _payload: PhantomData<fn() -> P>,
}

impl<P> Clone for PendingQueue<P> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _payload: PhantomData,
        }
    }
}

impl<P: ArtifactPayload> PendingQueue<P> {
    pub const fn new(store: LocalStore) -> Self {
        Self {
            store,
            _payload: PhantomData,
        }
    }

    pub const fn domain(&self) -> Domain {
        P::DOMAIN
    }

    /// Durably queue a new artifact and return its local id.
    pub async fn enqueue(&self, subject_id: &str, payload: P) -> Result<ArtifactId> {
        let subject_id = subject_id.trim();
        if subject_id.is_empty() {
            return Err(Error::InvalidInput(
                "Artifact subject_id cannot be empty".to_string(),
            ));
        }

        let record = ArtifactRecord::new(subject_id.to_string(), payload);
        let key = self.store.put(P::DOMAIN.partition(), None, &record).await?;
        let id = parse_id(&key)?;

        tracing::info!(
            domain = %P::DOMAIN,
            artifact_id = %id,
            subject_id,
            "Queued artifact"
        );
        Ok(id)
    }

    pub async fn get(&self, id: ArtifactId) -> Result<Option<PendingArtifact<P>>> {
        self.store
            .get(P::DOMAIN.partition(), &id.to_string())
            .await?
            .map(|record| decode(&record))
            .transpose()
    }

    /// Every artifact of this domain, oldest first.
    ///
    /// Rows that no longer decode as this domain's payload are logged and
    /// left out, so they cannot hold back the rest of the queue.
    pub async fn list_all(&self) -> Result<Vec<PendingArtifact<P>>> {
        let records = self.store.get_all(P::DOMAIN.partition()).await?;
        let mut artifacts = Vec::with_capacity(records.len());
        for record in &records {
            match decode::<P>(record) {
                Ok(artifact) => artifacts.push(artifact),
                Err(error) => tracing::warn!(
                    domain = %P::DOMAIN,
                    key = %record.key,
                    "Skipping unreadable artifact: {error}"
                ),
            }
        }
        Ok(artifacts)
    }

    /// Artifacts still waiting for sync, oldest first.
    pub async fn list_unsynced(&self) -> Result<Vec<PendingArtifact<P>>> {
        let mut artifacts = self.list_all().await?;
        artifacts.retain(|artifact| !artifact.synced);
        Ok(artifacts)
    }

    /// Artifacts belonging to one subject, newest first.
    pub async fn list_for_subject(&self, subject_id: &str) -> Result<Vec<PendingArtifact<P>>> {
        let subject_id = subject_id.trim();
        let mut artifacts = self.list_all().await?;
        artifacts.retain(|artifact| artifact.subject_id == subject_id);
        artifacts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(artifacts)
    }

    pub async fn pending_count(&self) -> Result<usize> {
        Ok(self.list_unsynced().await?.len())
    }

    /// Remember the remote reference of a completed upload so a retry can skip it.
    pub async fn record_upload(&self, id: ArtifactId, reference: &str) -> Result<()> {
        let mut record = self.load_record(id).await?;
        if record.synced || record.upload_reference.is_some() {
            return Ok(());
        }

        record.upload_reference = Some(reference.to_string());
        self.save_record(id, &record).await
    }

    /// Flip an artifact to synced. The first sync's timestamp and reference win.
    pub async fn mark_synced(&self, id: ArtifactId, remote_reference: &str) -> Result<()> {
        let mut record = self.load_record(id).await?;
        if record.synced {
            tracing::debug!(domain = %P::DOMAIN, artifact_id = %id, "Artifact already synced");
            return Ok(());
        }

        record.synced = true;
        record.synced_at = Some(unix_millis_now());
        record.remote_reference = Some(remote_reference.to_string());
        self.save_record(id, &record).await
    }

    /// Remove an artifact. Returns whether it existed.
    pub async fn delete(&self, id: ArtifactId) -> Result<bool> {
        let removed = self
            .store
            .delete(P::DOMAIN.partition(), &id.to_string())
            .await?;
        if removed {
            tracing::info!(domain = %P::DOMAIN, artifact_id = %id, "Deleted artifact");
        }
        Ok(removed)
    }

    /// Remove every artifact that has already been synced.
    pub async fn purge_synced(&self) -> Result<usize> {
        let partition = P::DOMAIN.partition();
        let mut purged = 0;
        for record in self.store.get_all(partition).await? {
            let synced = record.value.get("synced").and_then(serde_json::Value::as_bool);
            if synced == Some(true) && self.store.delete(partition, &record.key).await? {
                purged += 1;
            }
        }
        if purged > 0 {
            tracing::debug!(domain = %P::DOMAIN, purged, "Purged synced artifacts");
        }
        Ok(purged)
    }

    async fn load_record(&self, id: ArtifactId) -> Result<ArtifactRecord<P>> {
        self.store
            .get(P::DOMAIN.partition(), &id.to_string())
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} artifact {id}", P::DOMAIN)))?
            .decode()
    }

    /// Overwrite an existing artifact. A concurrent cancel wins: the row is not re-created.
    async fn save_record(&self, id: ArtifactId, record: &ArtifactRecord<P>) -> Result<()> {
        self.store
            .update(P::DOMAIN.partition(), &id.to_string(), record)
            .await
            .map_err(|error| match error {
                Error::NotFound(_) => Error::NotFound(format!("{} artifact {id}", P::DOMAIN)),
                other => other,
            })
    }
}

fn parse_id(key: &str) -> Result<ArtifactId> {
    key.parse()
        .map_err(|_| Error::InvalidInput(format!("Invalid artifact key: {key}")))
}

fn decode<P: ArtifactPayload>(record: &StoredRecord) -> Result<PendingArtifact<P>> {
    let id = parse_id(&record.key)?;
    Ok(record.decode::<ArtifactRecord<P>>()?.into_artifact(id))
}
