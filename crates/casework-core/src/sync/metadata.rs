//! Last-sync bookkeeping kept in the metadata partition.

use serde::{Deserialize, Serialize};

use super::engine::DrainReport;
use crate::models::Domain;
use crate::store::{LocalStore, Partition};
use crate::util::unix_millis_now;
use crate::Result;

/// Summary of a domain's most recent completed drain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastSync {
    /// Completion timestamp (Unix ms).
    pub finished_at: i64,
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct SyncMetadata {
    store: LocalStore,
}

impl SyncMetadata {
    pub const fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Persist the outcome of a completed cycle. Skipped cycles are not recorded.
    pub async fn record(&self, report: &DrainReport) -> Result<()> {
        if report.is_skipped() {
            return Ok(());
        }

        let entry = LastSync {
            finished_at: unix_millis_now(),
            attempted: report.attempted,
            synced: report.synced,
            failed: report.failed,
        };
        self.store
            .put(Partition::Metadata, Some(&last_sync_key(report.domain)), &entry)
            .await?;
        Ok(())
    }

    pub async fn last_sync(&self, domain: Domain) -> Result<Option<LastSync>> {
        self.store
            .get(Partition::Metadata, &last_sync_key(domain))
            .await?
            .map(|record| record.decode())
            .transpose()
    }
}

fn last_sync_key(domain: Domain) -> String {
    format!("lastSync:{domain}")
}
