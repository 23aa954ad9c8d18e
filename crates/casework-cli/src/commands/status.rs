use std::path::Path;

use casework_core::state::SyncState;
use casework_core::sync::{LastSync, SyncMetadata};
use casework_core::Domain;
use chrono::Utc;
use serde::Serialize;

use crate::commands::common::{format_relative_time, list_domain_items, open_store, Remote};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct DomainStatus {
    pub domain: Domain,
    pub state: SyncState,
    pub pending: usize,
    pub last_sync: Option<LastSync>,
}

pub async fn run_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let online = match Remote::from_env() {
        Ok(remote) => remote.probe.check().await,
        Err(error) => {
            tracing::warn!("Remote not configured, reporting offline: {error}");
            false
        }
    };

    let metadata = SyncMetadata::new(store.clone());
    let mut statuses = Vec::with_capacity(Domain::ALL.len());
    for domain in Domain::ALL {
        let pending = list_domain_items(&store, domain, None, false).await?.len();
        let last_sync = metadata.last_sync(domain).await?;
        let last_failed = last_sync.as_ref().map_or(0, |last| last.failed);
        statuses.push(DomainStatus {
            domain,
            state: SyncState::summarize(online, false, pending, last_failed),
            pending,
            last_sync,
        });
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    println!("Network: {}", if online { "online" } else { "offline" });
    for line in format_status_lines(&statuses, Utc::now().timestamp_millis()) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_status_lines(statuses: &[DomainStatus], now_ms: i64) -> Vec<String> {
    statuses
        .iter()
        .map(|status| {
            let last = status.last_sync.as_ref().map_or_else(
                || "never synced".to_string(),
                |last| {
                    format!(
                        "last sync {} ({} synced, {} failed)",
                        format_relative_time(last.finished_at, now_ms),
                        last.synced,
                        last.failed
                    )
                },
            );
            format!(
                "{:<16}  {:<8}  {:>3} pending  {last}",
                status.domain.as_str(),
                status.state.label(),
                status.pending
            )
        })
        .collect()
}
