use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use casework_core::connectivity::ConnectivityMonitor;
use casework_core::models::{
    ArtifactPayload, BinaryBlob, ContractPayload, SurveyAnswerPayload, VictimDocumentPayload,
    VictimPhotoPayload,
};
use casework_core::sync::api_engines;
use casework_core::{
    ApiClient, Domain, EngineConfig, LocalStore, PendingArtifact, PendingQueue, SignalConnectivity,
    SyncScheduler,
};
use chrono::Utc;
use serde::Serialize;

use crate::error::CliError;
use crate::reachability::ReachabilityProbe;

const DB_PATH_ENV: &str = "CASEWORK_DB_PATH";

#[derive(Debug, Serialize)]
pub struct ArtifactListItem {
    pub domain: Domain,
    pub id: i64,
    pub victim_id: String,
    pub summary: String,
    pub created_at: i64,
    pub relative_time: String,
    pub synced: bool,
    pub synced_at: Option<String>,
    pub remote_reference: Option<String>,
}

/// One-line description of a payload for listings.
pub trait Summarize {
    fn summary(&self) -> String;
}

impl Summarize for ContractPayload {
    fn summary(&self) -> String {
        let total: i64 = self.tranche_schedule.iter().map(|t| t.amount_cents).sum();
        let signed = if self.signature.is_some() {
            "signed"
        } else {
            "unsigned"
        };
        format!(
            "{} tranche(s), {} total, {signed}",
            self.tranche_schedule.len(),
            format_cents(total)
        )
    }
}

impl Summarize for VictimPhotoPayload {
    fn summary(&self) -> String {
        describe_blob(&self.photo)
    }
}

impl Summarize for VictimDocumentPayload {
    fn summary(&self) -> String {
        format!("{}: {}", self.label, describe_blob(&self.file))
    }
}

impl Summarize for SurveyAnswerPayload {
    fn summary(&self) -> String {
        let answered = self.answers.as_object().map_or(0, serde_json::Map::len);
        format!("questionnaire {} ({answered} answer(s))", self.questionnaire_id)
    }
}

pub fn artifact_to_item<P: ArtifactPayload + Summarize>(
    artifact: &PendingArtifact<P>,
    now_ms: i64,
) -> ArtifactListItem {
    ArtifactListItem {
        domain: P::DOMAIN,
        id: artifact.id.get(),
        victim_id: artifact.subject_id.clone(),
        summary: artifact.payload.summary(),
        created_at: artifact.created_at,
        relative_time: format_relative_time(artifact.created_at, now_ms),
        synced: artifact.synced,
        synced_at: artifact.synced_at.map(format_sync_timestamp),
        remote_reference: artifact.remote_reference.clone(),
    }
}

/// Queued artifacts of one domain, oldest first (newest first for one victim).
pub async fn list_domain_items(
    store: &LocalStore,
    domain: Domain,
    victim: Option<&str>,
    include_synced: bool,
) -> Result<Vec<ArtifactListItem>, CliError> {
    match domain {
        Domain::Contracts => {
            list_items::<ContractPayload>(store, victim, include_synced).await
        }
        Domain::VictimPhotos => {
            list_items::<VictimPhotoPayload>(store, victim, include_synced).await
        }
        Domain::VictimDocuments => {
            list_items::<VictimDocumentPayload>(store, victim, include_synced).await
        }
        Domain::SurveyAnswers => {
            list_items::<SurveyAnswerPayload>(store, victim, include_synced).await
        }
    }
}

async fn list_items<P: ArtifactPayload + Summarize>(
    store: &LocalStore,
    victim: Option<&str>,
    include_synced: bool,
) -> Result<Vec<ArtifactListItem>, CliError> {
    let queue = PendingQueue::<P>::new(store.clone());
    let artifacts = match victim {
        Some(victim) => queue.list_for_subject(victim).await?,
        None => queue.list_all().await?,
    };

    let now_ms = Utc::now().timestamp_millis();
    Ok(artifacts
        .iter()
        .filter(|artifact| include_synced || !artifact.synced)
        .map(|artifact| artifact_to_item(artifact, now_ms))
        .collect())
}

pub fn format_item_lines(items: &[ArtifactListItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            let state = if item.synced { "synced" } else { "pending" };
            format!(
                "{:<16}  {:>5}  {:<12}  {:<7}  {:<10}  {}",
                item.domain.as_str(),
                item.id,
                item.victim_id,
                state,
                item.relative_time,
                item.summary
            )
        })
        .collect()
}

/// Read a file from disk into a blob, guessing its MIME type from the extension.
pub fn read_blob(path: &Path) -> Result<BinaryBlob, CliError> {
    let bytes = std::fs::read(path)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| CliError::InvalidArgument(format!("Not a file: {}", path.display())))?;
    let mime_type = mime_guess::from_path(path).first_or_octet_stream();
    Ok(BinaryBlob::new(file_name, mime_type.essence_str(), bytes)?)
}

fn describe_blob(blob: &BinaryBlob) -> String {
    format!("{} ({}, {})", blob.file_name, blob.mime_type, format_size(blob.size_bytes()))
}

pub fn format_size(bytes: usize) -> String {
    const KIB: usize = 1024;
    const MIB: usize = 1024 * KIB;
    if bytes < KIB {
        format!("{bytes} B")
    } else if bytes < MIB {
        format!("{} KiB", bytes / KIB)
    } else {
        format!("{} MiB", bytes / MIB)
    }
}

pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{sign}{}.{:02}", cents / 100, cents % 100)
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}

pub fn format_age(age_seconds: u64) -> String {
    if age_seconds < 60 {
        format!("{age_seconds}s")
    } else if age_seconds < 3600 {
        format!("{}m", age_seconds / 60)
    } else {
        format!("{}h", age_seconds / 3600)
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os(DB_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("casework")
        .join("casework.db")
}

pub async fn open_store(path: &Path) -> Result<LocalStore, CliError> {
    Ok(LocalStore::open_path(path.to_path_buf()).await?)
}

/// Everything needed to talk to the remote API.
pub struct Remote {
    pub config: EngineConfig,
    pub api: ApiClient,
    pub probe: ReachabilityProbe,
}

impl Remote {
    pub fn from_env() -> Result<Self, CliError> {
        let config = EngineConfig::from_env()?;
        let api = ApiClient::new(&config)?;
        let probe = ReachabilityProbe::from_base_url(&config.api_base_url)?;
        Ok(Self { config, api, probe })
    }

    /// Connectivity seeded from one reachability check, or forced offline.
    pub async fn connectivity(&self, force_offline: bool) -> Arc<SignalConnectivity> {
        let monitor = Arc::new(SignalConnectivity::offline());
        if !force_offline {
            monitor.set_online(self.probe.check().await);
        }
        monitor
    }

    pub fn scheduler(&self, store: &LocalStore, connectivity: Arc<SignalConnectivity>) -> SyncScheduler {
        let connectivity: Arc<dyn ConnectivityMonitor> = connectivity;
        let engines = api_engines(store, &self.api, &connectivity, self.config.request_timeout);
        SyncScheduler::new(engines, connectivity).with_interval(self.config.sync_interval)
    }
}
