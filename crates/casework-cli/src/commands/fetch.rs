use std::path::Path;
use std::time::Duration;

use casework_core::{DataSource, FreshnessCache, ReadOptions, ReadPolicy};

use crate::commands::common::{format_age, open_store, Remote};
use crate::error::CliError;

pub async fn run_fetch(
    resource: &str,
    id: Option<&str>,
    max_age_minutes: u64,
    cache_first: bool,
    offline: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let resource = resource.trim().trim_matches('/');
    if resource.is_empty() {
        return Err(CliError::InvalidArgument(
            "Resource cannot be empty".to_string(),
        ));
    }

    let remote = Remote::from_env()?;
    let cache = FreshnessCache::new(open_store(db_path).await?);
    let online = !offline && remote.probe.check().await;
    let key = cache_key(resource, id);
    let options = ReadOptions {
        policy: if cache_first {
            ReadPolicy::CacheFirst
        } else {
            ReadPolicy::NetworkFirst
        },
        max_age: Duration::from_secs(max_age_minutes.saturating_mul(60)),
        meta: Some(serde_json::json!({ "resource": resource, "id": id })),
    };

    let api = &remote.api;
    let read = cache
        .read_through(&key, options, online, || api.get_json(resource, id))
        .await?;

    eprintln!("{key}: {}", describe_source(read.source));
    println!("{}", serde_json::to_string_pretty(&read.data)?);
    Ok(())
}

pub fn cache_key(resource: &str, id: Option<&str>) -> String {
    match id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => format!("{resource}/{id}"),
        None => resource.to_string(),
    }
}

pub fn describe_source(source: DataSource) -> String {
    match source {
        DataSource::Live => "live".to_string(),
        DataSource::Cache { age_seconds, stale } => {
            let freshness = if stale { "stale" } else { "fresh" };
            format!("cached {} ago ({freshness})", format_age(age_seconds))
        }
    }
}
