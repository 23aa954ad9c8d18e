use std::path::Path;
use std::time::Duration;

use casework_core::sync::{DrainReport, SkipReason};
use casework_core::{Domain, Result as CoreResult};

use crate::commands::common::{open_store, Remote};
use crate::error::CliError;

pub async fn run_sync(offline: bool, db_path: &Path) -> Result<(), CliError> {
    let remote = Remote::from_env()?;
    let store = open_store(db_path).await?;
    let connectivity = remote.connectivity(offline).await;
    let scheduler = remote.scheduler(&store, connectivity);

    let results = scheduler.trigger().await;
    for line in format_drain_lines(&results) {
        println!("{line}");
    }

    let failed = results.iter().filter(|(_, result)| result.is_err()).count();
    if failed > 0 {
        return Err(CliError::SyncFailed(failed));
    }
    Ok(())
}

pub async fn run_watch(interval_secs: Option<u64>, db_path: &Path) -> Result<(), CliError> {
    let mut remote = Remote::from_env()?;
    if let Some(secs) = interval_secs {
        if secs == 0 {
            return Err(CliError::InvalidArgument(
                "Interval must be at least one second".to_string(),
            ));
        }
        remote.config.sync_interval = Duration::from_secs(secs);
    }

    let store = open_store(db_path).await?;
    let connectivity = remote.connectivity(false).await;
    let probe = remote
        .probe
        .clone()
        .spawn(connectivity.clone(), remote.config.sync_interval.min(Duration::from_secs(10)));
    let mut scheduler = remote.scheduler(&store, connectivity);

    scheduler.start();
    println!(
        "Watching {} (interval {}s); press Ctrl-C to stop",
        remote.api.base_url(),
        remote.config.sync_interval.as_secs()
    );

    tokio::signal::ctrl_c().await?;
    scheduler.stop();
    probe.abort();

    for (domain, pending) in scheduler.pending_counts().await? {
        println!("{domain:<16}  {pending} pending");
    }
    Ok(())
}

pub fn format_drain_lines(results: &[(Domain, CoreResult<DrainReport>)]) -> Vec<String> {
    results
        .iter()
        .map(|(domain, result)| match result {
            Ok(report) => format!("{domain:<16}  {}", describe_report(report)),
            Err(error) => format!("{domain:<16}  error: {error}"),
        })
        .collect()
}

fn describe_report(report: &DrainReport) -> String {
    match report.skipped {
        Some(SkipReason::Offline) => "skipped (offline)".to_string(),
        Some(SkipReason::AlreadyRunning) => "skipped (already running)".to_string(),
        None if report.attempted == 0 => "nothing to sync".to_string(),
        None => format!(
            "attempted={} synced={} failed={}",
            report.attempted, report.synced, report.failed
        ),
    }
}
