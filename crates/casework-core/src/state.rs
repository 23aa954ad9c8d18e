//! Per-domain sync status shown to users.

use serde::Serialize;

/// Coarse sync state of one domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncState {
    Offline,
    Syncing,
    /// Items queued, last attempt had no failures.
    Pending,
    Synced,
    Error,
}

impl SyncState {
    /// Derive the state from what is observable without a network call.
    pub const fn summarize(online: bool, draining: bool, pending: usize, last_failed: usize) -> Self {
        if draining {
            Self::Syncing
        } else if !online {
            Self::Offline
        } else if pending == 0 {
            Self::Synced
        } else if last_failed > 0 {
            Self::Error
        } else {
            Self::Pending
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}
