//! casework-core - Offline-first sync engine for case management
//!
//! Artifacts captured in the field (contracts, victim photos and documents,
//! survey answers) are queued in a local libSQL store and delivered to the
//! case-management API whenever connectivity allows. Remote reads go through
//! a freshness cache so screens keep working offline.

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod queue;
pub mod remote;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;

pub use cache::{CacheRead, DataSource, FreshnessCache, ReadOptions, ReadPolicy};
pub use config::EngineConfig;
pub use connectivity::{ConnectivityMonitor, NetworkStatus, SignalConnectivity};
pub use error::{Error, Result};
pub use models::{ArtifactId, Domain, PendingArtifact};
pub use queue::PendingQueue;
pub use remote::ApiClient;
pub use store::LocalStore;
pub use sync::{DrainReport, SyncEngine, SyncScheduler};
