//! Time-based cache of remote reads.
//!
//! Entries are never evicted by age; freshness only decides whether a caller
//! should prefer the network. When offline, any entry is better than none.

use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{LocalStore, Partition};
use crate::util::unix_millis_now;
use crate::{Error, Result};

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(5 * 60);

/// Source of the current time, in Unix milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        unix_millis_now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start_millis)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let millis = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
    data: Value,
    #[serde(default)]
    meta: Option<Value>,
    /// Write time (Unix ms).
    timestamp: i64,
}

/// A cached value with its age at read time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedEntry {
    pub data: Value,
    pub meta: Option<Value>,
    pub age_seconds: u64,
}

/// How `read_through` chooses between network and cache while online.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadPolicy {
    /// Always fetch; fall back to the cache when the fetch fails.
    #[default]
    NetworkFirst,
    /// Serve a fresh entry without fetching; otherwise behave like `NetworkFirst`.
    CacheFirst,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadOptions {
    pub policy: ReadPolicy,
    pub max_age: Duration,
    /// Stored alongside freshly fetched data.
    pub meta: Option<Value>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            policy: ReadPolicy::default(),
            max_age: DEFAULT_MAX_AGE,
            meta: None,
        }
    }
}

/// Where a read-through result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum DataSource {
    Live,
    #[serde(rename_all = "camelCase")]
    Cache { age_seconds: u64, stale: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheRead {
    pub data: Value,
    pub meta: Option<Value>,
    pub source: DataSource,
}

#[derive(Clone)]
pub struct FreshnessCache {
    store: LocalStore,
    clock: Arc<dyn Clock>,
}

impl FreshnessCache {
    pub fn new(store: LocalStore) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: LocalStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn read(&self, key: &str) -> Result<Option<CachedEntry>> {
        let Some(entry) = self.load(key).await? else {
            return Ok(None);
        };
        let age_seconds = self.age(&entry).as_secs();
        Ok(Some(CachedEntry {
            data: entry.data,
            meta: entry.meta,
            age_seconds,
        }))
    }

    /// Store `data` under `key`, stamped with the current time.
    pub async fn write(&self, key: &str, data: Value, meta: Option<Value>) -> Result<()> {
        let entry = StoredEntry {
            data,
            meta,
            timestamp: self.clock.now_millis(),
        };
        self.store
            .put(Partition::Cache, Some(key), &entry)
            .await?;
        Ok(())
    }

    /// Whether an entry exists and is younger than `max_age`.
    pub async fn is_fresh(&self, key: &str, max_age: Duration) -> Result<bool> {
        Ok(self
            .load(key)
            .await?
            .is_some_and(|entry| self.age(&entry) < max_age))
    }

    /// Remove one entry, or every entry when `key` is `None`. Returns how many went.
    pub async fn clear(&self, key: Option<&str>) -> Result<u64> {
        match key {
            Some(key) => Ok(u64::from(self.store.delete(Partition::Cache, key).await?)),
            None => self.store.clear(Partition::Cache).await,
        }
    }

    /// Read `key` following the online/offline read policy.
    ///
    /// Online: fetch (unless `CacheFirst` finds a fresh entry), refresh the
    /// cache on success, and fall back to any cached entry on failure.
    /// Offline: serve the cached entry regardless of age.
    pub async fn read_through<F, Fut>(
        &self,
        key: &str,
        options: ReadOptions,
        online: bool,
        fetch: F,
    ) -> Result<CacheRead>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Value>> + Send,
    {
        let cached = self.load(key).await?;

        if !online {
            return cached
                .map(|entry| self.cached_read(entry, options.max_age))
                .ok_or_else(|| Error::Offline(key.to_string()));
        }

        if options.policy == ReadPolicy::CacheFirst {
            if let Some(entry) = cached.as_ref().filter(|entry| self.age(entry) < options.max_age) {
                tracing::debug!(key, "Serving fresh cache entry");
                return Ok(self.cached_read(entry.clone(), options.max_age));
            }
        }

        match fetch().await {
            Ok(data) => {
                if let Err(error) = self.write(key, data.clone(), options.meta.clone()).await {
                    tracing::warn!(key, "Failed to refresh cache entry: {error}");
                }
                Ok(CacheRead {
                    data,
                    meta: options.meta,
                    source: DataSource::Live,
                })
            }
            Err(error) => match cached {
                Some(entry) => {
                    tracing::warn!(key, "Fetch failed, serving cached entry: {error}");
                    Ok(self.cached_read(entry, options.max_age))
                }
                None => Err(error),
            },
        }
    }

    async fn load(&self, key: &str) -> Result<Option<StoredEntry>> {
        self.store
            .get(Partition::Cache, key)
            .await?
            .map(|record| record.decode())
            .transpose()
    }

    fn age(&self, entry: &StoredEntry) -> Duration {
        let elapsed = self.clock.now_millis().saturating_sub(entry.timestamp);
        Duration::from_millis(u64::try_from(elapsed).unwrap_or(0))
    }

    fn cached_read(&self, entry: StoredEntry, max_age: Duration) -> CacheRead {
        let age = self.age(&entry);
        CacheRead {
            data: entry.data,
            meta: entry.meta,
            source: DataSource::Cache {
                age_seconds: age.as_secs(),
                stale: age >= max_age,
            },
        }
    }
}
