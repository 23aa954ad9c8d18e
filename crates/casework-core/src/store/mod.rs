//! Durable, partitioned key-value store shared by the queues, cache, and sync metadata.
//!
//! Every operation runs as a single transaction against the local libSQL file,
//! so a failed write never leaves a partially visible record behind.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use libsql::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::db::Database;
use crate::util::unix_millis_now;
use crate::Result;

/// Named partition inside the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    PendingContracts,
    PendingVictimPhotos,
    PendingVictimDocs,
    PendingSurveyAnswers,
    Cache,
    Metadata,
}

impl Partition {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingContracts => "pendingContracts",
            Self::PendingVictimPhotos => "pendingVictimPhotos",
            Self::PendingVictimDocs => "pendingVictimDocs",
            Self::PendingSurveyAnswers => "pendingSurveyAnswers",
            Self::Cache => "cache",
            Self::Metadata => "metadata",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A record as persisted in a partition.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// Record key, unique within the partition
    pub key: String,
    /// Insertion sequence within the partition (monotonic, never reused)
    pub seq: i64,
    /// JSON document
    pub value: serde_json::Value,
    /// Last write timestamp (Unix ms)
    pub updated_at: i64,
}

impl StoredRecord {
    /// Decode the stored JSON document into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.value.clone())?)
    }
}

/// Thread-safe handle to the local store.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl fmt::Debug for LocalStore {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("LocalStore")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl LocalStore {
    /// Open the store at the given filesystem path, creating parent directories.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Filesystem path of the store, if any.
    pub fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    /// Insert or replace a record.
    ///
    /// When `key` is `None` the next sequence number of the partition is used
    /// as the key. Replacing an existing key keeps its original insertion order.
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        partition: Partition,
        key: Option<&str>,
        value: &T,
    ) -> Result<String> {
        let json = serde_json::to_string(value)?;
        let db = self.db.lock().await;
        let conn = db.connection();

        conn.execute("BEGIN IMMEDIATE", ()).await?;
        match put_in_transaction(conn, partition, key, &json).await {
            Ok(key) => {
                if let Err(e) = conn.execute("COMMIT", ()).await {
                    conn.execute("ROLLBACK", ()).await.ok();
                    return Err(e.into());
                }
                Ok(key)
            }
            Err(e) => {
                conn.execute("ROLLBACK", ()).await.ok();
                Err(e)
            }
        }
    }

    /// Replace the value of an existing record.
    ///
    /// Unlike [`put`](Self::put) this never inserts: a key that is gone
    /// (deleted or cleared meanwhile) yields [`Error::NotFound`](crate::Error::NotFound).
    pub async fn update<T: Serialize + ?Sized>(
        &self,
        partition: Partition,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let db = self.db.lock().await;
        let updated = db
            .connection()
            .execute(
                "UPDATE records SET value = ?, updated_at = ? WHERE partition = ? AND key = ?",
                libsql::params![json, unix_millis_now(), partition.as_str(), key],
            )
            .await?;

        if updated == 0 {
            return Err(crate::Error::NotFound(format!(
                "record {key} in partition {partition}"
            )));
        }
        Ok(())
    }

    /// Fetch one record by key.
    pub async fn get(&self, partition: Partition, key: &str) -> Result<Option<StoredRecord>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                "SELECT key, seq, value, updated_at FROM records WHERE partition = ? AND key = ?",
                [partition.as_str(), key],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(parse_record(&row)?)),
            None => Ok(None),
        }
    }

    /// Fetch every record of a partition in insertion order.
    pub async fn get_all(&self, partition: Partition) -> Result<Vec<StoredRecord>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                "SELECT key, seq, value, updated_at FROM records
                 WHERE partition = ?
                 ORDER BY seq ASC",
                [partition.as_str()],
            )
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(parse_record(&row)?);
        }
        Ok(records)
    }

    /// Delete one record. Returns whether a record was removed.
    pub async fn delete(&self, partition: Partition, key: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let removed = db
            .connection()
            .execute(
                "DELETE FROM records WHERE partition = ? AND key = ?",
                [partition.as_str(), key],
            )
            .await?;
        Ok(removed > 0)
    }

    /// Delete every record of a partition. Sequence numbers are not reset.
    pub async fn clear(&self, partition: Partition) -> Result<u64> {
        let db = self.db.lock().await;
        let removed = db
            .connection()
            .execute(
                "DELETE FROM records WHERE partition = ?",
                [partition.as_str()],
            )
            .await?;
        Ok(removed)
    }

    /// Number of records in a partition.
    pub async fn count(&self, partition: Partition) -> Result<usize> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                "SELECT COUNT(*) FROM records WHERE partition = ?",
                [partition.as_str()],
            )
            .await?;

        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or_default())
    }

    #[cfg(test)]
    pub(crate) async fn execute_raw(&self, sql: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.connection().execute(sql, ()).await?;
        Ok(())
    }
}

async fn put_in_transaction(
    conn: &Connection,
    partition: Partition,
    key: Option<&str>,
    json: &str,
) -> Result<String> {
    let (key, seq) = match key {
        Some(key) => match existing_seq(conn, partition, key).await? {
            Some(seq) => (key.to_owned(), seq),
            None => (key.to_owned(), next_seq(conn, partition).await?),
        },
        None => {
            let seq = next_seq(conn, partition).await?;
            (seq.to_string(), seq)
        }
    };

    conn.execute(
        "INSERT INTO records (partition, key, seq, value, updated_at)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(partition, key) DO UPDATE SET
             value = excluded.value,
             updated_at = excluded.updated_at",
        libsql::params![partition.as_str(), key.as_str(), seq, json, unix_millis_now()],
    )
    .await?;

    Ok(key)
}

async fn existing_seq(conn: &Connection, partition: Partition, key: &str) -> Result<Option<i64>> {
    let mut rows = conn
        .query(
            "SELECT seq FROM records WHERE partition = ? AND key = ?",
            [partition.as_str(), key],
        )
        .await?;

    match rows.next().await? {
        Some(row) => Ok(Some(row.get::<i64>(0)?)),
        None => Ok(None),
    }
}

async fn next_seq(conn: &Connection, partition: Partition) -> Result<i64> {
    conn.execute(
        "INSERT INTO partition_sequences (partition, last_seq) VALUES (?, 1)
         ON CONFLICT(partition) DO UPDATE SET last_seq = last_seq + 1",
        [partition.as_str()],
    )
    .await?;

    let mut rows = conn
        .query(
            "SELECT last_seq FROM partition_sequences WHERE partition = ?",
            [partition.as_str()],
        )
        .await?;

    match rows.next().await? {
        Some(row) => Ok(row.get::<i64>(0)?),
        None => Err(crate::Error::NotFound(format!(
            "sequence for partition {partition}"
        ))),
    }
}

fn parse_record(row: &libsql::Row) -> Result<StoredRecord> {
    let value: String = row.get(2)?;
    Ok(StoredRecord {
        key: row.get(0)?,
        seq: row.get(1)?,
        value: serde_json::from_str(&value)?,
        updated_at: row.get(3)?,
    })
}
