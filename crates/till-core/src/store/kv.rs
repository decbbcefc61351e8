//! Namespaced key-value store

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{Database, LOCAL_STORE_MIGRATIONS};
use crate::error::{Error, Result};

/// Independent key spaces of the local store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Products keyed by barcode
    Products,
    /// Sales keyed by sale id
    Sales,
    /// Pending writes keyed by enqueue key
    Queue,
}

impl Namespace {
    pub const ALL: [Self; 3] = [Self::Products, Self::Sales, Self::Queue];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Sales => "sales",
            Self::Queue => "queue",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable key-value persistence.
///
/// Iteration (`keys`, `entries`) returns an owned snapshot in ascending key
/// order, so callers may mutate the store while walking the result.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Get a value by key
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Value>>;

    /// Insert or overwrite a value
    async fn set(&self, namespace: Namespace, key: &str, value: &Value) -> Result<()>;

    /// Remove a value; removing a missing key is not an error
    async fn remove(&self, namespace: Namespace, key: &str) -> Result<()>;

    /// All keys of a namespace
    async fn keys(&self, namespace: Namespace) -> Result<Vec<String>>;

    /// All entries of a namespace
    async fn entries(&self, namespace: Namespace) -> Result<Vec<(String, Value)>>;
}

/// libSQL implementation of `LocalStore`
pub struct LibSqlStore {
    db: Mutex<Database>,
}

impl LibSqlStore {
    /// Open (or create) a store file at the given path
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::open(path, LOCAL_STORE_MIGRATIONS).await?;
        Ok(Self { db: Mutex::new(db) })
    }

    /// Open an in-memory store (primarily for tests)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory(LOCAL_STORE_MIGRATIONS).await?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn decode(namespace: Namespace, key: &str, raw: &str) -> Result<Value> {
        serde_json::from_str(raw).map_err(|error| {
            Error::Database(format!("corrupt {namespace} entry {key}: {error}"))
        })
    }
}

#[async_trait]
impl LocalStore for LibSqlStore {
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Value>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                "SELECT value FROM kv_entries WHERE namespace = ? AND key = ?",
                [namespace.as_str(), key],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            let raw: String = row.get(0)?;
            Ok(Some(Self::decode(namespace, key, &raw)?))
        } else {
            Ok(None)
        }
    }

    async fn set(&self, namespace: Namespace, key: &str, value: &Value) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        let now = chrono::Utc::now().timestamp_millis();

        let db = self.db.lock().await;
        db.connection()
            .execute(
                "INSERT INTO kv_entries (namespace, key, value, updated_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT (namespace, key) DO UPDATE SET
                   value = excluded.value,
                   updated_at = excluded.updated_at",
                libsql::params![namespace.as_str(), key, raw, now],
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, namespace: Namespace, key: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "DELETE FROM kv_entries WHERE namespace = ? AND key = ?",
                [namespace.as_str(), key],
            )
            .await?;
        Ok(())
    }

    async fn keys(&self, namespace: Namespace) -> Result<Vec<String>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                "SELECT key FROM kv_entries WHERE namespace = ? ORDER BY key",
                [namespace.as_str()],
            )
            .await?;

        let mut keys = Vec::new();
        while let Some(row) = rows.next().await? {
            keys.push(row.get::<String>(0)?);
        }
        Ok(keys)
    }

    async fn entries(&self, namespace: Namespace) -> Result<Vec<(String, Value)>> {
        let raw_entries = {
            let db = self.db.lock().await;
            let mut rows = db
                .connection()
                .query(
                    "SELECT key, value FROM kv_entries WHERE namespace = ? ORDER BY key",
                    [namespace.as_str()],
                )
                .await?;

            let mut raw_entries = Vec::new();
            while let Some(row) = rows.next().await? {
                raw_entries.push((row.get::<String>(0)?, row.get::<String>(1)?));
            }
            raw_entries
        };

        raw_entries
            .into_iter()
            .map(|(key, raw)| {
                let value = Self::decode(namespace, &key, &raw)?;
                Ok((key, value))
            })
            .collect()
    }
}
