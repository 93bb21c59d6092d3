//! Key-value cache for complete analysis responses.
//!
//! The [`KvCache`] trait is the storage seam: [`SqliteKvCache`] persists
//! entries in the `kv_cache` table next to the document store, and
//! [`MemoryKvCache`] keeps them in a `HashMap` for tests and throwaway runs.
//!
//! Entries are keyed by the caller's input string (`analysis:<input>`), are
//! written once per distinct input, never expire, and disappear only on an
//! explicit [`KvCache::clear`].

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::RwLock;

use codelens_core::models::ProjectSummary;

#[async_trait]
pub trait KvCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove every entry.
    async fn clear(&self) -> Result<()>;
}

/// A cached analysis: where the summary was written and what it contained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub json_path: String,
    pub json_data: ProjectSummary,
}

pub fn cache_key(input: &str) -> String {
    format!("analysis:{}", input)
}

/// Look up the cached analysis for `input`.
///
/// An entry that no longer deserializes is reported as a miss.
pub async fn get_entry(cache: &dyn KvCache, input: &str) -> Result<Option<CacheEntry>> {
    let Some(raw) = cache.get(&cache_key(input)).await? else {
        return Ok(None);
    };

    match serde_json::from_str(&raw) {
        Ok(entry) => Ok(Some(entry)),
        Err(e) => {
            tracing::warn!(input, error = %e, "ignoring unreadable cache entry");
            Ok(None)
        }
    }
}

pub async fn put_entry(cache: &dyn KvCache, input: &str, entry: &CacheEntry) -> Result<()> {
    cache
        .set(&cache_key(input), &serde_json::to_string(entry)?)
        .await
}

// ============ SQLite ============

pub struct SqliteKvCache {
    pool: SqlitePool,
}

impl SqliteKvCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KvCache for SqliteKvCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM kv_cache WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_cache (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM kv_cache")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ============ In-memory ============

#[derive(Default)]
pub struct MemoryKvCache {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKvCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvCache for MemoryKvCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| anyhow::anyhow!("cache lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow::anyhow!("cache lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow::anyhow!("cache lock poisoned"))?;
        entries.clear();
        Ok(())
    }
}
