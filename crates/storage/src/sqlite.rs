//! SQLite-backed state store.
//!
//! A single `kv` table with an optional `expires_at` column (epoch ms).
//! Expiry is lazy: an expired row is deleted when `get` touches it, and
//! `purge_expired` sweeps the rest when the caller wants to.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use {
    async_trait::async_trait,
    sqlx::sqlite::{SqliteConnectOptions, SqlitePool},
    tracing::debug,
};

use crate::{error::Result, store::StateStore};

pub struct SqliteStore {
    pool: SqlitePool,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

impl SqliteStore {
    /// Open (creating if needed) a store at `path`.
    pub async fn open(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        Self::with_pool(pool).await
    }

    /// Private in-memory database; used by tests.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePool::connect("sqlite::memory:").await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS kv (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                expires_at INTEGER
            )"#,
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    /// Delete every expired row. Returns the number of rows removed.
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM kv WHERE expires_at IS NOT NULL AND expires_at <= ?")
            .bind(now_ms())
            .execute(&self.pool)
            .await?;
        let purged = result.rows_affected();
        if purged > 0 {
            debug!(purged, "purged expired state entries");
        }
        Ok(purged)
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query_as::<_, (String, Option<i64>)>(
            "SELECT value, expires_at FROM kv WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((_, Some(expires_at))) if expires_at <= now_ms() => {
                sqlx::query("DELETE FROM kv WHERE key = ?")
                    .bind(key)
                    .execute(&self.pool)
                    .await?;
                Ok(None)
            },
            Some((value, _)) => Ok(Some(value)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map(|d| now_ms() + d.as_millis() as i64);
        sqlx::query(
            r#"INSERT INTO kv (key, value, expires_at) VALUES (?, ?, ?)
               ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 expires_at = excluded.expires_at"#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
