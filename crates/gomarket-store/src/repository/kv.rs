//! # Key-Value Repository
//!
//! Reads and writes rows of the `kv_store` table.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::StoreResult;

/// Repository for `kv_store` rows.
#[derive(Debug, Clone)]
pub struct KvRepository {
    pool: SqlitePool,
}

impl KvRepository {
    pub fn new(pool: SqlitePool) -> Self {
        KvRepository { pool }
    }

    /// Gets the value stored under `key`.
    pub async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    /// Inserts or replaces the value under `key`.
    pub async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        debug!(key = %key, bytes = value.len(), "Upserting kv row");

        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Deletes the row for `key`, if any.
    pub async fn remove(&self, key: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
