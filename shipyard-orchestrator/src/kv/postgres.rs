//! PostgreSQL key-value backend

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use sqlx::types::Json;

use super::{KvStore, StoreError};

/// Key-value store over the `kv_records` and `kv_lists` tables
#[derive(Debug, Clone)]
pub struct PgKv {
    pool: PgPool,
}

impl PgKv {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KvStore for PgKv {
    async fn get(&self, key: &str) -> Result<Option<JsonValue>, StoreError> {
        let row: Option<(Json<JsonValue>,)> =
            sqlx::query_as("SELECT value FROM kv_records WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(Json(value),)| value))
    }

    async fn insert(&self, key: &str, value: JsonValue) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO kv_records (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(Json(value))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn put(&self, key: &str, value: JsonValue) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO kv_records (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(Json(value))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn push(&self, key: &str, value: JsonValue) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO kv_lists (key, value, created_at)
            VALUES ($1, $2, NOW())
            "#,
        )
        .bind(key)
        .bind(Json(value))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, key: &str) -> Result<Vec<JsonValue>, StoreError> {
        let rows: Vec<(Json<JsonValue>,)> =
            sqlx::query_as("SELECT value FROM kv_lists WHERE key = $1 ORDER BY id ASC")
                .bind(key)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(Json(value),)| value).collect())
    }
}
