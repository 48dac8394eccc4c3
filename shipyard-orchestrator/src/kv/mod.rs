//! Key-value persistence
//!
//! The orchestrator treats storage as an opaque key-value store holding
//! JSON documents: single records addressed by key, and append-only lists.
//! Retention and expiry of keys belong to whoever operates the backend.

mod memory;
mod postgres;

pub use memory::MemoryKv;
pub use postgres::PgKv;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::time::Duration;
use thiserror::Error;

/// Storage failure
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed record '{key}': {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Opaque key-value store
///
/// Single-key writes are atomic: a reader sees either the previous or the
/// next document, never a mix.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch the record stored under `key`
    async fn get(&self, key: &str) -> Result<Option<JsonValue>, StoreError>;

    /// Store `value` only if `key` is absent. Returns false if it existed.
    async fn insert(&self, key: &str, value: JsonValue) -> Result<bool, StoreError>;

    /// Store `value` under `key`, replacing any previous record
    async fn put(&self, key: &str, value: JsonValue) -> Result<(), StoreError>;

    /// Append `value` to the list under `key`
    async fn push(&self, key: &str, value: JsonValue) -> Result<(), StoreError>;

    /// All values of the list under `key`, in insertion order
    async fn list(&self, key: &str) -> Result<Vec<JsonValue>, StoreError>;
}

// =============================================================================
// Keys
// =============================================================================

pub fn pipeline_key(id: uuid::Uuid) -> String {
    format!("pipeline:{}", id)
}

pub fn session_key(id: uuid::Uuid) -> String {
    format!("session:{}", id)
}

pub fn gate_key(id: uuid::Uuid) -> String {
    format!("gate:{}", id)
}

pub fn error_log_key(pipeline_id: uuid::Uuid) -> String {
    format!("errors:{}", pipeline_id)
}
