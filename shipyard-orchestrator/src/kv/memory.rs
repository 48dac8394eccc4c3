//! In-memory key-value backend

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{KvStore, StoreError};

/// Process-local store, used when no database is configured and in tests
#[derive(Debug, Default)]
pub struct MemoryKv {
    records: RwLock<HashMap<String, JsonValue>>,
    lists: RwLock<HashMap<String, Vec<JsonValue>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("memory store lock poisoned".to_string())
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<JsonValue>, StoreError> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.get(key).cloned())
    }

    async fn insert(&self, key: &str, value: JsonValue) -> Result<bool, StoreError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        if records.contains_key(key) {
            return Ok(false);
        }
        records.insert(key.to_string(), value);
        Ok(true)
    }

    async fn put(&self, key: &str, value: JsonValue) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        records.insert(key.to_string(), value);
        Ok(())
    }

    async fn push(&self, key: &str, value: JsonValue) -> Result<(), StoreError> {
        let mut lists = self.lists.write().map_err(|_| poisoned())?;
        lists.entry(key.to_string()).or_default().push(value);
        Ok(())
    }

    async fn list(&self, key: &str) -> Result<Vec<JsonValue>, StoreError> {
        let lists = self.lists.read().map_err(|_| poisoned())?;
        Ok(lists.get(key).cloned().unwrap_or_default())
    }
}
