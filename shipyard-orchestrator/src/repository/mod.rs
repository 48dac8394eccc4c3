//! Repository Module
//!
//! Data access layer for the orchestrator.
//! Each repository handles key-value operations for a specific domain entity.
//! Every store call is bounded by the configured store timeout.

pub mod error_log;
pub mod gate;
pub mod pipeline;
pub mod session;

// Re-export for convenience
pub use error_log::ErrorLogRepository;
pub use gate::GateRepository;
pub use pipeline::{PipelineRepository, Snapshot};
pub use session::SessionRepository;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::kv::{KvStore, StoreError};

/// Shared handle to the key-value store with a per-call timeout
#[derive(Clone)]
pub struct KvHandle {
    kv: Arc<dyn KvStore>,
    timeout: Duration,
}

impl KvHandle {
    pub fn new(kv: Arc<dyn KvStore>, timeout: Duration) -> Self {
        Self { kv, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `fut`, failing with `StoreError::Timeout` if it does not finish in time
    pub async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let value = self.bounded(self.kv.get(key)).await?;
        value.map(|v| decode(key, v)).transpose()
    }

    pub async fn insert_json<T: Serialize>(&self, key: &str, value: &T) -> Result<bool, StoreError> {
        let value = encode(key, value)?;
        self.bounded(self.kv.insert(key, value)).await
    }

    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = encode(key, value)?;
        self.bounded(self.kv.put(key, value)).await
    }

    pub async fn push_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = encode(key, value)?;
        self.bounded(self.kv.push(key, value)).await
    }

    pub async fn list_json<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StoreError> {
        let values = self.bounded(self.kv.list(key)).await?;
        values.into_iter().map(|v| decode(key, v)).collect()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn encode<T: Serialize>(key: &str, value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value).map_err(|source| StoreError::Malformed {
        key: key.to_string(),
        source,
    })
}

fn decode<T: DeserializeOwned>(key: &str, value: serde_json::Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|source| StoreError::Malformed {
        key: key.to_string(),
        source,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fault-injecting store wrapper for tests

    use async_trait::async_trait;
    use serde_json::Value as JsonValue;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;

    use crate::kv::{KvStore, MemoryKv, StoreError};

    /// Wraps `MemoryKv`; reads can be made to fail or hang on demand
    #[derive(Default)]
    pub struct FaultyKv {
        pub inner: MemoryKv,
        pub failing_reads: AtomicU32,
        pub hang: AtomicBool,
    }

    impl FaultyKv {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Make the next `n` reads fail
        pub fn fail_next_reads(&self, n: u32) {
            self.failing_reads.store(n, Ordering::SeqCst);
        }

        async fn maybe_fail(&self) -> Result<(), StoreError> {
            if self.hang.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            let remaining = self.failing_reads.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failing_reads.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::Unavailable("injected read failure".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl KvStore for FaultyKv {
        async fn get(&self, key: &str) -> Result<Option<JsonValue>, StoreError> {
            self.maybe_fail().await?;
            self.inner.get(key).await
        }

        async fn insert(&self, key: &str, value: JsonValue) -> Result<bool, StoreError> {
            self.inner.insert(key, value).await
        }

        async fn put(&self, key: &str, value: JsonValue) -> Result<(), StoreError> {
            self.inner.put(key, value).await
        }

        async fn push(&self, key: &str, value: JsonValue) -> Result<(), StoreError> {
            self.inner.push(key, value).await
        }

        async fn list(&self, key: &str) -> Result<Vec<JsonValue>, StoreError> {
            self.maybe_fail().await?;
            self.inner.list(key).await
        }
    }
}
