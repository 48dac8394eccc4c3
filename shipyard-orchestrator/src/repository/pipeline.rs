//! Pipeline Repository
//!
//! Authoritative store of `PipelineState` records. Writes to one pipeline
//! id are serialized through a per-id lock held across the whole
//! read-modify-write; different pipelines never contend. Reads take no lock
//! and always see a complete record, since each write replaces the whole
//! document.

use serde::{Deserialize, Serialize};
use shipyard_core::domain::PipelineState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::KvHandle;
use crate::error::{OrchestratorError, Result};
use crate::kv::{StoreError, pipeline_key};

/// A pipeline record together with its revision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Bumped by every successful update
    pub revision: u64,
    pub state: PipelineState,
}

#[derive(Clone)]
pub struct PipelineRepository {
    kv: KvHandle,
    write_locks: Arc<Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>>,
}

impl PipelineRepository {
    pub fn new(kv: KvHandle) -> Self {
        Self {
            kv,
            write_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Store a new pipeline record at revision 0
    pub async fn create(&self, state: &PipelineState) -> Result<()> {
        let record = Snapshot {
            revision: 0,
            state: state.clone(),
        };
        let inserted = self.kv.insert_json(&pipeline_key(state.id), &record).await?;

        if !inserted {
            return Err(OrchestratorError::AlreadyExists(format!(
                "Pipeline {}",
                state.id
            )));
        }
        Ok(())
    }

    /// Current record and revision
    pub async fn snapshot(&self, id: Uuid) -> Result<Snapshot> {
        self.kv
            .get_json::<Snapshot>(&pipeline_key(id))
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("Pipeline {}", id)))
    }

    /// Current record
    pub async fn get(&self, id: Uuid) -> Result<PipelineState> {
        Ok(self.snapshot(id).await?.state)
    }

    /// Apply `mutator` to the current record and store the result.
    ///
    /// The mutator works on a copy; if it fails nothing is written. Concurrent
    /// updates to the same id run one after the other.
    pub async fn update<T, F>(&self, id: Uuid, mutator: F) -> Result<T>
    where
        F: FnOnce(&mut PipelineState) -> Result<T>,
    {
        let lock = self.write_lock(id);
        let result = self.update_locked(id, &lock, mutator).await;
        self.release_write_lock(id, lock);
        result
    }

    async fn update_locked<T, F>(
        &self,
        id: Uuid,
        lock: &tokio::sync::Mutex<()>,
        mutator: F,
    ) -> Result<T>
    where
        F: FnOnce(&mut PipelineState) -> Result<T>,
    {
        let _guard = tokio::time::timeout(self.kv.timeout(), lock.lock())
            .await
            .map_err(|_| StoreError::Timeout(self.kv.timeout()))?;

        let Snapshot { revision, state } = self.snapshot(id).await?;
        let mut next = state;
        let output = mutator(&mut next)?;

        let record = Snapshot {
            revision: revision + 1,
            state: next,
        };
        self.kv.put_json(&pipeline_key(id), &record).await?;

        Ok(output)
    }

    fn write_lock(&self, id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .write_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(id).or_default())
    }

    /// Drop the per-id lock once no other writer holds or awaits it.
    /// Handles are only cloned under the map lock, so the count is exact.
    fn release_write_lock(&self, id: Uuid, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self
            .write_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        drop(lock);
        if locks.get(&id).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            locks.remove(&id);
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.write_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
