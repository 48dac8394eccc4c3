//! Error Log Repository
//!
//! One append-only list per pipeline.

use shipyard_core::domain::ErrorLog;
use uuid::Uuid;

use super::KvHandle;
use crate::error::Result;
use crate::kv::error_log_key;

#[derive(Clone)]
pub struct ErrorLogRepository {
    kv: KvHandle,
}

impl ErrorLogRepository {
    pub fn new(kv: KvHandle) -> Self {
        Self { kv }
    }

    pub async fn append(&self, entry: &ErrorLog) -> Result<()> {
        self.kv
            .push_json(&error_log_key(entry.pipeline_id), entry)
            .await?;
        Ok(())
    }

    pub async fn find_by_pipeline(&self, pipeline_id: Uuid) -> Result<Vec<ErrorLog>> {
        Ok(self.kv.list_json(&error_log_key(pipeline_id)).await?)
    }
}
