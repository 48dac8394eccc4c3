//! Error Log Service
//!
//! Append-only record of failures per pipeline. Every call produces a new
//! entry with a fresh id, even for identical input.

use shipyard_core::domain::{AgentStage, ErrorLog};
use uuid::Uuid;

use crate::error::Result;
use crate::repository::ErrorLogRepository;

#[derive(Clone)]
pub struct ErrorLogService {
    repository: ErrorLogRepository,
}

impl ErrorLogService {
    pub fn new(repository: ErrorLogRepository) -> Self {
        Self { repository }
    }

    /// Append an entry and return its id
    pub async fn log(
        &self,
        pipeline_id: Uuid,
        agent: Option<AgentStage>,
        message: &str,
        details: &str,
        recoverable: bool,
    ) -> Result<Uuid> {
        let entry = ErrorLog::new(pipeline_id, agent, message, details, recoverable);
        self.repository.append(&entry).await?;

        if recoverable {
            tracing::warn!("{}", entry.format());
        } else {
            tracing::error!("{}", entry.format());
        }

        Ok(entry.id)
    }

    /// All entries for a pipeline, oldest first
    pub async fn list(&self, pipeline_id: Uuid) -> Result<Vec<ErrorLog>> {
        self.repository.find_by_pipeline(pipeline_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use crate::repository::KvHandle;
    use std::sync::Arc;
    use std::time::Duration;

    fn service() -> ErrorLogService {
        let kv = KvHandle::new(Arc::new(MemoryKv::new()), Duration::from_secs(1));
        ErrorLogService::new(ErrorLogRepository::new(kv))
    }

    #[tokio::test]
    async fn test_identical_calls_are_not_deduplicated() {
        let service = service();
        let pipeline_id = Uuid::new_v4();

        let first = service
            .log(pipeline_id, Some(AgentStage::Docs), "boom", "same", false)
            .await
            .unwrap();
        let second = service
            .log(pipeline_id, Some(AgentStage::Docs), "boom", "same", false)
            .await
            .unwrap();

        assert_ne!(first, second);
        let entries = service.list(pipeline_id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, first);
        assert_eq!(entries[1].id, second);
    }

    #[tokio::test]
    async fn test_logs_are_scoped_per_pipeline() {
        let service = service();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        service.log(a, None, "system failure", "", false).await.unwrap();

        assert_eq!(service.list(a).await.unwrap().len(), 1);
        assert!(service.list(b).await.unwrap().is_empty());
        assert!(service.list(a).await.unwrap()[0].agent.is_none());
    }
}
