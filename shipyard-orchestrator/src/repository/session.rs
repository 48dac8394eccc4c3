//! Session Repository

use shipyard_core::domain::Session;
use uuid::Uuid;

use super::KvHandle;
use crate::error::{OrchestratorError, Result};
use crate::kv::session_key;

#[derive(Clone)]
pub struct SessionRepository {
    kv: KvHandle,
}

impl SessionRepository {
    pub fn new(kv: KvHandle) -> Self {
        Self { kv }
    }

    pub async fn create(&self, session: &Session) -> Result<()> {
        if !self.kv.insert_json(&session_key(session.id), session).await? {
            return Err(OrchestratorError::AlreadyExists(format!(
                "Session {}",
                session.id
            )));
        }
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Session> {
        self.kv
            .get_json::<Session>(&session_key(id))
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("Session {}", id)))
    }
}
