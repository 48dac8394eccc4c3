//! Session endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use shipyard_core::domain::Session;
use shipyard_core::dto::session::CreateSession;
use uuid::Uuid;

impl OrchestratorClient {
    /// Create a session for a repository
    pub async fn create_session(&self, repository_url: impl Into<String>) -> Result<Session> {
        let url = format!("{}/session/create", self.base_url);
        let req = CreateSession {
            repository_url: repository_url.into(),
        };
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Get a session by ID
    pub async fn get_session(&self, session_id: Uuid) -> Result<Session> {
        let url = format!("{}/session/{}", self.base_url, session_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}
