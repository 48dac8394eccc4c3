//! Session Service
//!
//! Minimal session records owning pipeline runs.

use shipyard_core::domain::Session;
use shipyard_core::dto::session::CreateSession;
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::repository::SessionRepository;

#[derive(Clone)]
pub struct SessionService {
    repository: SessionRepository,
}

impl SessionService {
    pub fn new(repository: SessionRepository) -> Self {
        Self { repository }
    }

    pub async fn create_session(&self, req: CreateSession) -> Result<Session> {
        validate_session_request(&req)?;

        let session = Session::new(req.repository_url.trim());
        self.repository.create(&session).await?;

        tracing::info!("Session created: {} ({})", session.id, session.repository_url);
        Ok(session)
    }

    pub async fn get_session(&self, id: Uuid) -> Result<Session> {
        self.repository.get(id).await
    }
}

// =============================================================================
// Validation
// =============================================================================

fn validate_session_request(req: &CreateSession) -> Result<()> {
    let url = req.repository_url.trim();

    if url.is_empty() {
        return Err(OrchestratorError::Validation(
            "Repository URL cannot be empty".to_string(),
        ));
    }

    if url.len() > 2048 {
        return Err(OrchestratorError::Validation(
            "Repository URL is too long (max 2048 characters)".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_empty_url() {
        let req = CreateSession {
            repository_url: "   ".to_string(),
        };
        assert!(matches!(
            validate_session_request(&req),
            Err(OrchestratorError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_valid_url() {
        let req = CreateSession {
            repository_url: "https://github.com/acme/widget".to_string(),
        };
        assert!(validate_session_request(&req).is_ok());
    }
}
