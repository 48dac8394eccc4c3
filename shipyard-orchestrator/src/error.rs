//! Orchestrator error taxonomy

use shipyard_core::domain::TransitionError;
use thiserror::Error;

use crate::kv::StoreError;

/// Errors surfaced to callers of the orchestrator services
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Malformed input; nothing was mutated
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    /// Operation not legal in the pipeline's current status
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Target object is not in the required state (e.g. a resolved gate)
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<TransitionError> for OrchestratorError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::GateNotFound(id) => {
                OrchestratorError::NotFound(format!("Approval gate {}", id))
            }
            TransitionError::GateNotPending { .. } => {
                OrchestratorError::InvalidState(err.to_string())
            }
            other => OrchestratorError::InvalidTransition(other.to_string()),
        }
    }
}

impl OrchestratorError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, OrchestratorError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
