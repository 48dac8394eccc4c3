//! Session domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Owner of pipeline runs. Authentication and token handling live outside
/// this system; the record only carries what agents need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub repository_url: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Session {
    pub fn new(repository_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            repository_url: repository_url.into(),
            created_at: chrono::Utc::now(),
        }
    }
}
