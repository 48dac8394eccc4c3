//! Session DTOs

use serde::{Deserialize, Serialize};

/// Request to create a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSession {
    pub repository_url: String,
}
