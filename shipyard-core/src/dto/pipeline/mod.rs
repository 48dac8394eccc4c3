//! Pipeline DTOs for inter-service communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to start a new pipeline run
///
/// `mode` stays a string so unknown modes surface as a validation error
/// rather than a deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPipeline {
    pub session_id: Uuid,
    pub mode: String,
}

/// Response to a successful start
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStarted {
    pub pipeline_id: Uuid,
}
