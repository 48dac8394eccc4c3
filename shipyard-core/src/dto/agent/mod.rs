//! Agent runner DTOs
//!
//! Shapes exchanged with the external agent runners that do the actual
//! analysis, documentation, demo and pitch work.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::approval::GateType;
use crate::domain::artifact::{Artifact, ArtifactDraft};
use crate::domain::stage::{AgentStage, Mode};

/// Work order for one stage attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    pub pipeline_id: Uuid,
    pub session_id: Uuid,
    pub repository_url: String,
    pub mode: Mode,
    pub stage: AgentStage,
    /// 1-based attempt number
    pub attempt: u32,
    /// Artifacts generated by earlier stages
    pub artifacts: Vec<Artifact>,
}

/// What a stage produced
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentOutput {
    #[serde(default)]
    pub output: serde_json::Value,
    #[serde(default)]
    pub artifacts: Vec<ArtifactDraft>,
    /// Set when the output must be approved before the pipeline continues
    #[serde(default)]
    pub requires_approval: Option<GateType>,
}

impl AgentOutput {
    pub fn with_artifact(mut self, draft: ArtifactDraft) -> Self {
        self.artifacts.push(draft);
        self
    }

    pub fn requiring_approval(mut self, gate_type: GateType) -> Self {
        self.requires_approval = Some(gate_type);
        self
    }
}
