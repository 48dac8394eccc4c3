//! Approval DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::approval::{ApprovalDecision, GateStatus};
use crate::domain::pipeline::PipelineStatus;

/// External response to a pending approval gate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondToApproval {
    pub decision: ApprovalDecision,
    #[serde(default)]
    pub feedback: Option<String>,
}

/// Outcome of a gate response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResolved {
    pub gate_id: Uuid,
    pub pipeline_id: Uuid,
    pub gate_status: GateStatus,
    pub pipeline_status: PipelineStatus,
}
