//! Approval gate domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::stage::AgentStage;

/// Pause point requiring an external decision before the pipeline continues.
///
/// Created pending by the orchestrator, resolved exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalGate {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    #[serde(rename = "type")]
    pub gate_type: GateType,
    /// Stage whose output is awaiting approval
    pub stage: AgentStage,
    pub status: GateStatus,
    /// Ids of the artifacts awaiting approval
    pub artifacts: Vec<Uuid>,
    pub feedback: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub responded_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl ApprovalGate {
    pub fn new(
        request: GateRequest,
        pipeline_id: Uuid,
        stage: AgentStage,
        artifacts: Vec<Uuid>,
    ) -> Self {
        Self {
            id: request.id,
            pipeline_id,
            gate_type: request.gate_type,
            stage,
            status: GateStatus::Pending,
            artifacts,
            feedback: None,
            created_at: chrono::Utc::now(),
            responded_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == GateStatus::Pending
    }
}

/// Gate to open, with its id chosen up front so it can be indexed before
/// the pipeline record references it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateRequest {
    pub id: Uuid,
    pub gate_type: GateType,
}

impl GateRequest {
    pub fn new(gate_type: GateType) -> Self {
        Self {
            id: Uuid::new_v4(),
            gate_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GateType {
    Docs,
    PullRequest,
}

impl fmt::Display for GateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateType::Docs => f.write_str("docs"),
            GateType::PullRequest => f.write_str("pull-request"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GateStatus::Pending => "pending",
            GateStatus::Approved => "approved",
            GateStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Response to a pending gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

impl From<ApprovalDecision> for GateStatus {
    fn from(decision: ApprovalDecision) -> Self {
        match decision {
            ApprovalDecision::Approved => GateStatus::Approved,
            ApprovalDecision::Rejected => GateStatus::Rejected,
        }
    }
}

impl FromStr for ApprovalDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(ApprovalDecision::Approved),
            "rejected" => Ok(ApprovalDecision::Rejected),
            other => Err(format!("Unknown approval decision: {}", other)),
        }
    }
}
