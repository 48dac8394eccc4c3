//! Pipeline state machine
//!
//! `PipelineState` is the authoritative record of one pipeline run. Every
//! mutation goes through one of the transition methods below, which check
//! the current status first and leave the record untouched on error.
//!
//! ```text
//! initializing → running → {waiting_approval ⇄ running} → {completed | failed}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use super::approval::{ApprovalDecision, ApprovalGate, GateRequest, GateStatus};
use super::artifact::Artifact;
use super::stage::{AgentStage, Mode};

/// Pipeline lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Initializing,
    Running,
    WaitingApproval,
    Completed,
    Failed,
}

impl PipelineStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStatus::Completed | PipelineStatus::Failed)
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineStatus::Initializing => "initializing",
            PipelineStatus::Running => "running",
            PipelineStatus::WaitingApproval => "waiting_approval",
            PipelineStatus::Completed => "completed",
            PipelineStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Result recorded for a stage, written once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResult {
    pub output: serde_json::Value,
    /// Number of attempts it took, retries included
    pub attempts: u32,
    /// Ids of the artifacts this stage generated
    pub artifacts: Vec<Uuid>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Terminal failure descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineFailure {
    pub message: String,
    pub agent: Option<AgentStage>,
    pub gate_id: Option<Uuid>,
    pub error_log_id: Option<Uuid>,
}

impl PipelineFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            agent: None,
            gate_id: None,
            error_log_id: None,
        }
    }

    pub fn with_agent(mut self, agent: AgentStage) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn with_gate(mut self, gate_id: Uuid) -> Self {
        self.gate_id = Some(gate_id);
        self
    }

    pub fn with_error_log(mut self, error_log_id: Uuid) -> Self {
        self.error_log_id = Some(error_log_id);
        self
    }
}

/// Rejected state transition. The state is unchanged when one is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    #[error("cannot {action} pipeline {pipeline_id} while {from}")]
    InvalidTransition {
        pipeline_id: Uuid,
        from: PipelineStatus,
        action: &'static str,
    },

    #[error("stage {stage} is not the active stage of pipeline {pipeline_id}")]
    StageNotActive { pipeline_id: Uuid, stage: AgentStage },

    #[error("result for stage {0} is already recorded")]
    ResultAlreadyRecorded(AgentStage),

    #[error("approval gate {0} not found")]
    GateNotFound(Uuid),

    #[error("approval gate {0} is already open")]
    GateAlreadyOpen(Uuid),

    #[error("approval gate {gate_id} is already {status}")]
    GateNotPending { gate_id: Uuid, status: GateStatus },
}

/// Next step for the dispatcher after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// Pipeline is running this stage; dispatch it
    Dispatch(AgentStage),
    /// Stage execution suspended behind this gate
    AwaitingApproval(Uuid),
    Completed,
    Failed,
}

/// Mutable record of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    pub id: Uuid,
    pub session_id: Uuid,
    pub mode: Mode,
    pub status: PipelineStatus,
    pub current_agent: Option<AgentStage>,
    pub agent_results: BTreeMap<AgentStage, Option<AgentResult>>,
    pub approval_gates: Vec<ApprovalGate>,
    pub artifacts: Vec<Artifact>,
    pub error: Option<PipelineFailure>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub timestamps: BTreeMap<String, DateTime<Utc>>,
}

impl PipelineState {
    /// Fresh pipeline in `initializing` with an empty result slot per stage
    pub fn new(session_id: Uuid, mode: Mode) -> Self {
        let now = Utc::now();
        let mut timestamps = BTreeMap::new();
        timestamps.insert("created".to_string(), now);

        Self {
            id: Uuid::new_v4(),
            session_id,
            mode,
            status: PipelineStatus::Initializing,
            current_agent: None,
            agent_results: AgentStage::ALL.into_iter().map(|s| (s, None)).collect(),
            approval_gates: Vec::new(),
            artifacts: Vec::new(),
            error: None,
            started_at: now,
            completed_at: None,
            timestamps,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn result_for(&self, stage: AgentStage) -> Option<&AgentResult> {
        self.agent_results.get(&stage).and_then(|r| r.as_ref())
    }

    /// First active stage of the mode that has no recorded result
    pub fn next_stage(&self) -> Option<AgentStage> {
        self.mode
            .active_stages()
            .iter()
            .copied()
            .find(|stage| self.result_for(*stage).is_none())
    }

    pub fn gate(&self, gate_id: Uuid) -> Option<&ApprovalGate> {
        self.approval_gates.iter().find(|g| g.id == gate_id)
    }

    pub fn pending_gate(&self) -> Option<&ApprovalGate> {
        self.approval_gates.iter().find(|g| g.is_pending())
    }

    /// Move to the next active stage, or complete if none remain.
    ///
    /// Legal from `initializing`, or from `running` once the current stage
    /// (if any) has its result recorded.
    pub fn advance(&mut self) -> Result<StageOutcome, TransitionError> {
        match self.status {
            PipelineStatus::Initializing => {}
            PipelineStatus::Running => {
                if let Some(current) = self.current_agent {
                    if self.result_for(current).is_none() {
                        return Err(self.invalid("advance past an unfinished stage of"));
                    }
                }
            }
            _ => return Err(self.invalid("advance")),
        }

        let now = Utc::now();
        match self.next_stage() {
            Some(stage) => {
                self.status = PipelineStatus::Running;
                self.current_agent = Some(stage);
                self.mark(format!("{}_started", stage), now);
                Ok(StageOutcome::Dispatch(stage))
            }
            None => {
                self.status = PipelineStatus::Completed;
                self.current_agent = None;
                self.completed_at = Some(now);
                self.mark("completed".to_string(), now);
                Ok(StageOutcome::Completed)
            }
        }
    }

    /// Record the result of the running stage, append its artifacts, then
    /// either open an approval gate or advance.
    pub fn complete_stage(
        &mut self,
        stage: AgentStage,
        result: AgentResult,
        artifacts: Vec<Artifact>,
        approval: Option<GateRequest>,
    ) -> Result<StageOutcome, TransitionError> {
        if self.status != PipelineStatus::Running {
            return Err(self.invalid("record a stage result for"));
        }
        if self.current_agent != Some(stage) {
            return Err(TransitionError::StageNotActive {
                pipeline_id: self.id,
                stage,
            });
        }
        if self.result_for(stage).is_some() {
            return Err(TransitionError::ResultAlreadyRecorded(stage));
        }

        let artifact_ids: Vec<Uuid> = artifacts.iter().map(|a| a.id).collect();
        self.artifacts.extend(artifacts);
        self.agent_results.insert(stage, Some(result));
        self.mark(format!("{}_completed", stage), Utc::now());

        match approval {
            Some(request) => {
                let gate_id = self.open_gate(request, stage, artifact_ids)?;
                Ok(StageOutcome::AwaitingApproval(gate_id))
            }
            None => self.advance(),
        }
    }

    /// Append a pending gate and suspend the pipeline behind it
    pub fn open_gate(
        &mut self,
        request: GateRequest,
        stage: AgentStage,
        artifacts: Vec<Uuid>,
    ) -> Result<Uuid, TransitionError> {
        if self.status != PipelineStatus::Running {
            return Err(self.invalid("open an approval gate on"));
        }
        if self.gate(request.id).is_some() {
            return Err(TransitionError::GateAlreadyOpen(request.id));
        }

        let gate = ApprovalGate::new(request, self.id, stage, artifacts);
        let gate_id = gate.id;
        self.mark(format!("gate_{}_opened", gate_id), gate.created_at);
        self.approval_gates.push(gate);
        self.status = PipelineStatus::WaitingApproval;
        self.current_agent = None;

        Ok(gate_id)
    }

    /// Resolve a pending gate. Approval advances to the next stage;
    /// rejection fails the pipeline with `failure`.
    pub fn resolve_gate(
        &mut self,
        gate_id: Uuid,
        decision: ApprovalDecision,
        feedback: Option<String>,
        failure: PipelineFailure,
    ) -> Result<StageOutcome, TransitionError> {
        let index = self
            .approval_gates
            .iter()
            .position(|g| g.id == gate_id)
            .ok_or(TransitionError::GateNotFound(gate_id))?;

        let status = self.approval_gates[index].status;
        if status != GateStatus::Pending {
            return Err(TransitionError::GateNotPending { gate_id, status });
        }
        if self.status != PipelineStatus::WaitingApproval {
            return Err(self.invalid("resolve an approval gate on"));
        }

        let now = Utc::now().max(self.approval_gates[index].created_at);
        let gate = &mut self.approval_gates[index];
        gate.status = decision.into();
        gate.feedback = feedback;
        gate.responded_at = Some(now);
        self.mark(format!("gate_{}_resolved", gate_id), now);

        match decision {
            ApprovalDecision::Approved => {
                self.status = PipelineStatus::Running;
                self.current_agent = None;
                self.advance()
            }
            ApprovalDecision::Rejected => {
                self.fail(failure)?;
                Ok(StageOutcome::Failed)
            }
        }
    }

    /// Terminal failure. Legal from any non-terminal status.
    pub fn fail(&mut self, failure: PipelineFailure) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(self.invalid("fail"));
        }

        let now = Utc::now();
        self.status = PipelineStatus::Failed;
        self.current_agent = None;
        self.error = Some(failure);
        self.completed_at = Some(now);
        self.mark("failed".to_string(), now);
        Ok(())
    }

    /// Describe the first violated record invariant, if any
    pub fn invariant_violation(&self) -> Option<String> {
        if self.completed_at.is_some() != self.is_terminal() {
            return Some(format!(
                "completedAt is {:?} while status is {}",
                self.completed_at, self.status
            ));
        }
        if self.error.is_some() && self.status != PipelineStatus::Failed {
            return Some(format!("error is set while status is {}", self.status));
        }
        if self.status == PipelineStatus::Failed && self.error.is_none() {
            return Some("status is failed without an error".to_string());
        }
        if self.current_agent.is_some() && self.status != PipelineStatus::Running {
            return Some(format!("currentAgent is set while status is {}", self.status));
        }
        if self.agent_results.len() != AgentStage::ALL.len() {
            return Some("agentResults does not hold one slot per stage".to_string());
        }
        for (stage, result) in &self.agent_results {
            if result.is_some() && !self.mode.is_active(*stage) {
                return Some(format!("skipped stage {} has a result", stage));
            }
        }
        let pending = self.approval_gates.iter().filter(|g| g.is_pending()).count();
        if self.status == PipelineStatus::WaitingApproval && pending != 1 {
            return Some(format!("waiting_approval with {} pending gates", pending));
        }
        None
    }

    fn mark(&mut self, key: String, at: DateTime<Utc>) {
        self.timestamps.entry(key).or_insert(at);
    }

    fn invalid(&self, action: &'static str) -> TransitionError {
        TransitionError::InvalidTransition {
            pipeline_id: self.id,
            from: self.status,
            action,
        }
    }
}
