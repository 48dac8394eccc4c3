//! Approval Gate Service
//!
//! Opens gates on running pipelines and applies the single external
//! response each gate accepts. The response is applied inside one pipeline
//! update, so it cannot race the dispatcher or a second response.

use shipyard_core::domain::{
    AgentStage, ApprovalDecision, GateRequest, GateStatus, GateType, PipelineFailure,
    PipelineStatus, StageOutcome,
};
use shipyard_core::dto::approval::ApprovalResolved;
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::repository::{GateRepository, PipelineRepository};
use crate::service::error_log::ErrorLogService;

/// Applied gate response together with what the dispatcher should do next
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalResolution {
    pub gate_id: Uuid,
    pub pipeline_id: Uuid,
    pub gate_status: GateStatus,
    pub pipeline_status: PipelineStatus,
    pub outcome: StageOutcome,
}

impl From<&ApprovalResolution> for ApprovalResolved {
    fn from(resolution: &ApprovalResolution) -> Self {
        Self {
            gate_id: resolution.gate_id,
            pipeline_id: resolution.pipeline_id,
            gate_status: resolution.gate_status,
            pipeline_status: resolution.pipeline_status,
        }
    }
}

#[derive(Clone)]
pub struct ApprovalService {
    pipelines: PipelineRepository,
    gates: GateRepository,
    error_log: ErrorLogService,
}

impl ApprovalService {
    pub fn new(
        pipelines: PipelineRepository,
        gates: GateRepository,
        error_log: ErrorLogService,
    ) -> Self {
        Self {
            pipelines,
            gates,
            error_log,
        }
    }

    /// Reserve a gate id and index it so a response can find its pipeline
    /// as soon as the gate becomes visible.
    pub async fn prepare_gate(&self, pipeline_id: Uuid, gate_type: GateType) -> Result<GateRequest> {
        let request = GateRequest::new(gate_type);
        self.gates.index(request.id, pipeline_id).await?;
        Ok(request)
    }

    /// Open a pending gate on a running pipeline, suspending it
    pub async fn open_gate(
        &self,
        pipeline_id: Uuid,
        gate_type: GateType,
        stage: AgentStage,
        artifacts: Vec<Uuid>,
    ) -> Result<Uuid> {
        let request = self.prepare_gate(pipeline_id, gate_type).await?;
        let gate_id = self
            .pipelines
            .update(pipeline_id, |state| {
                Ok(state.open_gate(request, stage, artifacts)?)
            })
            .await?;

        tracing::info!(
            "Approval gate {} ({}) opened on pipeline {}",
            gate_id,
            gate_type,
            pipeline_id
        );
        Ok(gate_id)
    }

    /// Apply the response to a pending gate.
    ///
    /// Approval resumes the pipeline at the next active stage (or completes
    /// it); rejection fails it. A gate that was already resolved is left
    /// untouched and `InvalidState` is returned.
    pub async fn respond(
        &self,
        gate_id: Uuid,
        decision: ApprovalDecision,
        feedback: Option<String>,
    ) -> Result<ApprovalResolution> {
        let pipeline_id = self.gates.pipeline_for(gate_id).await?;
        let state = self.pipelines.get(pipeline_id).await?;
        let gate = state
            .gate(gate_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::NotFound(format!("Approval gate {}", gate_id)))?;

        if !gate.is_pending() {
            tracing::warn!(
                "Ignoring response to approval gate {}: already {}",
                gate_id,
                gate.status
            );
            return Err(OrchestratorError::InvalidState(format!(
                "approval gate {} is already {}",
                gate_id, gate.status
            )));
        }

        let failure = match decision {
            ApprovalDecision::Approved => PipelineFailure::new(String::new()),
            ApprovalDecision::Rejected => {
                let message = rejection_message(gate_id, gate.gate_type, feedback.as_deref());
                let error_log_id = self
                    .error_log
                    .log(
                        pipeline_id,
                        Some(gate.stage),
                        &message,
                        feedback.as_deref().unwrap_or_default(),
                        false,
                    )
                    .await?;
                PipelineFailure::new(message)
                    .with_agent(gate.stage)
                    .with_gate(gate_id)
                    .with_error_log(error_log_id)
            }
        };

        let resolution = self
            .pipelines
            .update(pipeline_id, |state| {
                let outcome = state.resolve_gate(gate_id, decision, feedback, failure)?;
                Ok(ApprovalResolution {
                    gate_id,
                    pipeline_id,
                    gate_status: decision.into(),
                    pipeline_status: state.status,
                    outcome,
                })
            })
            .await
            .inspect_err(|err| {
                tracing::warn!("Response to approval gate {} not applied: {}", gate_id, err)
            })?;

        tracing::info!(
            "Approval gate {} {} on pipeline {} (now {})",
            gate_id,
            resolution.gate_status,
            pipeline_id,
            resolution.pipeline_status
        );
        Ok(resolution)
    }
}

fn rejection_message(gate_id: Uuid, gate_type: GateType, feedback: Option<&str>) -> String {
    match feedback.map(str::trim).filter(|f| !f.is_empty()) {
        Some(feedback) => format!(
            "approval gate {} ({}) rejected: {}",
            gate_id, gate_type, feedback
        ),
        None => format!("approval gate {} ({}) rejected", gate_id, gate_type),
    }
}
