//! Pipeline Orchestrator
//!
//! Drives pipelines through their stages. A driver task reads the record,
//! dispatches the current stage to its agent runner, retries transient
//! failures with exponential backoff and commits the outcome through the
//! pipeline repository. It stops when the pipeline suspends behind an
//! approval gate or reaches a terminal status; an approval restarts it.

use chrono::Utc;
use shipyard_core::classify;
use shipyard_core::domain::{
    AgentResult, AgentStage, Artifact, ErrorLog, Mode, PipelineFailure, PipelineState,
    PipelineStatus, Session, StageOutcome,
};
use shipyard_core::dto::agent::{AgentOutput, AgentRequest};
use shipyard_core::dto::approval::{ApprovalResolved, RespondToApproval};
use shipyard_core::dto::pipeline::StartPipeline;
use std::time::Duration;
use uuid::Uuid;

use crate::agent::{AgentError, AgentRegistry, AgentRunner};
use crate::config::Config;
use crate::error::{OrchestratorError, Result};
use crate::repository::PipelineRepository;
use crate::service::approval::ApprovalService;
use crate::service::error_log::ErrorLogService;
use crate::service::session::SessionService;

/// Cap on the doubled retry delay
pub const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Maximum accepted length of approval feedback
const MAX_FEEDBACK_LEN: usize = 10_000;

/// Timeouts and retry budget for stage execution
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    /// Upper bound on a single agent attempt
    pub stage_timeout: Duration,
    /// Retries of a recoverable failure before it is escalated
    pub max_stage_retries: u32,
    /// Delay before the first retry
    pub retry_backoff: Duration,
}

impl DispatchPolicy {
    /// Delay before retry number `retry` (1-based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.retry_backoff
            .saturating_mul(factor)
            .min(MAX_RETRY_BACKOFF)
    }
}

impl From<&Config> for DispatchPolicy {
    fn from(config: &Config) -> Self {
        Self {
            stage_timeout: config.stage_timeout,
            max_stage_retries: config.max_stage_retries,
            retry_backoff: config.retry_backoff,
        }
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    pipelines: PipelineRepository,
    sessions: SessionService,
    approvals: ApprovalService,
    error_log: ErrorLogService,
    agents: AgentRegistry,
    policy: DispatchPolicy,
}

impl Orchestrator {
    pub fn new(
        pipelines: PipelineRepository,
        sessions: SessionService,
        approvals: ApprovalService,
        error_log: ErrorLogService,
        agents: AgentRegistry,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            pipelines,
            sessions,
            approvals,
            error_log,
            agents,
            policy,
        }
    }

    /// Create a pipeline for the session and start driving it in the
    /// background. Returns the record as created, still `initializing`.
    pub async fn start_pipeline(&self, req: StartPipeline) -> Result<PipelineState> {
        let mode: Mode = req.mode.trim().parse().map_err(OrchestratorError::Validation)?;
        let session = self.sessions.get_session(req.session_id).await?;

        let state = PipelineState::new(session.id, mode);
        self.pipelines.create(&state).await?;

        tracing::info!(
            "Pipeline {} created for session {} (mode: {})",
            state.id,
            session.id,
            mode
        );

        self.spawn_driver(state.id);
        Ok(state)
    }

    pub async fn get_pipeline(&self, id: Uuid) -> Result<PipelineState> {
        self.pipelines.get(id).await
    }

    /// Error log of an existing pipeline, oldest first
    pub async fn pipeline_errors(&self, id: Uuid) -> Result<Vec<ErrorLog>> {
        self.pipelines.get(id).await?;
        self.error_log.list(id).await
    }

    /// Apply an approval response; an approved gate resumes dispatch
    pub async fn respond_to_approval(
        &self,
        gate_id: Uuid,
        req: RespondToApproval,
    ) -> Result<ApprovalResolved> {
        if req.feedback.as_ref().is_some_and(|f| f.len() > MAX_FEEDBACK_LEN) {
            return Err(OrchestratorError::Validation(format!(
                "Feedback is too long (max {} characters)",
                MAX_FEEDBACK_LEN
            )));
        }

        let resolution = self
            .approvals
            .respond(gate_id, req.decision, req.feedback)
            .await?;

        if let StageOutcome::Dispatch(stage) = resolution.outcome {
            tracing::info!(
                "Resuming pipeline {} at stage {}",
                resolution.pipeline_id,
                stage
            );
            self.spawn_driver(resolution.pipeline_id);
        }

        Ok((&resolution).into())
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    fn spawn_driver(&self, id: Uuid) {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            if let Err(err) = orchestrator.drive(id).await {
                orchestrator.abort(id, err).await;
            }
        });
    }

    /// Run stages until the pipeline suspends or terminates
    async fn drive(&self, id: Uuid) -> Result<()> {
        let mut next = self.next_dispatch(id).await?;

        while let Some(stage) = next {
            next = match self.run_stage(id, stage).await? {
                StageOutcome::Dispatch(stage) => Some(stage),
                StageOutcome::AwaitingApproval(gate_id) => {
                    tracing::info!("Pipeline {} waiting on approval gate {}", id, gate_id);
                    None
                }
                StageOutcome::Completed => {
                    tracing::info!("Pipeline {} completed", id);
                    None
                }
                StageOutcome::Failed => None,
            };
        }

        Ok(())
    }

    /// Stage to dispatch, starting the pipeline if it is still initializing
    async fn next_dispatch(&self, id: Uuid) -> Result<Option<AgentStage>> {
        let state = self.pipelines.get(id).await?;

        match (state.status, state.current_agent) {
            (PipelineStatus::Initializing, _) => {
                match self.pipelines.update(id, |s| Ok(s.advance()?)).await? {
                    StageOutcome::Dispatch(stage) => Ok(Some(stage)),
                    StageOutcome::Completed => {
                        tracing::info!("Pipeline {} completed", id);
                        Ok(None)
                    }
                    _ => Ok(None),
                }
            }
            (PipelineStatus::Running, Some(stage)) if state.result_for(stage).is_none() => {
                Ok(Some(stage))
            }
            _ => {
                tracing::debug!("Pipeline {} has nothing to dispatch ({})", id, state.status);
                Ok(None)
            }
        }
    }

    /// Execute one stage with retries and commit its outcome
    async fn run_stage(&self, id: Uuid, stage: AgentStage) -> Result<StageOutcome> {
        let state = self.pipelines.get(id).await?;

        let session = match self.sessions.get_session(state.session_id).await {
            Ok(session) => session,
            Err(err) if err.is_not_found() => {
                let message = format!("session {} no longer exists", state.session_id);
                return self.escalate(id, None, message, String::new()).await;
            }
            Err(err) => return Err(err),
        };

        let Some(runner) = self.agents.get(stage) else {
            let message = format!("no agent runner registered for stage {}", stage);
            return self.escalate(id, Some(stage), message, String::new()).await;
        };

        tracing::info!("Dispatching stage {} of pipeline {}", stage, id);

        let started_at = Utc::now();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let request = build_request(&state, &session, stage, attempt);

            let err = match self.attempt(runner.as_ref(), request).await {
                Ok(output) => {
                    return self
                        .record_success(id, stage, output, attempt, started_at)
                        .await;
                }
                Err(err) => err,
            };

            let recoverable = classify::classify(&err);
            if recoverable && attempt <= self.policy.max_stage_retries {
                let delay = self.policy.backoff_for(attempt);
                let details = format!(
                    "attempt {} failed, retrying in {:?}: {}",
                    attempt, delay, err.details
                );
                self.error_log
                    .log(id, Some(stage), &err.message, &details, true)
                    .await?;
                tokio::time::sleep(delay).await;
                continue;
            }

            let message = if recoverable {
                format!("{} (gave up after {} attempts)", err.message, attempt)
            } else {
                err.message
            };
            return self.escalate(id, Some(stage), message, err.details).await;
        }
    }

    /// One bounded agent call
    async fn attempt(
        &self,
        runner: &dyn AgentRunner,
        request: AgentRequest,
    ) -> std::result::Result<AgentOutput, AgentError> {
        let limit = self.policy.stage_timeout;
        tokio::time::timeout(limit, runner.run(request))
            .await
            .unwrap_or_else(|_| {
                Err(AgentError::new(format!(
                    "timeout error: stage did not finish within {:?}",
                    limit
                )))
            })
    }

    async fn record_success(
        &self,
        id: Uuid,
        stage: AgentStage,
        output: AgentOutput,
        attempts: u32,
        started_at: chrono::DateTime<Utc>,
    ) -> Result<StageOutcome> {
        let completed_at = Utc::now();
        let artifacts: Vec<Artifact> = output
            .artifacts
            .into_iter()
            .map(|draft| draft.into_artifact(completed_at))
            .collect();
        let result = AgentResult {
            output: output.output,
            attempts,
            artifacts: artifacts.iter().map(|a| a.id).collect(),
            started_at,
            completed_at,
        };

        let gate = match output.requires_approval {
            Some(gate_type) => Some(self.approvals.prepare_gate(id, gate_type).await?),
            None => None,
        };

        let outcome = self
            .pipelines
            .update(id, |s| Ok(s.complete_stage(stage, result, artifacts, gate)?))
            .await?;

        tracing::info!(
            "Stage {} of pipeline {} succeeded after {} attempt(s)",
            stage,
            id,
            attempts
        );
        Ok(outcome)
    }

    /// Record a fatal failure and fail the pipeline
    async fn escalate(
        &self,
        id: Uuid,
        agent: Option<AgentStage>,
        message: String,
        details: String,
    ) -> Result<StageOutcome> {
        let error_log_id = self
            .error_log
            .log(id, agent, &message, &details, false)
            .await?;

        let mut failure = PipelineFailure::new(message).with_error_log(error_log_id);
        if let Some(agent) = agent {
            failure = failure.with_agent(agent);
        }
        self.pipelines.update(id, |s| Ok(s.fail(failure)?)).await?;

        tracing::info!("Pipeline {} failed", id);
        Ok(StageOutcome::Failed)
    }

    /// Handle a driver that stopped on an error
    async fn abort(&self, id: Uuid, err: OrchestratorError) {
        match err {
            OrchestratorError::InvalidTransition(_) | OrchestratorError::InvalidState(_) => {
                tracing::warn!("Pipeline {} driver stopped: {}", id, err);
            }
            err => {
                tracing::error!("Pipeline {} driver failed: {}", id, err);
                let message = format!("pipeline dispatch aborted: {}", err);
                if let Err(err) = self.escalate(id, None, message, String::new()).await {
                    tracing::error!("Could not mark pipeline {} as failed: {}", id, err);
                }
            }
        }
    }
}

fn build_request(
    state: &PipelineState,
    session: &Session,
    stage: AgentStage,
    attempt: u32,
) -> AgentRequest {
    AgentRequest {
        pipeline_id: state.id,
        session_id: session.id,
        repository_url: session.repository_url.clone(),
        mode: state.mode,
        stage,
        attempt,
        artifacts: state.artifacts.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use crate::repository::{
        ErrorLogRepository, GateRepository, KvHandle, SessionRepository,
    };
    use async_trait::async_trait;
    use shipyard_core::domain::{ApprovalDecision, ArtifactDraft, ArtifactType, GateType};
    use shipyard_core::dto::session::CreateSession;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Runner driven by a closure over (stage, attempt)
    struct ScriptedRunner<F> {
        script: F,
        calls: AtomicU32,
    }

    impl<F> ScriptedRunner<F>
    where
        F: Fn(AgentStage, u32) -> std::result::Result<AgentOutput, AgentError> + Send + Sync,
    {
        fn new(script: F) -> Arc<Self> {
            Arc::new(Self {
                script,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl<F> AgentRunner for ScriptedRunner<F>
    where
        F: Fn(AgentStage, u32) -> std::result::Result<AgentOutput, AgentError> + Send + Sync,
    {
        async fn run(&self, request: AgentRequest) -> std::result::Result<AgentOutput, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.script)(request.stage, request.attempt)
        }
    }

    /// Runner that never answers
    struct StalledRunner;

    #[async_trait]
    impl AgentRunner for StalledRunner {
        async fn run(&self, _request: AgentRequest) -> std::result::Result<AgentOutput, AgentError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(AgentOutput::default())
        }
    }

    /// Runner whose first attempt fails with a network error and whose
    /// retries wait for `release` before succeeding
    struct HeldRetryRunner {
        calls: AtomicU32,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl AgentRunner for HeldRetryRunner {
        async fn run(&self, request: AgentRequest) -> std::result::Result<AgentOutput, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.attempt == 1 {
                return Err(AgentError::new("network error: connection reset"));
            }
            self.release.notified().await;
            succeed(request.stage, request.attempt)
        }
    }

    fn policy(max_stage_retries: u32) -> DispatchPolicy {
        DispatchPolicy {
            stage_timeout: Duration::from_millis(200),
            max_stage_retries,
            retry_backoff: Duration::from_millis(1),
        }
    }

    fn orchestrator(agents: AgentRegistry, policy: DispatchPolicy) -> Orchestrator {
        let kv = KvHandle::new(Arc::new(MemoryKv::new()), Duration::from_secs(1));
        let pipelines = PipelineRepository::new(kv.clone());
        let error_log = ErrorLogService::new(ErrorLogRepository::new(kv.clone()));
        let approvals = ApprovalService::new(
            pipelines.clone(),
            GateRepository::new(kv.clone()),
            error_log.clone(),
        );
        let sessions = SessionService::new(SessionRepository::new(kv));
        Orchestrator::new(pipelines, sessions, approvals, error_log, agents, policy)
    }

    async fn start(orchestrator: &Orchestrator, mode: &str) -> Uuid {
        let session = orchestrator
            .sessions
            .create_session(CreateSession {
                repository_url: "https://github.com/acme/widget".to_string(),
            })
            .await
            .unwrap();
        let state = orchestrator
            .start_pipeline(StartPipeline {
                session_id: session.id,
                mode: mode.to_string(),
            })
            .await
            .unwrap();
        assert_eq!(state.status, PipelineStatus::Initializing);
        state.id
    }

    /// Poll until `done` holds for the stored record
    async fn wait_for<P>(orchestrator: &Orchestrator, id: Uuid, done: P) -> PipelineState
    where
        P: Fn(&PipelineState) -> bool,
    {
        for _ in 0..500 {
            let state = orchestrator.get_pipeline(id).await.unwrap();
            if done(&state) {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("pipeline {} did not reach the expected state", id);
    }

    fn succeed(stage: AgentStage, _attempt: u32) -> std::result::Result<AgentOutput, AgentError> {
        let artifact_type = match stage {
            AgentStage::Analyze => ArtifactType::Analysis,
            AgentStage::Docs => ArtifactType::Readme,
            AgentStage::Demo => ArtifactType::DemoUrl,
            AgentStage::Pitch => ArtifactType::PitchDeck,
            AgentStage::Supervisor => ArtifactType::PullRequest,
        };
        Ok(AgentOutput::default().with_artifact(ArtifactDraft::new(
            artifact_type,
            stage.to_string(),
            "content",
        )))
    }

    #[tokio::test]
    async fn test_hackathon_runs_every_stage() {
        let runner = ScriptedRunner::new(succeed);
        let orchestrator = orchestrator(AgentRegistry::uniform(runner.clone()), policy(0));
        let id = start(&orchestrator, "hackathon").await;

        let state = wait_for(&orchestrator, id, |s| s.is_terminal()).await;

        assert_eq!(state.status, PipelineStatus::Completed);
        assert!(state.agent_results.values().all(|r| r.is_some()));
        assert_eq!(state.artifacts.len(), 5);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 5);
        assert!(state.timestamps.contains_key("completed"));
        assert!(state.invariant_violation().is_none());
    }

    #[tokio::test]
    async fn test_refactor_skips_demo_and_pitch() {
        let runner = ScriptedRunner::new(succeed);
        let orchestrator = orchestrator(AgentRegistry::uniform(runner.clone()), policy(0));
        let id = start(&orchestrator, "refactor").await;

        let state = wait_for(&orchestrator, id, |s| s.is_terminal()).await;

        assert_eq!(state.status, PipelineStatus::Completed);
        assert!(state.result_for(AgentStage::Demo).is_none());
        assert!(state.result_for(AgentStage::Pitch).is_none());
        assert!(state.result_for(AgentStage::Supervisor).is_some());
        assert_eq!(runner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unknown_mode_is_rejected() {
        let orchestrator = orchestrator(AgentRegistry::new(), policy(0));
        let err = orchestrator
            .start_pipeline(StartPipeline {
                session_id: Uuid::new_v4(),
                mode: "speedrun".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let orchestrator = orchestrator(AgentRegistry::new(), policy(0));
        let err = orchestrator
            .start_pipeline(StartPipeline {
                session_id: Uuid::new_v4(),
                mode: "hackathon".to_string(),
            })
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_docs_gate_suspends_until_approved() {
        let runner = ScriptedRunner::new(|stage, attempt| {
            let output = succeed(stage, attempt)?;
            Ok(match stage {
                AgentStage::Docs => output.requiring_approval(GateType::Docs),
                _ => output,
            })
        });
        let orchestrator = orchestrator(AgentRegistry::uniform(runner.clone()), policy(0));
        let id = start(&orchestrator, "hackathon").await;

        let state = wait_for(&orchestrator, id, |s| {
            s.status == PipelineStatus::WaitingApproval
        })
        .await;
        let gate = state.pending_gate().unwrap().clone();
        assert_eq!(gate.stage, AgentStage::Docs);
        assert_eq!(gate.artifacts.len(), 1);
        assert!(state.result_for(AgentStage::Demo).is_none());
        assert_eq!(runner.calls.load(Ordering::SeqCst), 2);

        let resolved = orchestrator
            .respond_to_approval(
                gate.id,
                RespondToApproval {
                    decision: ApprovalDecision::Approved,
                    feedback: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(resolved.pipeline_status, PipelineStatus::Running);

        let state = wait_for(&orchestrator, id, |s| s.is_terminal()).await;
        assert_eq!(state.status, PipelineStatus::Completed);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_rejection_fails_pipeline() {
        let runner = ScriptedRunner::new(|stage, attempt| {
            let output = succeed(stage, attempt)?;
            Ok(match stage {
                AgentStage::Docs => output.requiring_approval(GateType::Docs),
                _ => output,
            })
        });
        let orchestrator = orchestrator(AgentRegistry::uniform(runner.clone()), policy(0));
        let id = start(&orchestrator, "placement").await;

        let state = wait_for(&orchestrator, id, |s| {
            s.status == PipelineStatus::WaitingApproval
        })
        .await;
        let gate_id = state.pending_gate().unwrap().id;

        orchestrator
            .respond_to_approval(
                gate_id,
                RespondToApproval {
                    decision: ApprovalDecision::Rejected,
                    feedback: Some("README is missing setup steps".to_string()),
                },
            )
            .await
            .unwrap();

        let state = orchestrator.get_pipeline(id).await.unwrap();
        assert_eq!(state.status, PipelineStatus::Failed);
        let error = state.error.unwrap();
        assert_eq!(error.gate_id, Some(gate_id));

        let errors = orchestrator.pipeline_errors(id).await.unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(Some(errors[0].id), error.error_log_id);

        // Nothing else is dispatched after the rejection
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let runner = ScriptedRunner::new(|stage, attempt| {
            if stage == AgentStage::Analyze && attempt < 3 {
                return Err(AgentError::new("network error: connection reset"));
            }
            succeed(stage, attempt)
        });
        let orchestrator = orchestrator(AgentRegistry::uniform(runner.clone()), policy(3));
        let id = start(&orchestrator, "refactor").await;

        let state = wait_for(&orchestrator, id, |s| s.is_terminal()).await;

        assert_eq!(state.status, PipelineStatus::Completed);
        assert_eq!(state.result_for(AgentStage::Analyze).unwrap().attempts, 3);

        let errors = orchestrator.pipeline_errors(id).await.unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.recoverable));
        assert!(errors.iter().all(|e| e.agent == Some(AgentStage::Analyze)));
    }

    #[tokio::test]
    async fn test_pipeline_stays_running_while_retry_pending() {
        let runner = Arc::new(HeldRetryRunner {
            calls: AtomicU32::new(0),
            release: tokio::sync::Notify::new(),
        });
        let orchestrator = orchestrator(
            AgentRegistry::new().with_runner(AgentStage::Analyze, runner.clone()),
            DispatchPolicy {
                stage_timeout: Duration::from_secs(5),
                ..policy(3)
            },
        );
        let id = start(&orchestrator, "refactor").await;

        for _ in 0..500 {
            if runner.calls.load(Ordering::SeqCst) >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(runner.calls.load(Ordering::SeqCst), 2);

        // Second attempt in flight: the failed first one left no mark on the record
        let state = orchestrator.get_pipeline(id).await.unwrap();
        assert_eq!(state.status, PipelineStatus::Running);
        assert_eq!(state.current_agent, Some(AgentStage::Analyze));
        assert!(state.error.is_none());
        assert!(state.result_for(AgentStage::Analyze).is_none());

        let errors = orchestrator.pipeline_errors(id).await.unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].recoverable);

        runner.release.notify_one();
        let state = wait_for(&orchestrator, id, |s| {
            s.result_for(AgentStage::Analyze).is_some() || s.is_terminal()
        })
        .await;
        assert_eq!(state.result_for(AgentStage::Analyze).unwrap().attempts, 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_pipeline() {
        let runner = ScriptedRunner::new(|_, _| Err(AgentError::new("rate limit exceeded")));
        let orchestrator = orchestrator(AgentRegistry::uniform(runner.clone()), policy(2));
        let id = start(&orchestrator, "hackathon").await;

        let state = wait_for(&orchestrator, id, |s| s.is_terminal()).await;

        assert_eq!(state.status, PipelineStatus::Failed);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 3);

        let errors = orchestrator.pipeline_errors(id).await.unwrap();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors.iter().filter(|e| e.recoverable).count(), 2);

        let error = state.error.unwrap();
        assert_eq!(error.agent, Some(AgentStage::Analyze));
        assert_eq!(error.error_log_id, Some(errors[2].id));
        assert!(!errors[2].recoverable);
    }

    #[tokio::test]
    async fn test_fatal_failure_is_not_retried() {
        let runner = ScriptedRunner::new(|stage, attempt| {
            if stage == AgentStage::Docs {
                return Err(AgentError::new("repository has no source files"));
            }
            succeed(stage, attempt)
        });
        let orchestrator = orchestrator(AgentRegistry::uniform(runner.clone()), policy(3));
        let id = start(&orchestrator, "hackathon").await;

        let state = wait_for(&orchestrator, id, |s| s.is_terminal()).await;

        assert_eq!(state.status, PipelineStatus::Failed);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 2);
        assert!(state.result_for(AgentStage::Analyze).is_some());
        assert_eq!(state.error.unwrap().agent, Some(AgentStage::Docs));
        assert_eq!(orchestrator.pipeline_errors(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stalled_stage_times_out() {
        let agents = AgentRegistry::uniform(Arc::new(StalledRunner));
        let orchestrator = orchestrator(
            agents,
            DispatchPolicy {
                stage_timeout: Duration::from_millis(20),
                ..policy(0)
            },
        );
        let id = start(&orchestrator, "refactor").await;

        let state = wait_for(&orchestrator, id, |s| s.is_terminal()).await;

        assert_eq!(state.status, PipelineStatus::Failed);
        assert!(state.error.unwrap().message.contains("timeout"));
    }

    #[tokio::test]
    async fn test_missing_runner_fails_pipeline() {
        let runner = ScriptedRunner::new(succeed);
        let agents = AgentRegistry::new().with_runner(AgentStage::Analyze, runner);
        let orchestrator = orchestrator(agents, policy(0));
        let id = start(&orchestrator, "refactor").await;

        let state = wait_for(&orchestrator, id, |s| s.is_terminal()).await;

        assert_eq!(state.status, PipelineStatus::Failed);
        let error = state.error.unwrap();
        assert_eq!(error.agent, Some(AgentStage::Docs));
        assert!(error.message.contains("no agent runner"));
    }

    #[tokio::test]
    async fn test_errors_of_unknown_pipeline() {
        let orchestrator = orchestrator(AgentRegistry::new(), policy(0));
        let err = orchestrator.pipeline_errors(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = DispatchPolicy::from(&Config::default());
        assert_eq!(policy.backoff_for(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(3), Duration::from_secs(4));
        assert_eq!(policy.backoff_for(20), MAX_RETRY_BACKOFF);
    }
}
