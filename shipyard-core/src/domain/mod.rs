//! Core domain types
//!
//! This module contains the core domain structures used across Shipyard services.
//! These types represent the pipeline record and everything it owns, and are
//! shared between the orchestrator (persistence and dispatch) and clients.

pub mod approval;
pub mod artifact;
pub mod error_log;
pub mod pipeline;
pub mod session;
pub mod stage;

pub use approval::{ApprovalDecision, ApprovalGate, GateRequest, GateStatus, GateType};
pub use artifact::{Artifact, ArtifactDraft, ArtifactType};
pub use error_log::ErrorLog;
pub use pipeline::{
    AgentResult, PipelineFailure, PipelineState, PipelineStatus, StageOutcome, TransitionError,
};
pub use session::Session;
pub use stage::{AgentStage, Mode};
