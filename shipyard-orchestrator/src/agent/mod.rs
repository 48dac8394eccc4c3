//! Agent runners
//!
//! The work of each stage (analysis, docs, demo deployment, pitch building,
//! supervision) is done by external agent runners. The orchestrator only
//! sees this trait: hand over an `AgentRequest`, get an `AgentOutput` or an
//! `AgentError` whose text decides whether the attempt is retried.

mod http;

pub use http::HttpAgentRunner;

use async_trait::async_trait;
use shipyard_core::domain::AgentStage;
use shipyard_core::dto::agent::{AgentOutput, AgentRequest};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by an agent runner
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AgentError {
    pub message: String,
    pub details: String,
}

impl AgentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: String::new(),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }
}

/// Executes one stage attempt
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(&self, request: AgentRequest) -> Result<AgentOutput, AgentError>;
}

/// Stage → runner dispatch table
#[derive(Clone, Default)]
pub struct AgentRegistry {
    runners: HashMap<AgentStage, Arc<dyn AgentRunner>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same runner for every stage
    pub fn uniform(runner: Arc<dyn AgentRunner>) -> Self {
        let runners = AgentStage::ALL
            .into_iter()
            .map(|stage| (stage, Arc::clone(&runner)))
            .collect();
        Self { runners }
    }

    pub fn with_runner(mut self, stage: AgentStage, runner: Arc<dyn AgentRunner>) -> Self {
        self.runners.insert(stage, runner);
        self
    }

    pub fn get(&self, stage: AgentStage) -> Option<Arc<dyn AgentRunner>> {
        self.runners.get(&stage).cloned()
    }
}
