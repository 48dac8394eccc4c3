//! Stream events
//!
//! Transient events pushed to observing clients as a text event stream.
//! Each event is framed as one `data: <JSON>\n\n` line; the JSON is
//! `{type, data, timestamp}` with `timestamp` in milliseconds since the
//! Unix epoch.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::pipeline::{PipelineState, PipelineStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PipelineStarted,
    AgentStarted,
    AgentProgress,
    AgentCompleted,
    AgentFailed,
    ArtifactGenerated,
    ApprovalRequired,
    PipelineCompleted,
    PipelineFailed,
    Error,
}

impl EventType {
    /// Whether this event ends a subscription
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventType::PipelineCompleted | EventType::PipelineFailed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub data: serde_json::Value,
    pub timestamp: i64,
}

impl StreamEvent {
    pub fn new(event_type: EventType, data: serde_json::Value, timestamp: i64) -> Self {
        Self {
            event_type,
            data,
            timestamp,
        }
    }

    /// `{id, mode, status}`
    pub fn pipeline_started(state: &PipelineState, timestamp: i64) -> Self {
        let data = json!({
            "id": state.id,
            "mode": state.mode,
            "status": state.status,
        });
        Self::new(EventType::PipelineStarted, data, timestamp)
    }

    /// Full progress projection, sent on every sampling tick
    pub fn agent_progress(state: &PipelineState, timestamp: i64) -> Self {
        let data = json!({
            "status": state.status,
            "currentAgent": state.current_agent,
            "agentResults": state.agent_results,
            "artifacts": state.artifacts,
            "approvalGates": state.approval_gates,
        });
        Self::new(EventType::AgentProgress, data, timestamp)
    }

    /// `pipeline_completed` or `pipeline_failed`, or `None` while the
    /// pipeline is still live
    pub fn terminal(state: &PipelineState, timestamp: i64) -> Option<Self> {
        let event_type = match state.status {
            PipelineStatus::Completed => EventType::PipelineCompleted,
            PipelineStatus::Failed => EventType::PipelineFailed,
            _ => return None,
        };
        let data = json!({
            "status": state.status,
            "artifacts": state.artifacts,
            "error": state.error,
        });
        Some(Self::new(event_type, data, timestamp))
    }

    pub fn error(message: impl Into<String>, timestamp: i64) -> Self {
        Self::new(
            EventType::Error,
            json!({ "message": message.into() }),
            timestamp,
        )
    }

    /// Parse the payload of a `data:` line
    pub fn from_sse_data(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data.trim())
    }
}

/// Millisecond clock that never runs backwards within one subscription
#[derive(Debug, Default)]
pub struct EventClock {
    last: i64,
}

impl EventClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&mut self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis().max(1);
        self.last = self.last.max(now);
        self.last
    }
}
