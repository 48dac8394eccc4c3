//! Error log domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::stage::AgentStage;

/// A recorded failure. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLog {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    /// `None` for system-level failures not attributed to an agent
    pub agent: Option<AgentStage>,
    pub message: String,
    pub details: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub recoverable: bool,
}

impl ErrorLog {
    /// New entry with a freshly generated id
    pub fn new(
        pipeline_id: Uuid,
        agent: Option<AgentStage>,
        message: impl Into<String>,
        details: impl Into<String>,
        recoverable: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipeline_id,
            agent,
            message: message.into(),
            details: details.into(),
            timestamp: chrono::Utc::now(),
            recoverable,
        }
    }

    /// Human-readable rendering
    pub fn format(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ErrorLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.recoverable { "Recoverable" } else { "Fatal" };
        let source = self
            .agent
            .map(|a| a.to_string())
            .unwrap_or_else(|| "system".to_string());

        write!(
            f,
            "[{}] {} {} error: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            verdict,
            source,
            self.message
        )?;
        if !self.details.is_empty() {
            write!(f, "\n  details: {}", self.details)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_recoverable() {
        let entry = ErrorLog::new(
            Uuid::new_v4(),
            Some(AgentStage::Demo),
            "network timeout",
            "deploy endpoint unreachable",
            true,
        );
        let text = entry.format();

        assert!(text.contains("Recoverable"));
        assert!(text.contains("network timeout"));
        assert!(text.contains("deploy endpoint unreachable"));
        assert!(text.contains("demo"));
    }

    #[test]
    fn test_format_fatal_system_error() {
        let entry = ErrorLog::new(Uuid::new_v4(), None, "store corrupted", "bad json", false);
        let text = entry.format();

        assert!(text.contains("Fatal"));
        assert!(!text.contains("Recoverable"));
        assert!(text.contains("system"));
        assert!(text.contains("bad json"));
    }

    #[test]
    fn test_identical_entries_get_distinct_ids() {
        let pipeline_id = Uuid::new_v4();
        let a = ErrorLog::new(pipeline_id, None, "same", "same", false);
        let b = ErrorLog::new(pipeline_id, None, "same", "same", false);
        assert_ne!(a.id, b.id);
    }
}
