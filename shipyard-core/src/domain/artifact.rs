//! Artifact domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Output object produced by a stage. Never mutated after it is appended
/// to a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactType {
    Analysis,
    Readme,
    ApiDocs,
    DemoUrl,
    ArchitectureDiagram,
    PitchDeck,
    PitchScript,
    PullRequest,
}

/// Artifact as reported by an agent, before the orchestrator stamps it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDraft {
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl ArtifactDraft {
    pub fn new(artifact_type: ArtifactType, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            artifact_type,
            title: title.into(),
            content: content.into(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Materialize into an immutable artifact with a fresh id
    pub fn into_artifact(self, created_at: chrono::DateTime<chrono::Utc>) -> Artifact {
        Artifact {
            id: Uuid::new_v4(),
            artifact_type: self.artifact_type,
            title: self.title,
            content: self.content,
            metadata: self.metadata,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&ArtifactType::ApiDocs).unwrap(),
            "\"api-docs\""
        );
        assert_eq!(
            serde_json::to_string(&ArtifactType::ArchitectureDiagram).unwrap(),
            "\"architecture-diagram\""
        );
    }

    #[test]
    fn test_draft_into_artifact() {
        let now = chrono::Utc::now();
        let artifact = ArtifactDraft::new(ArtifactType::Analysis, "Report", "# Findings")
            .into_artifact(now);

        assert_eq!(artifact.artifact_type, ArtifactType::Analysis);
        assert_eq!(artifact.title, "Report");
        assert_eq!(artifact.created_at, now);
    }
}
