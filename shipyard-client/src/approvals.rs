//! Approval gate endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use shipyard_core::domain::ApprovalDecision;
use shipyard_core::dto::approval::{ApprovalResolved, RespondToApproval};
use uuid::Uuid;

impl OrchestratorClient {
    /// Approve or reject a pending gate
    ///
    /// A gate accepts exactly one response; answering it again fails with a
    /// conflict (`ClientError::is_conflict`).
    pub async fn respond_to_approval(
        &self,
        gate_id: Uuid,
        decision: ApprovalDecision,
        feedback: Option<String>,
    ) -> Result<ApprovalResolved> {
        let url = format!("{}/approval/{}/respond", self.base_url, gate_id);
        let req = RespondToApproval { decision, feedback };
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }
}
