//! Approval API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use shipyard_core::dto::approval::{ApprovalResolved, RespondToApproval};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// POST /approval/{gate_id}/respond
/// Approve or reject a pending gate
pub async fn respond_to_approval(
    State(state): State<AppState>,
    Path(gate_id): Path<Uuid>,
    Json(req): Json<RespondToApproval>,
) -> ApiResult<Json<ApprovalResolved>> {
    tracing::info!("Response to approval gate {}: {:?}", gate_id, req.decision);
    let resolved = state.orchestrator.respond_to_approval(gate_id, req).await?;
    Ok(Json(resolved))
}
