//! Session API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use shipyard_core::domain::Session;
use shipyard_core::dto::session::CreateSession;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// POST /session/create
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSession>,
) -> ApiResult<Json<Session>> {
    tracing::debug!("Creating session for {}", req.repository_url);
    let session = state.sessions.create_session(req).await?;
    Ok(Json(session))
}

/// GET /session/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Session>> {
    let session = state.sessions.get_session(id).await?;
    Ok(Json(session))
}
