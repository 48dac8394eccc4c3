//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod approval;
pub mod error;
pub mod health;
pub mod pipeline;
pub mod session;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::service::{Orchestrator, SessionService, StreamPublisher};

/// Services shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionService,
    pub orchestrator: Orchestrator,
    pub streams: StreamPublisher,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Session endpoints
        .route("/session/create", post(session::create_session))
        .route("/session/{id}", get(session::get_session))
        // Pipeline endpoints
        .route("/pipeline/start", post(pipeline::start_pipeline))
        .route("/pipeline/{id}", get(pipeline::get_pipeline))
        .route("/pipeline/{id}/errors", get(pipeline::list_errors))
        .route("/pipeline/{id}/stream", get(pipeline::stream_pipeline))
        // Approval endpoints
        .route(
            "/approval/{gate_id}/respond",
            post(approval::respond_to_approval),
        )
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
