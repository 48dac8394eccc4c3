//! Pipeline API Handlers
//!
//! HTTP endpoints for starting pipelines, reading their state and error
//! log, and streaming their progress as server-sent events.

use axum::{
    Json,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use shipyard_core::domain::PipelineState;
use shipyard_core::dto::error_log::ErrorLogView;
use shipyard_core::dto::pipeline::{PipelineStarted, StartPipeline};
use std::convert::Infallible;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// POST /pipeline/start
pub async fn start_pipeline(
    State(state): State<AppState>,
    Json(req): Json<StartPipeline>,
) -> ApiResult<Json<PipelineStarted>> {
    tracing::info!("Starting {} pipeline for session {}", req.mode, req.session_id);
    let pipeline = state.orchestrator.start_pipeline(req).await?;
    Ok(Json(PipelineStarted {
        pipeline_id: pipeline.id,
    }))
}

/// GET /pipeline/{id}
pub async fn get_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PipelineState>> {
    tracing::debug!("Getting pipeline: {}", id);
    let pipeline = state.orchestrator.get_pipeline(id).await?;
    Ok(Json(pipeline))
}

/// GET /pipeline/{id}/errors
pub async fn list_errors(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<ErrorLogView>>> {
    let entries = state.orchestrator.pipeline_errors(id).await?;
    Ok(Json(entries.into_iter().map(ErrorLogView::from).collect()))
}

/// GET /pipeline/{id}/stream
/// Progress events as `text/event-stream`
pub async fn stream_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let rx = state.streams.subscribe(id).await?;
    tracing::info!("Client subscribed to pipeline {}", id);

    let events = ReceiverStream::new(rx).filter_map(|event| async move {
        match serde_json::to_string(&event) {
            Ok(json) => Some(Ok(Event::default().data(json))),
            Err(err) => {
                tracing::error!("Dropping unserializable stream event: {}", err);
                None
            }
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
