//! Pipeline endpoints

use async_stream::stream;
use futures::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use shipyard_core::domain::PipelineState;
use shipyard_core::dto::error_log::ErrorLogView;
use shipyard_core::dto::pipeline::{PipelineStarted, StartPipeline};
use shipyard_core::event::StreamEvent;
use std::pin::Pin;
use uuid::Uuid;

use crate::OrchestratorClient;
use crate::error::{ClientError, Result};
use crate::sse::SseDecoder;

/// Events of one pipeline subscription, ending after the terminal event
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

impl OrchestratorClient {
    // =============================================================================
    // Pipeline Management
    // =============================================================================

    /// Start a pipeline for a session
    ///
    /// # Arguments
    /// * `session_id` - Session owning the run
    /// * `mode` - One of `hackathon`, `placement`, `refactor`
    ///
    /// # Returns
    /// The new pipeline id
    pub async fn start_pipeline(&self, session_id: Uuid, mode: impl Into<String>) -> Result<Uuid> {
        let url = format!("{}/pipeline/start", self.base_url);
        let req = StartPipeline {
            session_id,
            mode: mode.into(),
        };
        let response = self.client.post(&url).json(&req).send().await?;

        let started: PipelineStarted = self.handle_response(response).await?;
        Ok(started.pipeline_id)
    }

    /// Get the current state of a pipeline
    pub async fn get_pipeline(&self, pipeline_id: Uuid) -> Result<PipelineState> {
        let url = format!("{}/pipeline/{}", self.base_url, pipeline_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Error log of a pipeline, oldest first
    pub async fn list_errors(&self, pipeline_id: Uuid) -> Result<Vec<ErrorLogView>> {
        let url = format!("{}/pipeline/{}/errors", self.base_url, pipeline_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Event Stream
    // =============================================================================

    /// Subscribe to a pipeline's progress events
    ///
    /// The stream yields `pipeline_started`, then `agent_progress` on every
    /// server tick, and ends after `pipeline_completed` or
    /// `pipeline_failed`. If the connection drops first, the last item is a
    /// `ClientError::StreamError`.
    pub async fn stream_pipeline(&self, pipeline_id: Uuid) -> Result<EventStream> {
        let url = format!("{}/pipeline/{}/stream", self.base_url, pipeline_id);
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = self.check_status(response).await?;

        tracing::debug!("Subscribed to pipeline {}", pipeline_id);

        let mut bytes = response.bytes_stream();
        let events = stream! {
            let mut decoder = SseDecoder::new();
            let mut finished = false;

            'chunks: while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        yield Err(ClientError::RequestFailed(err));
                        finished = true;
                        break 'chunks;
                    }
                };

                for event in decoder.push(&chunk) {
                    let terminal = event.as_ref().is_ok_and(|e| e.event_type.is_terminal());
                    yield event;
                    if terminal {
                        finished = true;
                        break 'chunks;
                    }
                }
            }

            if !finished {
                yield Err(ClientError::StreamError(
                    "stream closed before the pipeline finished".to_string(),
                ));
            }
        };

        Ok(Box::pin(events))
    }
}
