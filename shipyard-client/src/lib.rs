//! Shipyard HTTP Client
//!
//! A simple, type-safe HTTP client for the Shipyard orchestrator API.
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use shipyard_client::OrchestratorClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = OrchestratorClient::new("http://localhost:8080");
//!
//!     let session = client.create_session("https://github.com/acme/widget").await?;
//!     let pipeline_id = client.start_pipeline(session.id, "hackathon").await?;
//!
//!     let mut events = client.stream_pipeline(pipeline_id).await?;
//!     while let Some(event) = events.next().await {
//!         println!("{:?}", event?.event_type);
//!     }
//!     Ok(())
//! }
//! ```

mod approvals;
pub mod error;
mod pipelines;
mod sessions;
pub mod sse;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use pipelines::EventStream;
pub use sse::SseDecoder;

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the Shipyard orchestrator API
///
/// Methods are organized into logical groups:
/// - Sessions (create, get)
/// - Pipelines (start, get, error log, event stream)
/// - Approval gates (respond)
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl OrchestratorClient {
    /// Create a new orchestrator client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the orchestrator API (e.g., "http://localhost:8080")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new orchestrator client with a custom HTTP client
    ///
    /// This allows you to configure proxies, TLS settings, etc. A total
    /// request timeout also applies to event streams, so leave it unset when
    /// streaming long pipelines.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Fail with `ClientError::ApiError` unless the response is a success
    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(response)
    }

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        self.check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = OrchestratorClient::new("http://localhost:8080");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = OrchestratorClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[tokio::test]
    async fn test_unreachable_orchestrator() {
        let client = OrchestratorClient::new("http://127.0.0.1:9");
        let err = client.get_pipeline(uuid::Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ClientError::RequestFailed(_)));
    }
}
