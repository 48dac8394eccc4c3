//! HTTP agent runner
//!
//! Posts the stage request to `{base_url}/{stage}` and expects an
//! `AgentOutput` JSON body back. Transport failures are described with the
//! wording the failure classifier treats as transient.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use shipyard_core::dto::agent::{AgentOutput, AgentRequest};
use std::time::Duration;
use tracing::debug;

use super::{AgentError, AgentRunner};

#[derive(Debug, Clone)]
pub struct HttpAgentRunner {
    base_url: String,
    client: Client,
}

impl HttpAgentRunner {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let base_url = base_url.into();
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl AgentRunner for HttpAgentRunner {
    async fn run(&self, request: AgentRequest) -> Result<AgentOutput, AgentError> {
        let url = format!("{}/{}", self.base_url, request.stage);
        debug!("Dispatching {} attempt {} to {}", request.stage, request.attempt, url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(describe_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(describe_status(status).with_details(body));
        }

        response.json::<AgentOutput>().await.map_err(|e| {
            AgentError::new("agent returned a malformed response").with_details(e.to_string())
        })
    }
}

fn describe_transport_error(err: reqwest::Error) -> AgentError {
    let message = if err.is_timeout() {
        "timeout error: agent did not respond in time"
    } else if err.is_connect() || err.is_request() {
        "network error: agent unreachable"
    } else {
        "agent request failed"
    };
    AgentError::new(message).with_details(err.to_string())
}

fn describe_status(status: StatusCode) -> AgentError {
    let message = match status {
        StatusCode::TOO_MANY_REQUESTS => "rate limit exceeded".to_string(),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            format!("auth failed (status {})", status.as_u16())
        }
        StatusCode::GATEWAY_TIMEOUT | StatusCode::REQUEST_TIMEOUT => {
            format!("timeout error (status {})", status.as_u16())
        }
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => {
            format!("network error (status {})", status.as_u16())
        }
        _ => format!("agent failed with status {}", status.as_u16()),
    };
    AgentError::new(message)
}
