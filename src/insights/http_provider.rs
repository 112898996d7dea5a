//! Financial analysis service reached over plain HTTP.
//!
//! The request is POSTed as JSON and the JSON response body becomes the
//! provider payload unchanged.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::provider::{InsightProvider, InsightsRequest, ProviderError, ProviderKind};

pub struct HttpAnalysisProvider {
    id: String,
    client: Client,
    url: String,
    api_key: Option<String>,
    timeout: Option<Duration>,
}

impl HttpAnalysisProvider {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            client: Client::new(),
            url: url.into(),
            api_key: None,
            timeout: None,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl InsightProvider for HttpAnalysisProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Financial
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn analyze(&self, request: &InsightsRequest) -> Result<serde_json::Value, ProviderError> {
        debug!(provider = %self.id, url = %self.url, "Requesting financial analysis");

        let mut req_builder = self.client.post(&self.url).json(request);
        if let Some(api_key) = &self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Connection(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Body is not JSON: {}", e)))
    }
}
