//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own pipeline, alert sink and
//! run log, listening on a random port.

use super::constants::*;
use async_trait::async_trait;
use royalty_analytics::insights::{
    InsightAggregator, InsightProvider, InsightsRequest, InsightsService, ProviderError,
    ProviderKind,
};
use royalty_analytics::royalties::{
    AnalyticsTables, FixedNoise, InMemoryAlertSink, RoyaltyPipeline, RunLog,
};
use royalty_analytics::server::{make_app, RequestsLoggingLevel, ServerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Provider with a canned answer, optionally delayed.
pub struct StubProvider {
    pub id: &'static str,
    pub kind: ProviderKind,
    pub delay: Duration,
    pub answer: Option<serde_json::Value>,
}

impl StubProvider {
    pub fn narrative(id: &'static str, text: &str) -> Self {
        Self {
            id,
            kind: ProviderKind::Narrative,
            delay: Duration::ZERO,
            answer: Some(serde_json::Value::String(text.to_string())),
        }
    }

    pub fn financial(id: &'static str, answer: serde_json::Value) -> Self {
        Self {
            id,
            kind: ProviderKind::Financial,
            delay: Duration::ZERO,
            answer: Some(answer),
        }
    }

    pub fn failing(id: &'static str) -> Self {
        Self {
            id,
            kind: ProviderKind::Financial,
            delay: Duration::ZERO,
            answer: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl InsightProvider for StubProvider {
    fn id(&self) -> &str {
        self.id
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn analyze(&self, _request: &InsightsRequest) -> Result<serde_json::Value, ProviderError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.answer
            .clone()
            .ok_or_else(|| ProviderError::Connection("stub provider is down".to_string()))
    }
}

/// Test server instance with an isolated pipeline.
///
/// When dropped, the server shuts down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    // Keep the server alive until drop
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a server without insight providers.
    pub async fn spawn() -> Self {
        Self::spawn_with_providers(vec![], Duration::from_secs(5)).await
    }

    /// Spawns a server whose aggregator calls `providers` with the given
    /// default deadline.
    pub async fn spawn_with_providers(
        providers: Vec<Arc<dyn InsightProvider>>,
        provider_timeout: Duration,
    ) -> Self {
        let pipeline = Arc::new(RoyaltyPipeline::new(
            Arc::new(AnalyticsTables::default()),
            Arc::new(FixedNoise(1.0)),
            Arc::new(InMemoryAlertSink::new()),
            Arc::new(RunLog::new(64)),
        ));
        let aggregator = Arc::new(
            InsightAggregator::new(providers, provider_timeout)
                .expect("Failed to build insight aggregator"),
        );
        let insights = Arc::new(InsightsService::new(pipeline.clone(), aggregator));

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            port,
            metrics_port: 0,
        };
        let app = make_app(config, pipeline, insights);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            _shutdown_tx: Some(shutdown_tx),
        };
        server.wait_for_ready().await;
        server
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}
