//! Concurrent fan-out to insight providers.
//!
//! Every provider call runs in its own task under its own deadline. The
//! aggregator waits for all of them to settle and never fails as a whole: each
//! provider ends up fulfilled, rejected or timed out in the merged result.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use super::defaults::DefaultInsights;
use super::provider::{InsightProvider, InsightsRequest, ProviderKind, ProviderResult, ProviderStatus};
use crate::server::metrics;

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error, PartialEq)]
pub enum AggregatorError {
    #[error("Duplicate provider id: {0}")]
    DuplicateProvider(String),
}

/// Everything the providers produced, keyed by provider id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedInsights {
    /// `null` for providers that did not fulfill.
    pub payloads: BTreeMap<String, Option<serde_json::Value>>,
    pub statuses: BTreeMap<String, ProviderStatus>,
    pub results: Vec<ProviderResult>,
    pub defaults: DefaultInsights,
}

impl MergedInsights {
    /// Text produced by fulfilled narrative providers, in provider id order.
    pub fn narratives(&self) -> Vec<&str> {
        let mut results: Vec<&ProviderResult> = self
            .results
            .iter()
            .filter(|r| r.kind == ProviderKind::Narrative && r.status == ProviderStatus::Fulfilled)
            .collect();
        results.sort_by(|a, b| a.provider_id.cmp(&b.provider_id));
        results
            .into_iter()
            .filter_map(|r| r.payload.as_ref().and_then(narrative_text))
            .collect()
    }

    pub fn failed_providers(&self) -> Vec<&str> {
        self.statuses
            .iter()
            .filter(|(_, status)| **status != ProviderStatus::Fulfilled)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

/// Accepts either a bare string or an object with a `text` field.
fn narrative_text(payload: &serde_json::Value) -> Option<&str> {
    match payload {
        serde_json::Value::String(text) => Some(text.as_str()),
        other => other.get("text").and_then(|text| text.as_str()),
    }
    .filter(|text| !text.trim().is_empty())
}

pub struct InsightAggregator {
    providers: Vec<Arc<dyn InsightProvider>>,
    default_timeout: Duration,
}

impl InsightAggregator {
    pub fn new(
        providers: Vec<Arc<dyn InsightProvider>>,
        default_timeout: Duration,
    ) -> Result<Self, AggregatorError> {
        let mut seen = HashSet::new();
        for provider in &providers {
            if !seen.insert(provider.id().to_string()) {
                return Err(AggregatorError::DuplicateProvider(provider.id().to_string()));
            }
        }
        Ok(Self {
            providers,
            default_timeout,
        })
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn provider_ids(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    /// Calls every provider concurrently and waits until all of them have
    /// settled. Takes at most the longest provider deadline.
    pub async fn aggregate(&self, request: Arc<InsightsRequest>) -> MergedInsights {
        let calls = self.providers.iter().map(|provider| {
            let provider = Arc::clone(provider);
            let request = Arc::clone(&request);
            let deadline = provider.timeout().unwrap_or(self.default_timeout);
            self.call_provider(provider, request, deadline)
        });

        let results = join_all(calls).await;

        let mut payloads = BTreeMap::new();
        let mut statuses = BTreeMap::new();
        for result in &results {
            payloads.insert(result.provider_id.clone(), result.payload.clone());
            statuses.insert(result.provider_id.clone(), result.status);
        }

        MergedInsights {
            payloads,
            statuses,
            results,
            defaults: DefaultInsights::for_genre(&request.artist_genre),
        }
    }

    async fn call_provider(
        &self,
        provider: Arc<dyn InsightProvider>,
        request: Arc<InsightsRequest>,
        deadline: Duration,
    ) -> ProviderResult {
        let provider_id = provider.id().to_string();
        let kind = provider.kind();
        let started = Instant::now();

        // The timeout wraps the call inside the task so a timed out call is
        // dropped instead of left running.
        let task = tokio::spawn(async move {
            tokio::time::timeout(deadline, provider.analyze(&request)).await
        });

        let (status, payload, error) = match task.await {
            Ok(Ok(Ok(payload))) => (ProviderStatus::Fulfilled, Some(payload), None),
            Ok(Ok(Err(e))) => {
                warn!(provider = %provider_id, error = %e, "Insight provider failed");
                (ProviderStatus::Rejected, None, Some(e.to_string()))
            }
            Ok(Err(_)) => {
                warn!(
                    provider = %provider_id,
                    timeout_ms = deadline.as_millis() as u64,
                    "Insight provider timed out"
                );
                (
                    ProviderStatus::TimedOut,
                    None,
                    Some(format!("no response within {}ms", deadline.as_millis())),
                )
            }
            Err(e) => {
                warn!(provider = %provider_id, error = %e, "Insight provider task aborted");
                (ProviderStatus::Rejected, None, Some(format!("provider task failed: {}", e)))
            }
        };

        let elapsed = started.elapsed();
        metrics::record_provider_call(&provider_id, status.as_str(), elapsed);
        debug!(
            provider = %provider_id,
            status = status.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Insight provider settled"
        );

        ProviderResult {
            provider_id,
            kind,
            status,
            payload,
            error,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mock::{Behavior, MockProvider};
    use super::*;
    use serde_json::json;

    fn request() -> Arc<InsightsRequest> {
        Arc::new(InsightsRequest {
            artist_genre: "Pop".to_string(),
            ..Default::default()
        })
    }

    fn aggregator(providers: Vec<MockProvider>) -> InsightAggregator {
        let providers = providers
            .into_iter()
            .map(|p| Arc::new(p) as Arc<dyn InsightProvider>)
            .collect();
        InsightAggregator::new(providers, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_partial_failure() {
        let aggregator = aggregator(vec![
            MockProvider::new("market", Behavior::Succeed(json!({ "streams": 42 }))),
            MockProvider::new("broken", Behavior::Fail),
        ]);

        let merged = aggregator.aggregate(request()).await;

        assert_eq!(merged.statuses["market"], ProviderStatus::Fulfilled);
        assert_eq!(merged.statuses["broken"], ProviderStatus::Rejected);
        assert_eq!(merged.payloads["market"], Some(json!({ "streams": 42 })));
        assert_eq!(merged.payloads["broken"], None);
        assert_eq!(merged.failed_providers(), vec!["broken"]);

        let broken = merged.results.iter().find(|r| r.provider_id == "broken").unwrap();
        assert!(broken.error.as_deref().unwrap().contains("Mock failure"));
    }

    #[tokio::test]
    async fn test_hanging_provider_times_out() {
        let aggregator = aggregator(vec![
            MockProvider::new("fast", Behavior::Succeed(json!(1))),
            MockProvider::new("stuck", Behavior::Hang).with_timeout(Duration::from_millis(50)),
        ]);

        let started = Instant::now();
        let merged = aggregator.aggregate(request()).await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(merged.statuses["fast"], ProviderStatus::Fulfilled);
        assert_eq!(merged.statuses["stuck"], ProviderStatus::TimedOut);
        assert_eq!(merged.payloads["stuck"], None);
    }

    #[tokio::test]
    async fn test_slow_provider_within_deadline_is_fulfilled() {
        let aggregator = aggregator(vec![MockProvider::new(
            "slow",
            Behavior::Delay(Duration::from_millis(20), json!("late")),
        )
        .with_timeout(Duration::from_secs(2))]);

        let merged = aggregator.aggregate(request()).await;
        assert_eq!(merged.statuses["slow"], ProviderStatus::Fulfilled);
    }

    #[tokio::test]
    async fn test_panicking_provider_is_rejected() {
        let aggregator = aggregator(vec![
            MockProvider::new("ok", Behavior::Succeed(json!(true))),
            MockProvider::new("boom", Behavior::Panic),
        ]);

        let merged = aggregator.aggregate(request()).await;

        assert_eq!(merged.statuses["ok"], ProviderStatus::Fulfilled);
        assert_eq!(merged.statuses["boom"], ProviderStatus::Rejected);
    }

    #[tokio::test]
    async fn test_all_failing_still_returns_defaults() {
        let aggregator = aggregator(vec![
            MockProvider::new("a", Behavior::Fail),
            MockProvider::new("b", Behavior::Fail),
        ]);

        let merged = aggregator.aggregate(request()).await;

        assert_eq!(merged.failed_providers(), vec!["a", "b"]);
        assert_eq!(merged.defaults, DefaultInsights::for_genre("Pop"));
    }

    #[tokio::test]
    async fn test_output_is_keyed_independent_of_order() {
        let first = aggregator(vec![
            MockProvider::new("b", Behavior::Succeed(json!(2))),
            MockProvider::new("a", Behavior::Succeed(json!(1))),
        ])
        .aggregate(request())
        .await;
        let second = aggregator(vec![
            MockProvider::new("a", Behavior::Succeed(json!(1))),
            MockProvider::new("b", Behavior::Succeed(json!(2))),
        ])
        .aggregate(request())
        .await;

        assert_eq!(first.payloads, second.payloads);
        assert_eq!(first.statuses, second.statuses);
    }

    #[tokio::test]
    async fn test_narratives_in_id_order() {
        let merged = aggregator(vec![
            MockProvider::narrative("zeta", "second"),
            MockProvider::new("numbers", Behavior::Succeed(json!({ "text": "ignored" }))),
            MockProvider::narrative("alpha", "first"),
        ])
        .aggregate(request())
        .await;

        assert_eq!(merged.narratives(), vec!["first", "second"]);
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let providers: Vec<Arc<dyn InsightProvider>> = vec![
            Arc::new(MockProvider::new("same", Behavior::Fail)),
            Arc::new(MockProvider::new("same", Behavior::Fail)),
        ];
        assert!(matches!(
            InsightAggregator::new(providers, DEFAULT_PROVIDER_TIMEOUT),
            Err(AggregatorError::DuplicateProvider(id)) if id == "same"
        ));
    }

    #[tokio::test]
    async fn test_no_providers() {
        let merged = aggregator(vec![]).aggregate(request()).await;
        assert!(merged.results.is_empty());
        assert!(merged.statuses.is_empty());
    }
}
