//! Insight generation on top of the royalty pipeline, fed by external
//! analysis providers.

pub mod aggregator;
pub mod defaults;
pub mod http_provider;
pub mod openai;
pub mod provider;
pub mod recommendations;
mod service;

pub use aggregator::{AggregatorError, InsightAggregator, MergedInsights, DEFAULT_PROVIDER_TIMEOUT};
pub use http_provider::HttpAnalysisProvider;
pub use openai::OpenAiInsightProvider;
pub use provider::{
    InsightProvider, InsightsRequest, ProviderError, ProviderKind, ProviderResult, ProviderStatus,
    RoyaltyDataPoint,
};
pub use recommendations::Recommendations;
pub use service::{InsightsResponse, InsightsService, ARTIST_AGGREGATE_ID};
