//! Insight provider trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use crate::royalties::normalizer::normalize_platform_name;
use crate::royalties::{ForecastHorizon, Period, RoyaltyRecord};

/// One month of revenue reported by a platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoyaltyDataPoint {
    pub month: Period,
    pub revenue: f64,
    #[serde(default)]
    pub streams: u64,
}

/// What every provider is asked to analyze.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsRequest {
    #[serde(default)]
    pub timeframe: ForecastHorizon,
    #[serde(default)]
    pub artist_genre: String,
    /// Platform name to monthly revenue.
    #[serde(default)]
    pub royalty_data: BTreeMap<String, Vec<RoyaltyDataPoint>>,
}

impl InsightsRequest {
    /// Flattens the per-platform data into royalty records for `track_id`.
    pub fn to_records(&self, track_id: &str) -> Vec<RoyaltyRecord> {
        self.royalty_data
            .iter()
            .flat_map(|(platform, points)| {
                let platform = normalize_platform_name(platform);
                points.iter().map(move |point| RoyaltyRecord {
                    track_id: track_id.to_string(),
                    platform: platform.clone(),
                    period_start: point.month,
                    amount: point.revenue,
                    stream_count: point.streams,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Returns structured figures.
    Financial,
    /// Returns prose for the insights text.
    Narrative,
}

/// Errors that can occur when calling an insight provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timeout")]
    Timeout,
}

/// An external analysis source.
///
/// Providers are called concurrently and must not depend on each other. A
/// provider that errors or hangs only affects its own entry in the merged
/// result.
#[async_trait]
pub trait InsightProvider: Send + Sync {
    /// Unique among the providers of one aggregator.
    fn id(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    /// Overrides the aggregator's default deadline for this provider.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn analyze(&self, request: &InsightsRequest) -> Result<serde_json::Value, ProviderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProviderStatus {
    Fulfilled,
    Rejected,
    TimedOut,
}

impl ProviderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderStatus::Fulfilled => "fulfilled",
            ProviderStatus::Rejected => "rejected",
            ProviderStatus::TimedOut => "timedOut",
        }
    }
}

/// How one provider call settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResult {
    pub provider_id: String,
    pub kind: ProviderKind,
    pub status: ProviderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: InsightsRequest = serde_json::from_value(serde_json::json!({
            "artistGenre": "Pop",
            "royaltyData": {
                "spotify": [{"month": "2024-01", "revenue": 120.5, "streams": 30000}],
                "tidal": [{"month": "2024-01-15", "revenue": 10.0}]
            }
        }))
        .unwrap();

        assert_eq!(request.timeframe, ForecastHorizon::SixMonths);
        assert_eq!(request.royalty_data["tidal"][0].streams, 0);

        let records = request.to_records("artist");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].platform, "spotify");
        assert_eq!(records[1].period_start, Period::new(2024, 1).unwrap());
    }

    #[test]
    fn test_bad_timeframe_is_rejected() {
        let result = serde_json::from_value::<InsightsRequest>(serde_json::json!({
            "timeframe": 7,
            "artistGenre": "Pop"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&ProviderStatus::TimedOut).unwrap(),
            "\"timedOut\""
        );
        assert_eq!(ProviderStatus::TimedOut.as_str(), "timedOut");
    }
}
