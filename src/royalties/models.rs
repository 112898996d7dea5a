//! Value objects flowing through the royalty pipeline.

use serde::{Deserialize, Serialize};

use super::period::Period;

/// A single normalized royalty payment: one track, one platform, one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoyaltyRecord {
    pub track_id: String,
    pub platform: String,
    pub period_start: Period,
    pub amount: f64,
    pub stream_count: u64,
}

/// The amount catalog metadata says a track should have earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogExpectation {
    pub track_id: String,
    pub expected_amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    NoMetadata,
    AmountMismatch,
}

impl DiscrepancyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscrepancyKind::NoMetadata => "no_metadata",
            DiscrepancyKind::AmountMismatch => "amount_mismatch",
        }
    }
}

/// Outcome of reconciling one royalty record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    pub track_id: String,
    pub platform: String,
    pub period: Period,
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discrepancy_kind: Option<DiscrepancyKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_amount: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Drop,
    Gap,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Drop => "drop",
            AlertKind::Gap => "gap",
        }
    }
}

/// An anomaly in a revenue series that needs human attention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscrepancyAlert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_id: Option<String>,
    pub period: Period,
    pub kind: AlertKind,
    pub message: String,
    /// Percentage fall for drop alerts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<f64>,
}

/// One `(period, amount)` sample of a revenue series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RevenuePoint {
    pub period: Period,
    pub amount: f64,
}
