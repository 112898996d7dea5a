//! Royalty Analytics Library
//!
//! Normalization, reconciliation, discrepancy detection, forecasting and
//! health scoring for music royalty statements, plus the insight provider
//! fan-out and the HTTP server that exposes them.

pub mod config;
pub mod insights;
pub mod royalties;
pub mod server;

// Re-export commonly used types for convenience
pub use insights::{InsightAggregator, InsightProvider, InsightsService};
pub use royalties::{AnalyticsError, AnalyticsTables, RoyaltyPipeline};
pub use server::{run_server, RequestsLoggingLevel};
