//! Royalty reconciliation, anomaly detection, forecasting and scoring.

pub mod alerts;
pub mod discrepancy;
mod error;
pub mod forecast;
pub mod health;
pub mod models;
pub mod noise;
pub mod normalizer;
pub mod period;
mod pipeline;
pub mod reconciliation;
pub mod report;
pub mod run_log;
pub mod tables;

pub use alerts::{
    AlertSeverity, AlertSink, InMemoryAlertSink, StoredAlert, DEFAULT_ALERT_CAPACITY,
};
pub use discrepancy::RevenueSeries;
pub use error::{AnalyticsError, AnalyticsResult};
pub use forecast::{Forecast, ForecastEngine, ForecastHorizon, ForecastInput, MonthlyProjection};
pub use health::{HealthScore, HealthScorer, RoyaltyStats};
pub use models::{
    AlertKind, CatalogExpectation, DiscrepancyAlert, DiscrepancyKind, ReconciliationResult,
    RevenuePoint, RoyaltyRecord,
};
pub use noise::{FixedNoise, NoiseSource, SeededNoise, UniformNoise};
pub use normalizer::{NormalizedBatch, PlatformFeed, RejectedRecord};
pub use period::Period;
pub use pipeline::{AuditRequest, DiscrepancyCheckRequest, RoyaltyPipeline};
pub use report::{AuditReport, AuditReportBuilder, ExportFormat};
pub use run_log::{RunKind, RunLog, RunLogEntry};
pub use tables::AnalyticsTables;
