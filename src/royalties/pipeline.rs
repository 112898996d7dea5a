//! The royalty pipeline as a constructible service.
//!
//! Wires the pure components to the analytics tables, the alert sink and the
//! run log. Every operation records one [`RunLogEntry`] and its metrics.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::alerts::{AlertSeverity, AlertSink, StoredAlert};
use super::discrepancy::{self, RevenueSeries};
use super::error::{AnalyticsError, AnalyticsResult};
use super::forecast::{Forecast, ForecastEngine, ForecastHorizon, ForecastInput};
use super::health::{HealthScore, HealthScorer, RoyaltyStats};
use super::models::{CatalogExpectation, DiscrepancyAlert, ReconciliationResult, RevenuePoint, RoyaltyRecord};
use super::noise::NoiseSource;
use super::normalizer::{self, NormalizedBatch, PlatformFeed, RejectedRecord};
use super::reconciliation;
use super::report::AuditReport;
use super::report::AuditReportBuilder;
use super::run_log::{RunKind, RunLog, RunLogEntry};
use super::tables::AnalyticsTables;
use crate::server::metrics;

/// Payload of a single-series discrepancy check. Both fields are optional on
/// the wire so that their absence surfaces as a validation error.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscrepancyCheckRequest {
    pub artist_id: Option<String>,
    pub revenue_series: Option<Vec<RevenuePoint>>,
}

impl DiscrepancyCheckRequest {
    fn validate(self) -> AnalyticsResult<(String, Vec<RevenuePoint>)> {
        let artist_id = self
            .artist_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(AnalyticsError::MissingField("artistId"))?;
        let series = self
            .revenue_series
            .ok_or(AnalyticsError::MissingField("revenueSeries"))?;
        if let Some(bad) = series.iter().find(|p| !p.amount.is_finite()) {
            return Err(AnalyticsError::InvalidInput(format!(
                "revenue for {} is not a finite number",
                bad.period
            )));
        }
        Ok((artist_id, series))
    }
}

/// Inputs of a full audit run.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRequest {
    pub royalties: Vec<RoyaltyRecord>,
    #[serde(default)]
    pub expectations: Vec<CatalogExpectation>,
    /// Enables the forecast and health sections.
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub rejected_records: Vec<RejectedRecord>,
}

pub struct RoyaltyPipeline {
    tables: Arc<AnalyticsTables>,
    forecast_engine: ForecastEngine,
    health_scorer: HealthScorer,
    alert_sink: Arc<dyn AlertSink>,
    run_log: Arc<RunLog>,
}

impl RoyaltyPipeline {
    pub fn new(
        tables: Arc<AnalyticsTables>,
        noise: Arc<dyn NoiseSource>,
        alert_sink: Arc<dyn AlertSink>,
        run_log: Arc<RunLog>,
    ) -> Self {
        Self {
            forecast_engine: ForecastEngine::new(tables.clone(), noise),
            health_scorer: HealthScorer::new(tables.clone()),
            tables,
            alert_sink,
            run_log,
        }
    }

    pub fn tables(&self) -> &AnalyticsTables {
        &self.tables
    }

    pub fn alert_sink(&self) -> &Arc<dyn AlertSink> {
        &self.alert_sink
    }

    pub fn run_log(&self) -> &Arc<RunLog> {
        &self.run_log
    }

    pub fn normalize(&self, feeds: &[PlatformFeed], default_track_id: &str) -> NormalizedBatch {
        let started = Instant::now();
        let batch = normalizer::normalize(feeds, default_track_id);
        if !batch.rejected.is_empty() {
            warn!(
                rejected = batch.rejected.len(),
                accepted = batch.records.len(),
                "Royalty feed entries rejected during normalization"
            );
        }
        self.log_run(RunKind::Normalize, started, batch.records.len(), batch.rejected.len());
        batch
    }

    pub fn reconcile(
        &self,
        royalties: &[RoyaltyRecord],
        expectations: &[CatalogExpectation],
    ) -> Vec<ReconciliationResult> {
        let started = Instant::now();
        let results = reconciliation::reconcile(royalties, expectations);

        for result in &results {
            let outcome = match result.discrepancy_kind {
                None => "matched",
                Some(kind) => kind.as_str(),
            };
            metrics::record_reconciliation_result(outcome);
        }
        let flagged = results.iter().filter(|r| !r.matched).count();
        debug!(records = results.len(), flagged, "Reconciliation finished");

        self.log_run(RunKind::Reconcile, started, results.len(), flagged);
        results
    }

    /// Runs the drop check, then the gap check, over one revenue series and
    /// returns the first alert found. A found alert is handed to the alert
    /// sink as critical; storage failures are logged and otherwise ignored.
    pub async fn check_discrepancies(
        &self,
        request: DiscrepancyCheckRequest,
    ) -> AnalyticsResult<Option<DiscrepancyAlert>> {
        let started = Instant::now();
        let (artist_id, points) = request.validate()?;
        let series = RevenueSeries::new(None, points);

        let alert = discrepancy::check(&series);
        if let Some(alert) = &alert {
            metrics::record_discrepancy_alert(alert.kind.as_str());
            info!(
                artist_id = %artist_id,
                kind = alert.kind.as_str(),
                period = %alert.period,
                "Royalty discrepancy detected"
            );
            let stored = StoredAlert {
                artist_id: artist_id.clone(),
                severity: AlertSeverity::Critical,
                alert: alert.clone(),
                created_at: Utc::now(),
            };
            if let Err(e) = self.alert_sink.persist(stored).await {
                warn!(artist_id = %artist_id, error = %e, "Failed to persist discrepancy alert");
            }
        }

        self.log_run(
            RunKind::DiscrepancyCheck,
            started,
            series.len(),
            usize::from(alert.is_some()),
        );
        Ok(alert)
    }

    pub fn forecast(&self, input: &ForecastInput, horizon: ForecastHorizon) -> Forecast {
        let started = Instant::now();
        let forecast = self.forecast_engine.forecast(input, horizon);
        self.log_run(RunKind::Forecast, started, input.months_observed as usize, 0);
        forecast
    }

    /// Forecast from precomputed statistics, without touching the run log.
    pub(crate) fn forecast_stats(
        &self,
        stats: &RoyaltyStats,
        genre: &str,
        horizon: ForecastHorizon,
    ) -> Forecast {
        let input = ForecastInput {
            total_historical_revenue: stats.total_revenue,
            months_observed: stats.months_observed(),
            genre: genre.to_string(),
            last_observed: stats.last_period(),
        };
        self.forecast_engine.forecast(&input, horizon)
    }

    pub fn health_score(&self, royalties: &[RoyaltyRecord], genre: &str) -> HealthScore {
        let started = Instant::now();
        let score = self.health_scorer.score(royalties, genre);
        debug!(score = score.score, genre = %genre, "Health score computed");
        self.log_run(RunKind::HealthScore, started, royalties.len(), 0);
        score
    }

    pub(crate) fn health_score_stats(&self, stats: &RoyaltyStats, genre: &str) -> HealthScore {
        self.health_scorer.score_stats(stats, genre)
    }

    /// Reconciles the batch and scans every track's history for anomalies.
    /// When a genre is given, the report also carries a forecast and a
    /// health score for the whole batch.
    pub fn audit_report(
        &self,
        request: AuditRequest,
        insights: Option<serde_json::Value>,
    ) -> AuditReport {
        let started = Instant::now();
        let results = reconciliation::reconcile(&request.royalties, &request.expectations);

        let alerts: Vec<DiscrepancyAlert> = RevenueSeries::per_track(&request.royalties)
            .iter()
            .flat_map(discrepancy::scan_all)
            .collect();
        for alert in &alerts {
            metrics::record_discrepancy_alert(alert.kind.as_str());
        }

        let mut builder = AuditReportBuilder::new(results)
            .with_alerts(alerts)
            .with_rejected_records(request.rejected_records);

        if let Some(genre) = request.genre.as_deref() {
            let stats = RoyaltyStats::from_records(&request.royalties);
            builder = builder
                .with_forecast(self.forecast_stats(&stats, genre, ForecastHorizon::default()))
                .with_health_score(self.health_score_stats(&stats, genre));
        }
        if let Some(insights) = insights {
            builder = builder.with_insights(insights);
        }

        let report = builder.build();
        info!(
            report_id = %report.report_id,
            records = report.total_records,
            flagged = report.summary.flagged,
            alerts = report.alerts.len(),
            "Audit report generated"
        );
        self.log_run(
            RunKind::AuditReport,
            started,
            report.total_records,
            report.summary.flagged,
        );
        report
    }

    pub(crate) fn log_run(&self, kind: RunKind, started: Instant, records: usize, flagged: usize) {
        self.run_log.append(RunLogEntry {
            run_id: Uuid::new_v4(),
            kind,
            finished_at: Utc::now(),
            duration_ms: started.elapsed().as_millis() as u64,
            records,
            flagged,
        });
    }
}
