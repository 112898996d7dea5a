//! Audit reports assembled from a reconciliation batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::error::{AnalyticsError, AnalyticsResult};
use super::forecast::Forecast;
use super::health::HealthScore;
use super::models::{DiscrepancyAlert, ReconciliationResult};
use super::normalizer::RejectedRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
    Pdf,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
            ExportFormat::Pdf => "application/pdf",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(AnalyticsError::InvalidInput(format!(
                "unknown export format '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub matched: usize,
    pub flagged: usize,
    pub total_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub report_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub total_records: usize,
    pub discrepancies: Vec<ReconciliationResult>,
    pub summary: ReportSummary,
    pub alerts: Vec<DiscrepancyAlert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast: Option<Forecast>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_score: Option<HealthScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub rejected_records: Vec<RejectedRecord>,
}

impl AuditReport {
    /// Serialize the report. Only JSON is available; tabular and document
    /// exports report [`AnalyticsError::UnsupportedExport`].
    pub fn export(&self, format: ExportFormat) -> AnalyticsResult<String> {
        match format {
            ExportFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            ExportFormat::Csv | ExportFormat::Pdf => {
                Err(AnalyticsError::UnsupportedExport(format.as_str().to_string()))
            }
        }
    }

    /// Results that did not match, for display.
    pub fn flagged(&self) -> impl Iterator<Item = &ReconciliationResult> {
        self.discrepancies.iter().filter(|r| !r.matched)
    }
}

pub struct AuditReportBuilder {
    results: Vec<ReconciliationResult>,
    alerts: Vec<DiscrepancyAlert>,
    forecast: Option<Forecast>,
    health_score: Option<HealthScore>,
    insights: Option<serde_json::Value>,
    rejected_records: Vec<RejectedRecord>,
}

impl AuditReportBuilder {
    pub fn new(results: Vec<ReconciliationResult>) -> Self {
        Self {
            results,
            alerts: Vec::new(),
            forecast: None,
            health_score: None,
            insights: None,
            rejected_records: Vec::new(),
        }
    }

    pub fn with_alerts(mut self, alerts: Vec<DiscrepancyAlert>) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn with_forecast(mut self, forecast: Forecast) -> Self {
        self.forecast = Some(forecast);
        self
    }

    pub fn with_health_score(mut self, health_score: HealthScore) -> Self {
        self.health_score = Some(health_score);
        self
    }

    pub fn with_insights(mut self, insights: serde_json::Value) -> Self {
        self.insights = Some(insights);
        self
    }

    pub fn with_rejected_records(mut self, rejected: Vec<RejectedRecord>) -> Self {
        self.rejected_records = rejected;
        self
    }

    pub fn build(self) -> AuditReport {
        self.build_at(Utc::now())
    }

    pub fn build_at(self, generated_at: DateTime<Utc>) -> AuditReport {
        let matched = self.results.iter().filter(|r| r.matched).count();
        let total_amount: f64 = self
            .results
            .iter()
            .filter_map(|r| r.actual_amount)
            .fold(0.0, |acc, amount| acc + amount);

        AuditReport {
            report_id: Uuid::new_v4(),
            generated_at,
            total_records: self.results.len(),
            summary: ReportSummary {
                matched,
                flagged: self.results.len() - matched,
                total_amount,
            },
            discrepancies: self.results,
            alerts: self.alerts,
            forecast: self.forecast,
            health_score: self.health_score,
            insights: self.insights,
            rejected_records: self.rejected_records,
        }
    }
}
