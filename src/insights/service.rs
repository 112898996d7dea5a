use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use super::aggregator::{InsightAggregator, MergedInsights};
use super::provider::InsightsRequest;
use super::recommendations::{recommend, Recommendations};
use crate::royalties::normalizer::normalize_platform_name;
use crate::royalties::{
    AnalyticsError, AnalyticsResult, Forecast, HealthScore, RoyaltyPipeline, RoyaltyStats, RunKind,
};

/// Track id under which per-platform artist totals are analyzed.
pub const ARTIST_AGGREGATE_ID: &str = "artist";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsResponse {
    /// Narrative provider text, or a computed summary when none delivered.
    pub insights: String,
    pub predictions: Forecast,
    pub recommendations: Recommendations,
    pub health_score: HealthScore,
    pub providers: MergedInsights,
}

pub struct InsightsService {
    pipeline: Arc<RoyaltyPipeline>,
    aggregator: Arc<InsightAggregator>,
}

impl InsightsService {
    pub fn new(pipeline: Arc<RoyaltyPipeline>, aggregator: Arc<InsightAggregator>) -> Self {
        Self {
            pipeline,
            aggregator,
        }
    }

    pub fn aggregator(&self) -> &InsightAggregator {
        &self.aggregator
    }

    pub async fn generate(&self, request: InsightsRequest) -> AnalyticsResult<InsightsResponse> {
        let started = Instant::now();
        validate(&request)?;

        let records = request.to_records(ARTIST_AGGREGATE_ID);
        let stats = RoyaltyStats::from_records(&records);
        let genre = request.artist_genre.clone();
        let horizon = request.timeframe;

        let predictions = self.pipeline.forecast_stats(&stats, &genre, horizon);
        let health_score = self.pipeline.health_score_stats(&stats, &genre);
        let recommendations = recommend(
            self.pipeline.tables(),
            &records,
            &genre,
            &health_score,
            &predictions,
            horizon,
        );

        let providers = self.aggregator.aggregate(Arc::new(request)).await;

        let narratives = providers.narratives();
        let insights = if narratives.is_empty() {
            summary(&stats, &health_score, &predictions, horizon.months())
        } else {
            narratives.join("\n\n")
        };

        let failed = providers.failed_providers().len();
        info!(
            genre = %genre,
            records = records.len(),
            providers = providers.statuses.len(),
            failed_providers = failed,
            "Insights generated"
        );
        self.pipeline
            .log_run(RunKind::Insights, started, records.len(), failed);

        Ok(InsightsResponse {
            insights,
            predictions,
            recommendations,
            health_score,
            providers,
        })
    }
}

fn validate(request: &InsightsRequest) -> AnalyticsResult<()> {
    let mut platforms: HashMap<String, &str> = HashMap::new();
    for (platform, points) in &request.royalty_data {
        let normalized = normalize_platform_name(platform);
        if let Some(previous) = platforms.insert(normalized.clone(), platform) {
            return Err(AnalyticsError::InvalidInput(format!(
                "platforms '{}' and '{}' both normalize to '{}'",
                previous, platform, normalized
            )));
        }
        if let Some(point) = points
            .iter()
            .find(|p| !p.revenue.is_finite() || p.revenue < 0.0)
        {
            return Err(AnalyticsError::InvalidInput(format!(
                "revenue for {} in {} must be a non-negative number",
                platform, point.month
            )));
        }
    }
    Ok(())
}

fn summary(stats: &RoyaltyStats, health: &HealthScore, forecast: &Forecast, months: u32) -> String {
    if stats.period_totals.is_empty() {
        return format!(
            "No royalty data was provided. Health score {}/100 ({}).",
            health.score, health.interpretation
        );
    }
    let projected = match months {
        3 => forecast.next_three_months,
        12 => forecast.next_year,
        _ => forecast.next_six_months,
    };
    format!(
        "Average monthly royalty revenue is {:.2} across {} platform(s) over {} month(s). \
         Health score {}/100 ({}). Projected revenue for the next {} months: {:.0}.",
        stats.avg_monthly_revenue(),
        stats.active_platforms.len(),
        stats.months_observed(),
        health.score,
        health.interpretation,
        months,
        projected
    )
}
