//! Composite 0-100 royalty health score.
//!
//! Four categories contribute up to 25 points each. Inputs that would divide
//! by zero resolve to a neutral half score instead of failing.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::models::RoyaltyRecord;
use super::period::Period;
use super::tables::AnalyticsTables;

pub const CATEGORY_MAX: f64 = 25.0;
/// Categories scoring below this get a targeted improvement recommendation.
pub const IMPROVEMENT_THRESHOLD: f64 = 15.0;
const NEUTRAL_FRACTION: f64 = 0.5;

pub const GENERIC_IMPROVEMENT: &str =
    "Royalty health is strong across all categories; keep optimizing release cadence and playlist reach";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCategories {
    pub platform_diversity: f64,
    pub growth_trend: f64,
    pub revenue_efficiency: f64,
    pub genre_performance: f64,
}

impl HealthCategories {
    fn total(&self) -> f64 {
        self.platform_diversity + self.growth_trend + self.revenue_efficiency + self.genre_performance
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthScore {
    pub score: u8,
    pub categories: HealthCategories,
    pub interpretation: String,
    pub improvement_areas: Vec<String>,
}

/// Derived figures the score is computed from, exposed for recommendations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoyaltyStats {
    pub total_revenue: f64,
    pub total_streams: u64,
    pub active_platforms: BTreeSet<String>,
    pub period_totals: BTreeMap<Period, f64>,
}

impl RoyaltyStats {
    pub fn from_records(records: &[RoyaltyRecord]) -> Self {
        let mut stats = RoyaltyStats::default();
        for record in records {
            stats.total_revenue += record.amount;
            stats.total_streams += record.stream_count;
            stats.active_platforms.insert(record.platform.clone());
            *stats.period_totals.entry(record.period_start).or_insert(0.0) += record.amount;
        }
        stats
    }

    pub fn months_observed(&self) -> u32 {
        self.period_totals.len() as u32
    }

    pub fn last_period(&self) -> Option<Period> {
        self.period_totals.keys().next_back().copied()
    }

    pub fn avg_monthly_revenue(&self) -> f64 {
        if self.period_totals.is_empty() {
            0.0
        } else {
            self.total_revenue / self.period_totals.len() as f64
        }
    }

    /// Percentage change from the first to the last period; `None` with fewer
    /// than two periods or a non-positive starting total.
    pub fn recent_growth_pct(&self) -> Option<f64> {
        if self.period_totals.len() < 2 {
            return None;
        }
        let first = *self.period_totals.values().next()?;
        let last = *self.period_totals.values().next_back()?;
        if first <= 0.0 {
            return None;
        }
        Some((last - first) / first * 100.0)
    }

    pub fn revenue_per_stream(&self) -> Option<f64> {
        if self.total_streams == 0 {
            None
        } else {
            Some(self.total_revenue / self.total_streams as f64)
        }
    }
}

fn growth_points(growth_pct: f64) -> f64 {
    if growth_pct > 20.0 {
        25.0
    } else if growth_pct > 10.0 {
        20.0
    } else if growth_pct > 5.0 {
        15.0
    } else if growth_pct > 0.0 {
        10.0
    } else if growth_pct > -10.0 {
        5.0
    } else {
        0.0
    }
}

/// Each category stays within `[0, CATEGORY_MAX]` whatever the tables say.
fn clamp_category(points: f64) -> f64 {
    if points.is_nan() {
        return 0.0;
    }
    points.clamp(0.0, CATEGORY_MAX)
}

pub fn interpret(score: u8) -> &'static str {
    match score {
        90..=u8::MAX => "Excellent: royalty streams are diversified, growing and efficient",
        75..=89 => "Very Good: solid royalty performance with minor room to improve",
        60..=74 => "Good: healthy overall, a few categories need attention",
        45..=59 => "Fair: several categories are underperforming",
        30..=44 => "Needs Attention: royalty performance is weak in most categories",
        _ => "Critical: royalty income is at risk and needs immediate review",
    }
}

pub struct HealthScorer {
    tables: Arc<AnalyticsTables>,
}

impl HealthScorer {
    pub fn new(tables: Arc<AnalyticsTables>) -> Self {
        Self { tables }
    }

    pub fn score(&self, records: &[RoyaltyRecord], genre: &str) -> HealthScore {
        self.score_stats(&RoyaltyStats::from_records(records), genre)
    }

    pub fn score_stats(&self, stats: &RoyaltyStats, genre: &str) -> HealthScore {
        let categories = HealthCategories {
            platform_diversity: clamp_category(self.platform_diversity(stats)),
            growth_trend: clamp_category(
                stats
                    .recent_growth_pct()
                    .map(growth_points)
                    .unwrap_or(CATEGORY_MAX * NEUTRAL_FRACTION),
            ),
            revenue_efficiency: clamp_category(
                stats
                    .revenue_per_stream()
                    .map(|rps| self.tables.rps_factor(rps))
                    .unwrap_or(NEUTRAL_FRACTION)
                    * CATEGORY_MAX,
            ),
            genre_performance: clamp_category(self.genre_performance(stats, genre)),
        };

        let score = categories.total().round().clamp(0.0, 100.0) as u8;

        HealthScore {
            score,
            interpretation: interpret(score).to_string(),
            improvement_areas: improvement_areas(&categories),
            categories,
        }
    }

    fn platform_diversity(&self, stats: &RoyaltyStats) -> f64 {
        let known = self.tables.known_platforms.len();
        if known == 0 {
            return 0.0;
        }
        let ratio = stats.active_platforms.len() as f64 / known as f64;
        ratio.min(1.0) * CATEGORY_MAX
    }

    fn genre_performance(&self, stats: &RoyaltyStats, genre: &str) -> f64 {
        let benchmark = self.tables.benchmark(genre);
        let ratio = stats.avg_monthly_revenue() / benchmark;
        ratio.clamp(0.1, 1.0) * CATEGORY_MAX
    }
}

fn improvement_areas(categories: &HealthCategories) -> Vec<String> {
    let mut areas = Vec::new();
    if categories.platform_diversity < IMPROVEMENT_THRESHOLD {
        areas.push(
            "Expand distribution to more streaming platforms to reduce dependency on a few sources"
                .to_string(),
        );
    }
    if categories.growth_trend < IMPROVEMENT_THRESHOLD {
        areas.push(
            "Revenue growth is flat or declining; plan new releases and promotional campaigns"
                .to_string(),
        );
    }
    if categories.revenue_efficiency < IMPROVEMENT_THRESHOLD {
        areas.push(
            "Revenue per stream is below industry average; audit rights registrations and premium-tier exposure"
                .to_string(),
        );
    }
    if categories.genre_performance < IMPROVEMENT_THRESHOLD {
        areas.push(
            "Monthly revenue trails the genre benchmark; target genre playlists and collaborations"
                .to_string(),
        );
    }
    if areas.is_empty() {
        areas.push(GENERIC_IMPROVEMENT.to_string());
    }
    areas
}
