//! Deterministic advice derived from royalty data, the health score and the
//! forecast.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::royalties::{AnalyticsTables, Forecast, ForecastHorizon, HealthScore, RoyaltyRecord};

/// A single platform above this share of revenue is a concentration risk.
const CONCENTRATION_SHARE: f64 = 0.5;
/// Revenue per stream below this is flagged as underpaying.
const LOW_RPS: f64 = 0.003;

const GENERIC_GENRE_TIPS: [&str; 2] = [
    "Pitch releases to genre-specific editorial and user playlists",
    "Collaborate with artists who share your audience to cross-pollinate listeners",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendations {
    pub platforms: BTreeMap<String, String>,
    pub genre: Vec<String>,
    pub general: Vec<String>,
}

#[derive(Default)]
struct PlatformTotals {
    revenue: f64,
    streams: u64,
}

pub fn recommend(
    tables: &AnalyticsTables,
    records: &[RoyaltyRecord],
    genre: &str,
    health: &HealthScore,
    forecast: &Forecast,
    horizon: ForecastHorizon,
) -> Recommendations {
    Recommendations {
        platforms: platform_advice(tables, records),
        genre: tables
            .genre_tips(genre)
            .map(|tips| tips.to_vec())
            .unwrap_or_else(|| GENERIC_GENRE_TIPS.iter().map(|t| t.to_string()).collect()),
        general: general_advice(health, forecast, horizon),
    }
}

fn platform_advice(tables: &AnalyticsTables, records: &[RoyaltyRecord]) -> BTreeMap<String, String> {
    let mut totals: BTreeMap<&str, PlatformTotals> = BTreeMap::new();
    for record in records {
        let entry = totals.entry(record.platform.as_str()).or_default();
        entry.revenue += record.amount;
        entry.streams += record.stream_count;
    }
    let overall: f64 = totals.values().map(|t| t.revenue).sum();

    let mut advice: BTreeMap<String, String> = totals
        .iter()
        .map(|(platform, t)| {
            let share = if overall > 0.0 { t.revenue / overall } else { 0.0 };
            let text = if totals.len() > 1 && share > CONCENTRATION_SHARE {
                format!(
                    "Generates {:.0}% of royalty revenue; grow other platforms to reduce dependency",
                    share * 100.0
                )
            } else if t.streams == 0 {
                "No stream counts reported; verify the platform's reporting feed".to_string()
            } else if t.revenue / (t.streams as f64) < LOW_RPS {
                format!(
                    "Revenue per stream is low ({:.4}); review rights registrations and premium-tier reach",
                    t.revenue / t.streams as f64
                )
            } else {
                "Performing in line with the catalog; keep release activity steady".to_string()
            };
            (platform.to_string(), text)
        })
        .collect();

    for platform in &tables.known_platforms {
        advice
            .entry(platform.clone())
            .or_insert_with(|| "No royalties reported; consider distributing here".to_string());
    }
    advice
}

fn general_advice(health: &HealthScore, forecast: &Forecast, horizon: ForecastHorizon) -> Vec<String> {
    let mut general = health.improvement_areas.clone();

    let projected = match horizon {
        ForecastHorizon::ThreeMonths => forecast.next_three_months,
        ForecastHorizon::SixMonths => forecast.next_six_months,
        ForecastHorizon::TwelveMonths => forecast.next_year,
    };
    if forecast.avg_monthly_revenue > 0.0 {
        let trend = if forecast.growth_rate >= 1.0 {
            "growing"
        } else {
            "shrinking"
        };
        general.push(format!(
            "Revenue is projected at {:.0} over the next {} months with a {} trend; plan releases and budgets accordingly",
            projected,
            horizon.months(),
            trend
        ));
    } else {
        general.push(
            "Not enough royalty history for a projection; keep reporting monthly data".to_string(),
        );
    }
    general
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::royalties::{FixedNoise, ForecastEngine, ForecastInput, HealthScorer, Period};
    use std::sync::Arc;

    fn record(platform: &str, amount: f64, streams: u64) -> RoyaltyRecord {
        RoyaltyRecord {
            track_id: "artist".to_string(),
            platform: platform.to_string(),
            period_start: Period::new(2024, 1).unwrap(),
            amount,
            stream_count: streams,
        }
    }

    fn build(records: &[RoyaltyRecord], genre: &str) -> Recommendations {
        let tables = Arc::new(AnalyticsTables::default());
        let health = HealthScorer::new(tables.clone()).score(records, genre);
        let forecast = ForecastEngine::new(tables.clone(), Arc::new(FixedNoise(1.0))).forecast(
            &ForecastInput {
                total_historical_revenue: records.iter().map(|r| r.amount).sum(),
                months_observed: 1,
                genre: genre.to_string(),
                last_observed: Period::new(2024, 1),
            },
            ForecastHorizon::ThreeMonths,
        );
        recommend(&tables, records, genre, &health, &forecast, ForecastHorizon::ThreeMonths)
    }

    #[test]
    fn test_platform_advice() {
        let recs = build(
            &[
                record("spotify", 900.0, 200_000),
                record("tidal", 50.0, 0),
                record("deezer", 50.0, 100_000),
            ],
            "Pop",
        );

        assert!(recs.platforms["spotify"].starts_with("Generates 90%"));
        assert!(recs.platforms["tidal"].starts_with("No stream counts"));
        assert!(recs.platforms["deezer"].starts_with("Revenue per stream is low"));
        assert!(recs.platforms["pandora"].starts_with("No royalties reported"));
    }

    #[test]
    fn test_genre_tips_fall_back_to_generic() {
        let known = build(&[record("spotify", 10.0, 1000)], "hip hop");
        assert_eq!(known.genre, AnalyticsTables::default().genre_tips("Hip-Hop").unwrap());

        let unknown = build(&[record("spotify", 10.0, 1000)], "Polka");
        assert_eq!(unknown.genre.len(), GENERIC_GENRE_TIPS.len());
    }

    #[test]
    fn test_general_includes_projection() {
        let recs = build(&[record("spotify", 1000.0, 100_000)], "Pop");
        let last = recs.general.last().unwrap();
        assert!(last.contains("3240"), "{}", last);
        assert!(last.contains("growing"));
    }

    #[test]
    fn test_general_without_history() {
        let recs = build(&[], "Pop");
        assert!(recs.general.last().unwrap().starts_with("Not enough royalty history"));
        assert!(!recs.general.is_empty());
    }
}
