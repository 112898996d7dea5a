//! Drop and gap detection over per-track revenue series.
//!
//! `detect_drop`, `detect_gap` and `check` report at most one alert each: the
//! scan stops at the first qualifying pair. `scan_all` walks the whole series
//! and is what audit reports use.

use std::collections::BTreeMap;

use super::models::{AlertKind, DiscrepancyAlert, RevenuePoint, RoyaltyRecord};
use super::period::Period;

/// A drop is flagged when the current amount falls below this share of the previous one.
pub const DROP_RATIO: f64 = 0.7;

/// Chronologically ordered revenue samples, at most one per period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RevenueSeries {
    track_id: Option<String>,
    points: Vec<RevenuePoint>,
}

impl RevenueSeries {
    /// Sorts `points` by period; samples sharing a period are summed.
    pub fn new(track_id: Option<String>, points: impl IntoIterator<Item = RevenuePoint>) -> Self {
        let mut by_period: BTreeMap<Period, f64> = BTreeMap::new();
        for point in points {
            *by_period.entry(point.period).or_insert(0.0) += point.amount;
        }
        Self {
            track_id,
            points: by_period
                .into_iter()
                .map(|(period, amount)| RevenuePoint { period, amount })
                .collect(),
        }
    }

    /// The series of one track, summed across platforms.
    pub fn for_track(records: &[RoyaltyRecord], track_id: &str) -> Self {
        Self::new(
            Some(track_id.to_string()),
            records
                .iter()
                .filter(|r| r.track_id == track_id)
                .map(|r| RevenuePoint {
                    period: r.period_start,
                    amount: r.amount,
                }),
        )
    }

    /// One series per distinct track id, ordered by track id.
    pub fn per_track(records: &[RoyaltyRecord]) -> Vec<Self> {
        let mut grouped: BTreeMap<&str, Vec<RevenuePoint>> = BTreeMap::new();
        for record in records {
            grouped
                .entry(record.track_id.as_str())
                .or_default()
                .push(RevenuePoint {
                    period: record.period_start,
                    amount: record.amount,
                });
        }
        grouped
            .into_iter()
            .map(|(track_id, points)| Self::new(Some(track_id.to_string()), points))
            .collect()
    }

    pub fn track_id(&self) -> Option<&str> {
        self.track_id.as_deref()
    }

    pub fn points(&self) -> &[RevenuePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn drop_alert(series: &RevenueSeries, prev: &RevenuePoint, curr: &RevenuePoint) -> Option<DiscrepancyAlert> {
    if prev.amount <= 0.0 || curr.amount >= prev.amount * DROP_RATIO {
        return None;
    }
    let magnitude = (prev.amount - curr.amount) / prev.amount * 100.0;
    Some(DiscrepancyAlert {
        track_id: series.track_id.clone(),
        period: curr.period,
        kind: AlertKind::Drop,
        message: format!("Revenue dropped by {:.1}% in {}", magnitude, curr.period),
        magnitude: Some(magnitude),
    })
}

fn gap_alert(series: &RevenueSeries, prev: &RevenuePoint, curr: &RevenuePoint) -> Option<DiscrepancyAlert> {
    if prev.period.months_until(&curr.period) <= 1 {
        return None;
    }
    Some(DiscrepancyAlert {
        track_id: series.track_id.clone(),
        period: curr.period,
        kind: AlertKind::Gap,
        message: format!("Missing royalty payment for period before {}", curr.period),
        magnitude: None,
    })
}

/// First adjacent pair where revenue fell by 30% or more.
pub fn detect_drop(series: &RevenueSeries) -> Option<DiscrepancyAlert> {
    series
        .points
        .windows(2)
        .find_map(|pair| drop_alert(series, &pair[0], &pair[1]))
}

/// First adjacent pair more than one calendar month apart.
pub fn detect_gap(series: &RevenueSeries) -> Option<DiscrepancyAlert> {
    series
        .points
        .windows(2)
        .find_map(|pair| gap_alert(series, &pair[0], &pair[1]))
}

/// Drop pass, then gap pass; returns the first alert found.
pub fn check(series: &RevenueSeries) -> Option<DiscrepancyAlert> {
    detect_drop(series).or_else(|| detect_gap(series))
}

/// Every drop and gap in the series, in period order (drops before gaps
/// within the same period).
pub fn scan_all(series: &RevenueSeries) -> Vec<DiscrepancyAlert> {
    let mut alerts = Vec::new();
    for pair in series.points.windows(2) {
        alerts.extend(drop_alert(series, &pair[0], &pair[1]));
        alerts.extend(gap_alert(series, &pair[0], &pair[1]));
    }
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(samples: &[(i32, u32, f64)]) -> RevenueSeries {
        RevenueSeries::new(
            Some("t1".to_string()),
            samples.iter().map(|(y, m, amount)| RevenuePoint {
                period: Period::new(*y, *m).unwrap(),
                amount: *amount,
            }),
        )
    }

    #[test]
    fn test_drop_detected_on_third_entry() {
        let s = series(&[(2024, 1, 100.0), (2024, 2, 100.0), (2024, 3, 60.0)]);

        let alert = detect_drop(&s).expect("drop expected");

        assert_eq!(alert.kind, AlertKind::Drop);
        assert_eq!(alert.period, Period::new(2024, 3).unwrap());
        assert!((alert.magnitude.unwrap() - 40.0).abs() < 1e-9);
        assert_eq!(alert.message, "Revenue dropped by 40.0% in 2024-03");
        assert_eq!(alert.track_id.as_deref(), Some("t1"));
    }

    #[test]
    fn test_gradual_decline_is_not_a_drop() {
        let s = series(&[(2024, 1, 100.0), (2024, 2, 80.0), (2024, 3, 75.0)]);
        assert!(detect_drop(&s).is_none());
    }

    #[test]
    fn test_exactly_thirty_percent_is_not_a_drop() {
        let s = series(&[(2024, 1, 100.0), (2024, 2, 70.0)]);
        assert!(detect_drop(&s).is_none());
    }

    #[test]
    fn test_drop_from_zero_is_ignored() {
        let s = series(&[(2024, 1, 0.0), (2024, 2, 0.0)]);
        assert!(detect_drop(&s).is_none());
    }

    #[test]
    fn test_gap_detected_before_march() {
        let s = series(&[(2024, 1, 10.0), (2024, 3, 10.0)]);

        let alert = detect_gap(&s).expect("gap expected");

        assert_eq!(alert.kind, AlertKind::Gap);
        assert_eq!(alert.period, Period::new(2024, 3).unwrap());
        assert_eq!(
            alert.message,
            "Missing royalty payment for period before 2024-03"
        );
        assert!(alert.magnitude.is_none());
    }

    #[test]
    fn test_consecutive_months_have_no_gap() {
        let s = series(&[(2024, 1, 10.0), (2024, 2, 10.0)]);
        assert!(detect_gap(&s).is_none());

        let rollover = series(&[(2023, 12, 10.0), (2024, 1, 10.0)]);
        assert!(detect_gap(&rollover).is_none());
    }

    #[test]
    fn test_gap_across_year_boundary() {
        let s = series(&[(2023, 11, 10.0), (2024, 1, 10.0)]);
        assert!(detect_gap(&s).is_some());
    }

    #[test]
    fn test_short_series_produce_nothing() {
        assert!(check(&RevenueSeries::default()).is_none());
        assert!(check(&series(&[(2024, 1, 100.0)])).is_none());
        assert!(scan_all(&series(&[(2024, 1, 100.0)])).is_empty());
    }

    #[test]
    fn test_single_pass_reports_only_first_drop() {
        let s = series(&[
            (2024, 1, 100.0),
            (2024, 2, 50.0),
            (2024, 3, 50.0),
            (2024, 4, 10.0),
        ]);

        let alert = detect_drop(&s).unwrap();
        assert_eq!(alert.period, Period::new(2024, 2).unwrap());

        let all = scan_all(&s);
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].period, Period::new(2024, 4).unwrap());
    }

    #[test]
    fn test_check_prefers_drop_over_gap() {
        let s = series(&[(2024, 1, 100.0), (2024, 3, 100.0), (2024, 4, 20.0)]);

        let alert = check(&s).unwrap();
        assert_eq!(alert.kind, AlertKind::Drop);

        let gap_only = series(&[(2024, 1, 100.0), (2024, 3, 100.0)]);
        assert_eq!(check(&gap_only).unwrap().kind, AlertKind::Gap);
    }

    #[test]
    fn test_series_sorts_and_merges_periods() {
        let s = series(&[(2024, 3, 5.0), (2024, 1, 10.0), (2024, 3, 5.0)]);

        assert_eq!(s.len(), 2);
        assert_eq!(s.points()[0].period, Period::new(2024, 1).unwrap());
        assert_eq!(s.points()[1].amount, 10.0);
    }

    #[test]
    fn test_per_track_grouping() {
        let records = vec![
            RoyaltyRecord {
                track_id: "b".to_string(),
                platform: "spotify".to_string(),
                period_start: Period::new(2024, 1).unwrap(),
                amount: 1.0,
                stream_count: 1,
            },
            RoyaltyRecord {
                track_id: "a".to_string(),
                platform: "tidal".to_string(),
                period_start: Period::new(2024, 1).unwrap(),
                amount: 2.0,
                stream_count: 1,
            },
            RoyaltyRecord {
                track_id: "a".to_string(),
                platform: "spotify".to_string(),
                period_start: Period::new(2024, 1).unwrap(),
                amount: 3.0,
                stream_count: 1,
            },
        ];

        let all = RevenueSeries::per_track(&records);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].track_id(), Some("a"));
        assert_eq!(all[0].points()[0].amount, 5.0);
        assert_eq!(RevenueSeries::for_track(&records, "b").len(), 1);
    }
}
