//! Matches reported royalties against catalog expectations.

use rayon::prelude::*;
use std::collections::HashMap;

use super::models::{CatalogExpectation, DiscrepancyKind, ReconciliationResult, RoyaltyRecord};

/// Absolute tolerance, in currency units, under which amounts are considered equal.
pub const AMOUNT_TOLERANCE: f64 = 0.01;

/// Reconcile every record against the expectation for its track.
///
/// Produces exactly one result per record, in input order. When several
/// expectations exist for the same track the first one is used.
pub fn reconcile(
    royalties: &[RoyaltyRecord],
    expectations: &[CatalogExpectation],
) -> Vec<ReconciliationResult> {
    let mut expected_by_track: HashMap<&str, f64> = HashMap::with_capacity(expectations.len());
    for expectation in expectations {
        expected_by_track
            .entry(expectation.track_id.as_str())
            .or_insert(expectation.expected_amount);
    }

    royalties
        .par_iter()
        .map(|record| reconcile_record(record, expected_by_track.get(record.track_id.as_str()).copied()))
        .collect()
}

fn reconcile_record(record: &RoyaltyRecord, expected: Option<f64>) -> ReconciliationResult {
    let (matched, discrepancy_kind) = match expected {
        None => (false, Some(DiscrepancyKind::NoMetadata)),
        Some(expected) if (expected - record.amount).abs() > AMOUNT_TOLERANCE => {
            (false, Some(DiscrepancyKind::AmountMismatch))
        }
        Some(_) => (true, None),
    };

    ReconciliationResult {
        track_id: record.track_id.clone(),
        platform: record.platform.clone(),
        period: record.period_start,
        matched,
        discrepancy_kind,
        expected_amount: expected,
        actual_amount: Some(record.amount),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::royalties::period::Period;

    fn record(track_id: &str, amount: f64) -> RoyaltyRecord {
        RoyaltyRecord {
            track_id: track_id.to_string(),
            platform: "spotify".to_string(),
            period_start: Period::new(2024, 1).unwrap(),
            amount,
            stream_count: 1000,
        }
    }

    fn expectation(track_id: &str, amount: f64) -> CatalogExpectation {
        CatalogExpectation {
            track_id: track_id.to_string(),
            expected_amount: amount,
        }
    }

    #[test]
    fn test_missing_expectation_is_no_metadata() {
        let results = reconcile(&[record("t1", 10.0)], &[]);

        assert_eq!(results.len(), 1);
        assert!(!results[0].matched);
        assert_eq!(results[0].discrepancy_kind, Some(DiscrepancyKind::NoMetadata));
        assert_eq!(results[0].expected_amount, None);
        assert_eq!(results[0].actual_amount, Some(10.0));
    }

    #[test]
    fn test_within_tolerance_matches() {
        let results = reconcile(
            &[record("t1", 10.0), record("t2", 5.005)],
            &[expectation("t1", 10.01), expectation("t2", 5.0)],
        );

        assert!(results.iter().all(|r| r.matched));
        assert!(results.iter().all(|r| r.discrepancy_kind.is_none()));
    }

    #[test]
    fn test_amount_mismatch_attaches_both_amounts() {
        let results = reconcile(&[record("t1", 8.0)], &[expectation("t1", 10.0)]);

        assert!(!results[0].matched);
        assert_eq!(
            results[0].discrepancy_kind,
            Some(DiscrepancyKind::AmountMismatch)
        );
        assert_eq!(results[0].expected_amount, Some(10.0));
        assert_eq!(results[0].actual_amount, Some(8.0));
    }

    #[test]
    fn test_first_expectation_wins_and_order_is_preserved() {
        let records: Vec<_> = (0..500)
            .map(|i| record(&format!("t{}", i % 7), 1.0))
            .collect();
        let expectations = vec![expectation("t0", 1.0), expectation("t0", 99.0)];

        let results = reconcile(&records, &expectations);

        assert_eq!(results.len(), 500);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.track_id, format!("t{}", i % 7));
        }
        assert!(results[0].matched);
        assert_eq!(results[1].discrepancy_kind, Some(DiscrepancyKind::NoMetadata));
    }
}
