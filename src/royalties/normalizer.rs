//! Turns per-platform royalty feeds into [`RoyaltyRecord`]s.
//!
//! Malformed entries never fail the batch: they are dropped and reported in
//! [`NormalizedBatch::rejected`] with the reason.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::models::RoyaltyRecord;
use super::period::Period;

/// One month of a platform feed, as delivered by the platform integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPeriod {
    pub month: u32,
    pub year: i32,
    pub revenue: f64,
    #[serde(default)]
    pub stream_count: u64,
}

/// A currency-normalized royalty feed for one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformFeed {
    pub platform: String,
    /// Track the feed belongs to. Artist-level feeds leave this empty.
    #[serde(default)]
    pub track_id: Option<String>,
    pub periods: Vec<FeedPeriod>,
}

/// An entry excluded from a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRecord {
    pub platform: String,
    /// Position of the entry in its feed; `None` when the whole feed was dropped.
    pub index: Option<usize>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedBatch {
    pub records: Vec<RoyaltyRecord>,
    pub rejected: Vec<RejectedRecord>,
}

/// Platform identifiers are lowercase snake_case: "Apple Music" -> "apple_music".
pub fn normalize_platform_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Normalize `feeds`. Feeds without a track id are attributed to
/// `default_track_id`.
pub fn normalize(feeds: &[PlatformFeed], default_track_id: &str) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    let mut seen: HashSet<(String, String, Period)> = HashSet::new();

    for feed in feeds {
        let platform = normalize_platform_name(&feed.platform);
        if platform.is_empty() {
            warn!(raw = %feed.platform, "Dropping feed with empty platform name");
            batch.rejected.push(RejectedRecord {
                platform: feed.platform.clone(),
                index: None,
                reason: "empty platform name".to_string(),
            });
            continue;
        }

        let track_id = feed
            .track_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(default_track_id)
            .to_string();

        for (index, entry) in feed.periods.iter().enumerate() {
            let reject = |reason: String| RejectedRecord {
                platform: platform.clone(),
                index: Some(index),
                reason,
            };

            let Some(period) = Period::new(entry.year, entry.month) else {
                batch
                    .rejected
                    .push(reject(format!("month {} out of range", entry.month)));
                continue;
            };
            if !entry.revenue.is_finite() {
                batch.rejected.push(reject("revenue is not a number".to_string()));
                continue;
            }
            if entry.revenue < 0.0 {
                batch
                    .rejected
                    .push(reject(format!("negative revenue {}", entry.revenue)));
                continue;
            }
            if !seen.insert((track_id.clone(), platform.clone(), period)) {
                batch.rejected.push(reject(format!(
                    "duplicate record for track {} in {}",
                    track_id, period
                )));
                continue;
            }

            batch.records.push(RoyaltyRecord {
                track_id: track_id.clone(),
                platform: platform.clone(),
                period_start: period,
                amount: entry.revenue,
                stream_count: entry.stream_count,
            });
        }
    }

    debug!(
        records = batch.records.len(),
        rejected = batch.rejected.len(),
        "Normalized royalty feeds"
    );
    batch
}
