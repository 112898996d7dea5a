//! Versioned lookup tables driving forecasting, scoring and recommendations.
//!
//! Defaults are compiled in; deployments override them through the
//! `[analytics]` section of the TOML config file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::error::AnalyticsError;

pub const DEFAULT_TABLES_VERSION: u32 = 1;

/// A revenue-per-stream band: any RPS strictly above `min_rps` earns `factor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpsBand {
    pub min_rps: f64,
    pub factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsTables {
    pub version: u32,
    /// Monthly growth multiplier per genre.
    pub growth_rates: BTreeMap<String, f64>,
    pub default_growth_rate: f64,
    /// Expected average monthly revenue per genre.
    pub genre_benchmarks: BTreeMap<String, f64>,
    pub default_benchmark: f64,
    /// Ordered from the highest threshold down.
    pub rps_bands: Vec<RpsBand>,
    pub rps_floor_factor: f64,
    pub known_platforms: Vec<String>,
    pub genre_tips: BTreeMap<String, Vec<String>>,
}

/// Genre keys match regardless of case and punctuation ("Hip-Hop" == "hip hop").
pub fn normalize_genre(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

fn lookup<'a, V>(map: &'a BTreeMap<String, V>, key: &str) -> Option<&'a V> {
    let wanted = normalize_genre(key);
    if wanted.is_empty() {
        return None;
    }
    map.iter()
        .find(|(k, _)| normalize_genre(k) == wanted)
        .map(|(_, v)| v)
}

impl Default for AnalyticsTables {
    fn default() -> Self {
        let growth_rates = [
            ("Pop", 1.08),
            ("Hip-Hop", 1.12),
            ("Rock", 1.03),
            ("Electronic", 1.09),
            ("R&B", 1.07),
            ("Country", 1.04),
            ("Jazz", 1.02),
            ("Classical", 1.01),
            ("Latin", 1.10),
            ("Indie", 1.06),
        ];
        let genre_benchmarks = [
            ("Pop", 5000.0),
            ("Hip-Hop", 6000.0),
            ("Rock", 3500.0),
            ("Electronic", 4000.0),
            ("R&B", 4500.0),
            ("Country", 3000.0),
            ("Jazz", 1500.0),
            ("Classical", 1200.0),
            ("Latin", 4200.0),
            ("Indie", 2000.0),
        ];
        let genre_tips = [
            (
                "Pop",
                vec![
                    "Pitch new releases to editorial pop playlists",
                    "Use short-form video to seed hooks before release",
                ],
            ),
            (
                "Hip-Hop",
                vec![
                    "Schedule features with artists in adjacent scenes",
                    "Release singles on a steady cadence to keep algorithmic reach",
                ],
            ),
            (
                "Electronic",
                vec![
                    "Register DJ performance rights for club and festival plays",
                    "Publish extended mixes alongside radio edits",
                ],
            ),
            (
                "Classical",
                vec![
                    "Check per-movement track splits, they affect per-stream payouts",
                    "Target focus and study playlists",
                ],
            ),
            (
                "Rock",
                vec![
                    "Pair releases with tour dates to lift regional streaming",
                    "Offer live recordings as bonus catalog",
                ],
            ),
        ];

        Self {
            version: DEFAULT_TABLES_VERSION,
            growth_rates: growth_rates
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            default_growth_rate: 1.05,
            genre_benchmarks: genre_benchmarks
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            default_benchmark: 2500.0,
            rps_bands: vec![
                RpsBand { min_rps: 0.008, factor: 1.0 },
                RpsBand { min_rps: 0.006, factor: 0.8 },
                RpsBand { min_rps: 0.004, factor: 0.6 },
                RpsBand { min_rps: 0.002, factor: 0.4 },
            ],
            rps_floor_factor: 0.2,
            known_platforms: [
                "spotify",
                "apple_music",
                "youtube_music",
                "amazon_music",
                "tidal",
                "deezer",
                "pandora",
                "soundcloud",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            genre_tips: genre_tips
                .into_iter()
                .map(|(k, tips)| (k.to_string(), tips.into_iter().map(String::from).collect()))
                .collect(),
        }
    }
}

impl AnalyticsTables {
    /// Load a standalone tables file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read analytics tables: {:?}", path))?;
        let tables: AnalyticsTables = toml::from_str(&content)
            .with_context(|| format!("Failed to parse analytics tables: {:?}", path))?;
        tables.validate()?;
        Ok(tables)
    }

    pub fn validate(&self) -> Result<(), AnalyticsError> {
        let bad_rate = self
            .growth_rates
            .iter()
            .find(|(_, rate)| !rate.is_finite() || **rate <= 0.0);
        if let Some((genre, rate)) = bad_rate {
            return Err(AnalyticsError::InvalidInput(format!(
                "growth rate for '{}' must be positive, got {}",
                genre, rate
            )));
        }
        if !self.default_growth_rate.is_finite() || self.default_growth_rate <= 0.0 {
            return Err(AnalyticsError::InvalidInput(
                "default_growth_rate must be positive".to_string(),
            ));
        }
        let bad_benchmark = self
            .genre_benchmarks
            .iter()
            .find(|(_, b)| !b.is_finite() || **b <= 0.0);
        if let Some((genre, b)) = bad_benchmark {
            return Err(AnalyticsError::InvalidInput(format!(
                "benchmark for '{}' must be positive, got {}",
                genre, b
            )));
        }
        if !self.default_benchmark.is_finite() || self.default_benchmark <= 0.0 {
            return Err(AnalyticsError::InvalidInput(
                "default_benchmark must be positive".to_string(),
            ));
        }
        if self
            .rps_bands
            .windows(2)
            .any(|pair| pair[0].min_rps < pair[1].min_rps)
        {
            return Err(AnalyticsError::InvalidInput(
                "rps_bands must be ordered from the highest threshold down".to_string(),
            ));
        }
        let factors = self
            .rps_bands
            .iter()
            .map(|band| band.factor)
            .chain(std::iter::once(self.rps_floor_factor));
        for factor in factors {
            if !factor.is_finite() || !(0.0..=1.0).contains(&factor) {
                return Err(AnalyticsError::InvalidInput(format!(
                    "rps factors must be within [0, 1], got {}",
                    factor
                )));
            }
        }
        Ok(())
    }

    pub fn growth_rate(&self, genre: &str) -> f64 {
        lookup(&self.growth_rates, genre)
            .copied()
            .unwrap_or(self.default_growth_rate)
    }

    pub fn benchmark(&self, genre: &str) -> f64 {
        lookup(&self.genre_benchmarks, genre)
            .copied()
            .unwrap_or(self.default_benchmark)
    }

    pub fn rps_factor(&self, rps: f64) -> f64 {
        self.rps_bands
            .iter()
            .find(|band| rps > band.min_rps)
            .map(|band| band.factor)
            .unwrap_or(self.rps_floor_factor)
    }

    pub fn genre_tips(&self, genre: &str) -> Option<&[String]> {
        lookup(&self.genre_tips, genre).map(|tips| tips.as_slice())
    }
}
