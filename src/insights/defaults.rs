//! Deterministic placeholder data that ships with every insights response.
//!
//! These values do not come from any provider, so a response stays usable
//! when every provider fails.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::royalties::tables::normalize_genre;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioCharacteristics {
    pub energy: f64,
    pub danceability: f64,
    pub valence: f64,
    pub acousticness: f64,
    pub tempo: f64,
}

impl AudioCharacteristics {
    fn for_genre(genre: &str) -> Self {
        let (energy, danceability, valence, acousticness, tempo) = match genre {
            "pop" => (0.70, 0.72, 0.60, 0.15, 118.0),
            "hiphop" | "rap" => (0.68, 0.80, 0.50, 0.10, 95.0),
            "rock" => (0.82, 0.50, 0.48, 0.08, 126.0),
            "electronic" | "edm" => (0.85, 0.75, 0.52, 0.04, 128.0),
            "jazz" => (0.40, 0.55, 0.55, 0.65, 110.0),
            "classical" => (0.20, 0.25, 0.35, 0.90, 90.0),
            "country" => (0.62, 0.58, 0.62, 0.35, 112.0),
            "rb" | "rnb" => (0.58, 0.70, 0.52, 0.20, 100.0),
            _ => (0.60, 0.60, 0.50, 0.30, 115.0),
        };
        Self {
            energy,
            danceability,
            valence,
            acousticness,
            tempo,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultInsights {
    pub audio_characteristics: AudioCharacteristics,
    /// Share of listening per genre; sums to 1.
    pub genre_distribution: BTreeMap<String, f64>,
}

impl DefaultInsights {
    pub fn for_genre(genre: &str) -> Self {
        let key = normalize_genre(genre);

        let mut genre_distribution = BTreeMap::new();
        if key.is_empty() {
            genre_distribution.insert("other".to_string(), 1.0);
        } else {
            let neighbour = if key == "pop" { "rock" } else { "pop" };
            genre_distribution.insert(key.clone(), 0.6);
            genre_distribution.insert(neighbour.to_string(), 0.25);
            *genre_distribution.entry("other".to_string()).or_insert(0.0) += 0.15;
        }

        Self {
            audio_characteristics: AudioCharacteristics::for_genre(&key),
            genre_distribution,
        }
    }
}
