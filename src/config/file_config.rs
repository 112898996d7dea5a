use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::royalties::AnalyticsTables;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub provider_timeout_sec: Option<u64>,
    pub run_log_capacity: Option<usize>,
    pub alert_capacity: Option<usize>,
    /// Separate TOML file holding the analytics tables.
    pub analytics_file: Option<String>,

    // Feature configs
    pub analytics: Option<AnalyticsTables>,
    pub insights: Option<InsightsConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct InsightsConfig {
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderConfigKind {
    /// OpenAI-compatible chat completions endpoint.
    Openai,
    /// JSON-over-HTTP analysis service.
    Http,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderConfigKind,
    pub id: String,
    pub url: String,
    pub model: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
