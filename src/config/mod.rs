mod file_config;

pub use file_config::{FileConfig, InsightsConfig, ProviderConfig, ProviderConfigKind};

use crate::insights::{HttpAnalysisProvider, InsightProvider, OpenAiInsightProvider};
use crate::royalties::AnalyticsTables;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub provider_timeout_sec: u64,
    pub run_log_capacity: usize,
    pub alert_capacity: usize,
    pub tables_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    /// Deadline for providers that do not set their own.
    pub provider_timeout: Duration,
    pub run_log_capacity: usize,
    /// Alerts kept by the in-memory sink before the oldest are dropped.
    pub alert_capacity: usize,

    pub tables: AnalyticsTables,
    pub providers: Vec<ProviderSettings>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub kind: ProviderConfigKind,
    pub id: String,
    pub url: String,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub timeout: Option<Duration>,
}

impl ProviderSettings {
    fn from_file(config: ProviderConfig) -> Result<Self> {
        if config.id.trim().is_empty() {
            bail!("Insight provider id must not be empty");
        }
        if config.url.trim().is_empty() {
            bail!("Insight provider '{}' has no url", config.id);
        }
        if config.kind == ProviderConfigKind::Openai && config.model.is_none() {
            bail!("Insight provider '{}' of kind openai requires a model", config.id);
        }
        if config.timeout_secs == Some(0) {
            bail!("Insight provider '{}' timeout_secs must be positive", config.id);
        }
        Ok(Self {
            kind: config.kind,
            id: config.id,
            url: config.url,
            model: config.model,
            api_key_env: config.api_key_env,
            timeout: config.timeout_secs.map(Duration::from_secs),
        })
    }

    /// Reads the API key from the configured environment variable. A missing
    /// variable is logged and the provider runs unauthenticated.
    fn api_key(&self) -> Option<String> {
        let var = self.api_key_env.as_ref()?;
        match std::env::var(var) {
            Ok(key) if !key.is_empty() => Some(key),
            _ => {
                warn!(provider = %self.id, env = %var, "API key environment variable is not set");
                None
            }
        }
    }

    pub fn build(&self) -> Arc<dyn InsightProvider> {
        match self.kind {
            ProviderConfigKind::Openai => {
                let mut provider = OpenAiInsightProvider::new(
                    &self.id,
                    &self.url,
                    self.model.clone().unwrap_or_default(),
                    self.api_key(),
                );
                if let Some(timeout) = self.timeout {
                    provider = provider.with_timeout(timeout);
                }
                Arc::new(provider)
            }
            ProviderConfigKind::Http => {
                let mut provider =
                    HttpAnalysisProvider::new(&self.id, &self.url).with_api_key(self.api_key());
                if let Some(timeout) = self.timeout {
                    provider = provider.with_timeout(timeout);
                }
                Arc::new(provider)
            }
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);
        if port != 0 && port == metrics_port {
            bail!("port and metrics_port must differ (both {})", port);
        }

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let provider_timeout_sec = file
            .provider_timeout_sec
            .unwrap_or(cli.provider_timeout_sec);
        if provider_timeout_sec == 0 {
            bail!("provider_timeout_sec must be positive");
        }
        let run_log_capacity = file.run_log_capacity.unwrap_or(cli.run_log_capacity);
        let alert_capacity = file.alert_capacity.unwrap_or(cli.alert_capacity);

        // Inline [analytics] section takes precedence over a tables file
        let tables_path = file
            .analytics_file
            .map(PathBuf::from)
            .or_else(|| cli.tables_path.clone());
        let tables = match (file.analytics, tables_path) {
            (Some(tables), _) => {
                tables.validate().context("Invalid [analytics] section")?;
                tables
            }
            (None, Some(path)) => AnalyticsTables::load(&path)?,
            (None, None) => AnalyticsTables::default(),
        };

        let mut seen = HashSet::new();
        let providers = file
            .insights
            .unwrap_or_default()
            .providers
            .into_iter()
            .map(ProviderSettings::from_file)
            .collect::<Result<Vec<_>>>()?;
        for provider in &providers {
            if !seen.insert(provider.id.as_str()) {
                bail!("Duplicate insight provider id: {}", provider.id);
            }
        }

        Ok(Self {
            port,
            metrics_port,
            logging_level,
            provider_timeout: Duration::from_secs(provider_timeout_sec),
            run_log_capacity,
            alert_capacity,
            tables,
            providers,
        })
    }

    pub fn build_providers(&self) -> Vec<Arc<dyn InsightProvider>> {
        self.providers.iter().map(ProviderSettings::build).collect()
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cli() -> CliConfig {
        CliConfig {
            port: 3001,
            metrics_port: 9091,
            logging_level: RequestsLoggingLevel::Path,
            provider_timeout_sec: 15,
            run_log_capacity: 100,
            alert_capacity: 200,
            tables_path: None,
        }
    }

    fn load(content: &str) -> FileConfig {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        FileConfig::load(file.path()).unwrap()
    }

    #[test]
    fn test_parse_logging_level() {
        assert!(matches!(
            parse_logging_level("headers"),
            Some(RequestsLoggingLevel::Headers)
        ));
        // Case insensitive
        assert!(matches!(
            parse_logging_level("BODY"),
            Some(RequestsLoggingLevel::Body)
        ));
        assert!(parse_logging_level("invalid").is_none());
    }

    #[test]
    fn test_resolve_cli_only() {
        let config = AppConfig::resolve(&cli(), None).unwrap();

        assert_eq!(config.port, 3001);
        assert_eq!(config.metrics_port, 9091);
        assert_eq!(config.logging_level, RequestsLoggingLevel::Path);
        assert_eq!(config.provider_timeout, Duration::from_secs(15));
        assert_eq!(config.run_log_capacity, 100);
        assert_eq!(config.alert_capacity, 200);
        assert_eq!(config.tables, AnalyticsTables::default());
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let file_config = load(
            r#"
port = 4000
logging_level = "body"
provider_timeout_sec = 3
alert_capacity = 50

[analytics]
default_growth_rate = 1.2

[analytics.growth_rates]
Pop = 1.5

[[insights.providers]]
kind = "openai"
id = "narrative"
url = "http://localhost:11434/v1"
model = "llama3"

[[insights.providers]]
kind = "http"
id = "finance"
url = "http://finance.local/analyze"
timeout_secs = 2
"#,
        );

        let config = AppConfig::resolve(&cli(), Some(file_config)).unwrap();

        // TOML values should override CLI
        assert_eq!(config.port, 4000);
        assert_eq!(config.logging_level, RequestsLoggingLevel::Body);
        assert_eq!(config.provider_timeout, Duration::from_secs(3));
        // CLI value used when TOML doesn't specify
        assert_eq!(config.metrics_port, 9091);
        assert_eq!(config.run_log_capacity, 100);
        assert_eq!(config.alert_capacity, 50);

        assert_eq!(config.tables.growth_rate("pop"), 1.5);
        assert_eq!(config.tables.growth_rate("Rock"), 1.2);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[1].timeout, Some(Duration::from_secs(2)));
        assert_eq!(config.build_providers().len(), 2);
    }

    #[test]
    fn test_resolve_tables_file_from_cli() {
        let mut tables_file = tempfile::NamedTempFile::new().unwrap();
        tables_file
            .write_all(b"version = 2\ndefault_benchmark = 100.0\n")
            .unwrap();
        let cli = CliConfig {
            tables_path: Some(tables_file.path().to_path_buf()),
            ..cli()
        };

        let config = AppConfig::resolve(&cli, None).unwrap();
        assert_eq!(config.tables.version, 2);
        assert_eq!(config.tables.benchmark("Unknown"), 100.0);
    }

    #[test]
    fn test_resolve_rejects_invalid_tables() {
        let file_config = load("[analytics]\ndefault_growth_rate = -1.0\n");
        let result = AppConfig::resolve(&cli(), Some(file_config));
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_rejects_openai_without_model() {
        let file_config = load(
            r#"
[[insights.providers]]
kind = "openai"
id = "narrative"
url = "http://localhost/v1"
"#,
        );
        let result = AppConfig::resolve(&cli(), Some(file_config));
        assert!(result.unwrap_err().to_string().contains("requires a model"));
    }

    #[test]
    fn test_resolve_rejects_duplicate_provider_ids() {
        let file_config = load(
            r#"
[[insights.providers]]
kind = "http"
id = "same"
url = "http://a.local"

[[insights.providers]]
kind = "http"
id = "same"
url = "http://b.local"
"#,
        );
        let result = AppConfig::resolve(&cli(), Some(file_config));
        assert!(result.unwrap_err().to_string().contains("Duplicate"));
    }

    #[test]
    fn test_resolve_rejects_zero_timeout() {
        let cli = CliConfig {
            provider_timeout_sec: 0,
            ..cli()
        };
        assert!(AppConfig::resolve(&cli, None).is_err());
    }

    #[test]
    fn test_load_rejects_unknown_provider_kind() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[[insights.providers]]\nkind = \"grpc\"\nid = \"x\"\nurl = \"y\"\n")
            .unwrap();
        assert!(FileConfig::load(file.path()).is_err());
    }
}
