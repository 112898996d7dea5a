use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use royalty_analytics::config::{AppConfig, CliConfig, FileConfig};
use royalty_analytics::insights::{InsightAggregator, InsightProvider, InsightsService};
use royalty_analytics::royalties::{
    InMemoryAlertSink, RoyaltyPipeline, RunLog, UniformNoise, DEFAULT_ALERT_CAPACITY,
};
use royalty_analytics::server::{self, run_server, RequestsLoggingLevel};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Its values override the CLI ones.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Deadline in seconds for insight providers without their own timeout.
    #[clap(long, default_value_t = 15)]
    pub provider_timeout_sec: u64,

    /// Number of pipeline runs kept in the run log.
    #[clap(long, default_value_t = 500)]
    pub run_log_capacity: usize,

    /// Number of discrepancy alerts kept in memory.
    #[clap(long, default_value_t = DEFAULT_ALERT_CAPACITY)]
    pub alert_capacity: usize,

    /// Path to a TOML file with the analytics lookup tables.
    #[clap(long, value_parser = parse_path)]
    pub tables: Option<PathBuf>,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            provider_timeout_sec: args.provider_timeout_sec,
            run_log_capacity: args.run_log_capacity,
            alert_capacity: args.alert_capacity,
            tables_path: args.tables.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}...", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let app_config = AppConfig::resolve(&CliConfig::from(&cli_args), file_config)?;

    info!("Initializing metrics...");
    server::metrics::init_metrics();

    info!(
        version = app_config.tables.version,
        "Analytics tables loaded"
    );
    let pipeline = Arc::new(RoyaltyPipeline::new(
        Arc::new(app_config.tables.clone()),
        Arc::new(UniformNoise::standard()),
        Arc::new(InMemoryAlertSink::with_capacity(
            app_config.alert_capacity,
        )),
        Arc::new(RunLog::new(app_config.run_log_capacity)),
    ));

    let providers = app_config.build_providers();
    for provider in &providers {
        info!(provider = provider.id(), kind = ?provider.kind(), "Insight provider configured");
    }
    if providers.is_empty() {
        info!("No insight providers configured, insights use computed summaries");
    }
    let aggregator = Arc::new(InsightAggregator::new(
        providers,
        app_config.provider_timeout,
    )?);
    let insights = Arc::new(InsightsService::new(pipeline.clone(), aggregator));

    info!("Ready to serve at port {}!", app_config.port);
    info!("Metrics available at port {}!", app_config.metrics_port);
    run_server(
        pipeline,
        insights,
        app_config.logging_level,
        app_config.port,
        app_config.metrics_port,
    )
    .await
}
