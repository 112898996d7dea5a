use anyhow::{Context, Result};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use super::error::ApiError;
use super::{log_requests, metrics, state::*, RequestsLoggingLevel, ServerConfig};
use crate::insights::{InsightsRequest, InsightsResponse, InsightsService, ARTIST_AGGREGATE_ID};
use crate::royalties::{
    AuditRequest, CatalogExpectation, DiscrepancyAlert, DiscrepancyCheckRequest, ExportFormat,
    Forecast, ForecastHorizon, ForecastInput, HealthScore, NormalizedBatch, Period, PlatformFeed,
    ReconciliationResult, RejectedRecord, RoyaltyPipeline, RoyaltyRecord, RunLogEntry,
    StoredAlert,
};

const DEFAULT_ALERTS_LIMIT: usize = 50;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct NormalizeBody {
    pub feeds: Vec<PlatformFeed>,
    #[serde(default)]
    pub default_track_id: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ReconcileBody {
    pub royalties: Vec<RoyaltyRecord>,
    #[serde(default)]
    pub expectations: Vec<CatalogExpectation>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ForecastBody {
    pub total_historical_revenue: f64,
    pub months_observed: u32,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub horizon: ForecastHorizon,
    #[serde(default)]
    pub last_observed: Option<Period>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct HealthBody {
    pub royalties: Vec<RoyaltyRecord>,
    #[serde(default)]
    pub genre: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct AuditReportBody {
    pub royalties: Vec<RoyaltyRecord>,
    #[serde(default)]
    pub expectations: Vec<CatalogExpectation>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub rejected_records: Vec<RejectedRecord>,
    /// When present, provider insights are generated and attached.
    #[serde(default)]
    pub insights: Option<InsightsRequest>,
}

#[derive(Deserialize, Debug, Default)]
struct AuditReportQuery {
    pub format: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct AlertsQuery {
    pub limit: Option<usize>,
}

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>, endpoint: &str) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::from(rejection).recorded(endpoint))
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: state.version.clone(),
    };
    Json(stats)
}

async fn normalize(
    State(pipeline): State<GuardedPipeline>,
    payload: Result<Json<NormalizeBody>, JsonRejection>,
) -> Result<Json<NormalizedBatch>, ApiError> {
    let body = parse_body(payload, "/v1/royalties/normalize")?;
    let default_track_id = body
        .default_track_id
        .as_deref()
        .unwrap_or(ARTIST_AGGREGATE_ID);
    Ok(Json(pipeline.normalize(&body.feeds, default_track_id)))
}

async fn reconcile(
    State(pipeline): State<GuardedPipeline>,
    payload: Result<Json<ReconcileBody>, JsonRejection>,
) -> Result<Json<Vec<ReconciliationResult>>, ApiError> {
    let body = parse_body(payload, "/v1/royalties/reconcile")?;
    Ok(Json(pipeline.reconcile(&body.royalties, &body.expectations)))
}

async fn check_discrepancies(
    State(pipeline): State<GuardedPipeline>,
    payload: Result<Json<DiscrepancyCheckRequest>, JsonRejection>,
) -> Result<Json<Option<DiscrepancyAlert>>, ApiError> {
    const ENDPOINT: &str = "/v1/royalties/discrepancies";
    let request = parse_body(payload, ENDPOINT)?;
    let alert = pipeline
        .check_discrepancies(request)
        .await
        .map_err(|e| ApiError::from(e).recorded(ENDPOINT))?;
    Ok(Json(alert))
}

async fn forecast(
    State(pipeline): State<GuardedPipeline>,
    payload: Result<Json<ForecastBody>, JsonRejection>,
) -> Result<Json<Forecast>, ApiError> {
    let body = parse_body(payload, "/v1/royalties/forecast")?;
    let input = ForecastInput {
        total_historical_revenue: body.total_historical_revenue,
        months_observed: body.months_observed,
        genre: body.genre,
        last_observed: body.last_observed,
    };
    Ok(Json(pipeline.forecast(&input, body.horizon)))
}

async fn health_score(
    State(pipeline): State<GuardedPipeline>,
    payload: Result<Json<HealthBody>, JsonRejection>,
) -> Result<Json<HealthScore>, ApiError> {
    let body = parse_body(payload, "/v1/royalties/health")?;
    Ok(Json(pipeline.health_score(&body.royalties, &body.genre)))
}

async fn generate_insights(
    State(insights): State<GuardedInsightsService>,
    payload: Result<Json<InsightsRequest>, JsonRejection>,
) -> Result<Json<InsightsResponse>, ApiError> {
    const ENDPOINT: &str = "/v1/royalties/insights";
    let request = parse_body(payload, ENDPOINT)?;
    let response = insights
        .generate(request)
        .await
        .map_err(|e| ApiError::from(e).recorded(ENDPOINT))?;
    Ok(Json(response))
}

async fn audit_report(
    State(state): State<ServerState>,
    query: Result<Query<AuditReportQuery>, QueryRejection>,
    payload: Result<Json<AuditReportBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    const ENDPOINT: &str = "/v1/royalties/audit-report";
    let Query(query) = query.map_err(|e| ApiError::from(e).recorded(ENDPOINT))?;
    let format = match query.format.as_deref() {
        None => ExportFormat::Json,
        Some(raw) => {
            ExportFormat::from_str(raw).map_err(|e| ApiError::from(e).recorded(ENDPOINT))?
        }
    };
    let body = parse_body(payload, ENDPOINT)?;

    let insights = match body.insights {
        Some(request) => {
            let response = state
                .insights
                .generate(request)
                .await
                .map_err(|e| ApiError::from(e).recorded(ENDPOINT))?;
            Some(serde_json::to_value(response).map_err(|e| ApiError::Internal(e.to_string()))?)
        }
        None => None,
    };

    let request = AuditRequest {
        royalties: body.royalties,
        expectations: body.expectations,
        genre: body.genre,
        rejected_records: body.rejected_records,
    };
    let report = state.pipeline.audit_report(request, insights);

    let exported = report
        .export(format)
        .map_err(|e| ApiError::from(e).recorded(ENDPOINT))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, format.content_type())],
        exported,
    )
        .into_response())
}

async fn list_alerts(
    State(pipeline): State<GuardedPipeline>,
    query: Result<Query<AlertsQuery>, QueryRejection>,
) -> Result<Json<Vec<StoredAlert>>, ApiError> {
    const ENDPOINT: &str = "/v1/royalties/alerts";
    let Query(query) = query.map_err(|e| ApiError::from(e).recorded(ENDPOINT))?;
    let limit = query.limit.unwrap_or(DEFAULT_ALERTS_LIMIT);
    let alerts = pipeline
        .alert_sink()
        .recent(limit)
        .await
        .map_err(|e| ApiError::from(e).recorded(ENDPOINT))?;
    Ok(Json(alerts))
}

async fn list_runs(State(pipeline): State<GuardedPipeline>) -> Json<Vec<RunLogEntry>> {
    Json(pipeline.run_log().entries())
}

impl ServerState {
    fn new(
        config: ServerConfig,
        pipeline: Arc<RoyaltyPipeline>,
        insights: Arc<InsightsService>,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            pipeline,
            insights,
            version: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }
}

pub fn make_app(
    config: ServerConfig,
    pipeline: Arc<RoyaltyPipeline>,
    insights: Arc<InsightsService>,
) -> Router {
    let state = ServerState::new(config, pipeline, insights);

    let royalty_routes: Router = Router::new()
        .route("/normalize", post(normalize))
        .route("/reconcile", post(reconcile))
        .route("/discrepancies", post(check_discrepancies))
        .route("/forecast", post(forecast))
        .route("/health", post(health_score))
        .route("/insights", post(generate_insights))
        .route("/audit-report", post(audit_report))
        .route("/alerts", get(list_alerts))
        .route("/runs", get(list_runs))
        .with_state(state.clone());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(home))
        .with_state(state.clone())
        .nest("/v1/royalties", royalty_routes)
        .layer(cors)
        .layer(middleware::from_fn_with_state(state, log_requests))
}

fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics::metrics_handler))
}

pub async fn run_server(
    pipeline: Arc<RoyaltyPipeline>,
    insights: Arc<InsightsService>,
    requests_logging_level: RequestsLoggingLevel,
    port: u16,
    metrics_port: u16,
) -> Result<()> {
    let config = ServerConfig {
        requests_logging_level,
        port,
        metrics_port,
    };
    let app = make_app(config, pipeline, insights);

    let metrics_listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, make_metrics_app()).await {
            warn!("Metrics server stopped: {}", e);
        }
    });

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on port {}", port);

    Ok(axum::serve(listener, app).await?)
}
