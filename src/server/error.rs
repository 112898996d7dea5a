use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use super::metrics;
use crate::royalties::AnalyticsError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
pub enum ApiError {
    Analytics(AnalyticsError),
    /// The request body or query could not be decoded.
    BadRequest(String),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Analytics(AnalyticsError::UnsupportedExport(_)) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Analytics(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Analytics(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ApiError::Analytics(AnalyticsError::MissingField(_)) => "missing_field",
            ApiError::Analytics(AnalyticsError::InvalidInput(_)) => "invalid_input",
            ApiError::Analytics(AnalyticsError::UnsupportedExport(_)) => "unsupported_export",
            ApiError::Analytics(AnalyticsError::Serialization(_)) => "serialization",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Internal(_) => "internal",
        }
    }

    /// Counts the error against `endpoint` in the error metrics.
    pub fn recorded(self, endpoint: &str) -> Self {
        metrics::record_error(self.error_type(), endpoint);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Analytics(e) => e.to_string(),
            ApiError::BadRequest(msg) | ApiError::Internal(msg) => msg,
        };
        if status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED {
            error!("Request failed: {}", message);
        }
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<AnalyticsError> for ApiError {
    fn from(err: AnalyticsError) -> Self {
        ApiError::Analytics(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(AnalyticsError::MissingField("artistId")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AnalyticsError::UnsupportedExport("pdf".to_string())).status(),
            StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(
            ApiError::from(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_recorded_counts_error_type() {
        metrics::init_metrics();
        let before = metrics::ERRORS_TOTAL
            .with_label_values(&["missing_field", "/test"])
            .get();

        let _ = ApiError::from(AnalyticsError::MissingField("artistId")).recorded("/test");

        let after = metrics::ERRORS_TOTAL
            .with_label_values(&["missing_field", "/test"])
            .get();
        assert_eq!(after - before, 1.0);
    }
}
