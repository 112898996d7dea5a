//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per royalty endpoint.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("GET request failed")
    }

    pub async fn post(&self, path: &str, body: Value) -> Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .expect("POST request failed")
    }

    pub async fn normalize(&self, feeds: Value, default_track_id: &str) -> Response {
        self.post(
            "/v1/royalties/normalize",
            json!({ "feeds": feeds, "defaultTrackId": default_track_id }),
        )
        .await
    }

    pub async fn reconcile(&self, royalties: &Value, expectations: Value) -> Response {
        self.post(
            "/v1/royalties/reconcile",
            json!({ "royalties": royalties, "expectations": expectations }),
        )
        .await
    }

    pub async fn check_discrepancies(&self, body: Value) -> Response {
        self.post("/v1/royalties/discrepancies", body).await
    }

    pub async fn insights(&self, body: Value) -> Response {
        self.post("/v1/royalties/insights", body).await
    }

    pub async fn audit_report(&self, format: &str, body: Value) -> Response {
        self.post(&format!("/v1/royalties/audit-report?format={}", format), body)
            .await
    }

    pub async fn alerts(&self) -> Response {
        self.get("/v1/royalties/alerts").await
    }

    pub async fn runs(&self) -> Response {
        self.get("/v1/royalties/runs").await
    }
}
