use axum::extract::FromRef;
use std::sync::Arc;
use std::time::Instant;

use crate::insights::InsightsService;
use crate::royalties::RoyaltyPipeline;

use super::ServerConfig;

pub type GuardedPipeline = Arc<RoyaltyPipeline>;
pub type GuardedInsightsService = Arc<InsightsService>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub pipeline: GuardedPipeline,
    pub insights: GuardedInsightsService,
    pub version: String,
}

impl FromRef<ServerState> for GuardedPipeline {
    fn from_ref(input: &ServerState) -> Self {
        input.pipeline.clone()
    }
}

impl FromRef<ServerState> for GuardedInsightsService {
    fn from_ref(input: &ServerState) -> Self {
        input.insights.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
