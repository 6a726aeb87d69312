use axum::{Json, extract::State};
use std::sync::Arc;

use crate::limiters::LimiterKind;
use crate::models::HealthResponse;
use crate::state::AppState;

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let tracked_keys = LimiterKind::ALL
        .iter()
        .map(|kind| (kind.name().to_string(), state.limiters.get(*kind).tracked_keys()))
        .collect();

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        tracked_keys,
    })
}
