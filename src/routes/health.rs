use axum::{extract::State, routing::get, Json, Router};

use crate::models::{AppState, HealthResponse};

pub const HEALTH_PATH: &str = "/api/health";

pub fn router() -> Router<AppState> {
    Router::new().route(HEALTH_PATH, get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        queue: state.queue.stats(),
    })
}
