use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use crate::models::{AppState, MethodologyResponse};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/methodology/current", get(current_methodology))
}

/// `{ "methodology": ... }`, with `null` when none was uploaded.
async fn current_methodology(State(state): State<AppState>) -> Response {
    match state.methodology.current().await {
        Ok(methodology) => Json(MethodologyResponse { methodology }).into_response(),
        Err(err) => super::error_response(&state, err),
    }
}
