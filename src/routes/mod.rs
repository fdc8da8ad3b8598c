//! API Routes
//!
//! - `/api/health` - liveness check with queue counters (no auth)
//! - `/api/analyze` - run an analysis through the generation queue
//! - `/api/methodology/current` - metadata of the stored methodology
//! - `/api/export` - render an analysis result as a .docx

pub mod analyze;
pub mod export;
pub mod health;
pub mod methodology;

use axum::{extract::DefaultBodyLimit, middleware, response::Response, Router};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::documents::{MAX_ADDITIONAL_DOCUMENTS, MAX_UPLOAD_BYTES};
use crate::middleware::{cors_layer, require_api_key};
use crate::models::AppState;
use crate::types::AppError;

/// Room for a methodology plus every additional document, with slack for form fields.
pub const MAX_BODY_BYTES: usize = MAX_UPLOAD_BYTES * (MAX_ADDITIONAL_DOCUMENTS + 1) + 1024 * 1024;

/// Create the main application router
///
/// Layers, innermost first: API key check, body limit, request tracing, CORS.
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    Router::new()
        .merge(health::router())
        .merge(analyze::router(state.clone()))
        .merge(methodology::router())
        .merge(export::router())
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.server))
        .with_state(state)
}

/// Renders an error, exposing internal details only in development.
pub(crate) fn error_response(state: &AppState, err: impl Into<AppError>) -> Response {
    let err: AppError = err.into();
    err.into_response_for(state.config.server.is_development())
}
