// Request guards applied in front of the API routes

pub mod auth;
pub mod cors;
pub mod rate_limiter;

pub use auth::{require_api_key, API_KEY_HEADER};
pub use cors::cors_layer;
pub use rate_limiter::{client_key, limit_analyze_requests};
