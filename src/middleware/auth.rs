// Shared-secret authentication

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::models::AppState;
use crate::routes::health::HEALTH_PATH;
use crate::types::AppError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Requires `x-api-key` to match the configured frontend key.
///
/// The health check is always open. Without a configured key every request passes.
pub async fn require_api_key(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(expected) = state.config.auth.api_key.as_deref() else {
        return next.run(req).await;
    };
    if req.uri().path() == HEALTH_PATH {
        return next.run(req).await;
    }

    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(key) if keys_match(key, expected) => next.run(req).await,
        _ => {
            warn!(path = %req.uri().path(), "Rejected request with missing or invalid API key");
            AppError::Auth("Invalid API key".to_string()).into_response_for(false)
        }
    }
}

// Compares every byte so timing does not reveal the matching prefix length.
fn keys_match(provided: &str, expected: &str) -> bool {
    let (a, b) = (provided.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_match() {
        assert!(keys_match("secret", "secret"));
        assert!(!keys_match("secret", "Secret"));
        assert!(!keys_match("secret", "secret2"));
        assert!(!keys_match("", "secret"));
    }
}
