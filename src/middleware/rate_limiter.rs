// Per-client request throttle for the analyze endpoint

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::clock::{Clock, DefaultClock};
use tracing::warn;

use crate::models::AppState;
use crate::types::AppError;

/// Identifies the caller: socket peer, then the first forwarded hop, then "unknown".
pub fn client_key(req: &Request) -> String {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    req.headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|hop| hop.trim().to_string())
        .filter(|hop| !hop.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn limit_analyze_requests(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let key = client_key(&req);

    match state.analyze_limiter.check_key(&key) {
        Ok(()) => next.run(req).await,
        Err(not_until) => {
            let retry_after = not_until.wait_time_from(DefaultClock::default().now());
            warn!(
                client = %key,
                retry_after_ms = retry_after.as_millis() as u64,
                "Analyze request rate limit exceeded"
            );
            AppError::RateLimitExceeded { retry_after }.into_response_for(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_client_key_prefers_socket_address() {
        let mut req = axum::http::Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 4000))));
        assert_eq!(client_key(&req), "10.0.0.1");
    }

    #[test]
    fn test_client_key_falls_back_to_forwarded_header() {
        let req = axum::http::Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&req), "203.0.113.7");

        let bare = axum::http::Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&bare), "unknown");
    }
}
