// CORS configuration

use axum::http::{header, request::Parts, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use super::auth::API_KEY_HEADER;
use crate::config::ServerConfig;

/// Preview deployments get a fresh subdomain each time.
const PREVIEW_ORIGIN_SUFFIX: &str = ".vercel.app";

pub fn is_origin_allowed(origin: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|o| o == origin) || origin.ends_with(PREVIEW_ORIGIN_SUFFIX)
}

pub fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let allowed = config.allowed_origins.clone();

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin
                    .to_str()
                    .map(|origin| is_origin_allowed(origin, &allowed))
                    .unwrap_or(false)
            },
        ))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(API_KEY_HEADER),
        ])
        .allow_credentials(true)
        .expose_headers([header::CONTENT_DISPOSITION])
}
