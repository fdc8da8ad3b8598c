// Strategy Lens - strategic text analysis over a rate-limited generation API

pub mod config;
pub mod documents;
pub mod export;
pub mod extract;
pub mod llm;
pub mod middleware;
pub mod models;
pub mod prompt;
pub mod queue;
pub mod routes;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
