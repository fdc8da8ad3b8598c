use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;
use crate::documents::{DocxTextExtractor, MethodologyInfo, MethodologyStore, TextExtractor};
use crate::llm::GenerationClient;
use crate::queue::{JobQueue, QueueStats};

/// Per-client request limiter, keyed by client address.
pub type ClientLimiter = DefaultKeyedRateLimiter<String>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub queue: JobQueue,
    pub generator: Arc<dyn GenerationClient>,
    pub extractor: Arc<dyn TextExtractor>,
    pub methodology: MethodologyStore,
    pub analyze_limiter: Arc<ClientLimiter>,
}

impl AppState {
    pub fn new(config: Config, generator: Arc<dyn GenerationClient>) -> Self {
        let per_minute =
            NonZeroU32::new(config.rate_limit.requests_per_minute).unwrap_or(NonZeroU32::MIN);

        Self {
            queue: JobQueue::new(config.queue),
            methodology: MethodologyStore::new(&config.server.upload_dir),
            analyze_limiter: Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))),
            extractor: Arc::new(DocxTextExtractor),
            generator,
            config: Arc::new(config),
        }
    }

    /// Swaps the queue, e.g. for one with a different retry predicate.
    pub fn with_queue(mut self, queue: JobQueue) -> Self {
        self.queue = queue;
        self
    }
}

// Request and response bodies

/// JSON body of `POST /api/analyze`. Fields stay loose so validation can
/// tell a missing value from a malformed one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub analysis_type: Option<String>,
    pub input_data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub content: Value,
    pub analysis_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub analysis_results: Option<Value>,
    pub analysis_type: Option<String>,
}

/// Body of `GET /api/methodology/current`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodologyResponse {
    pub methodology: Option<MethodologyInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub queue: QueueStats,
}
