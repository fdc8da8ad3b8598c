use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Capability interface for the external generation API.
///
/// The queue and the request handler only ever talk to this trait, so any
/// provider that can turn a prompt into text can be swapped in.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_output_tokens: Option<u32>,
    /// Ask the provider to answer with JSON only.
    pub json_response: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            max_output_tokens: None,
            json_response: true,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    #[error("rate limited by generation API: {0}")]
    RateLimited(String),

    #[error("Content blocked by API: {reason}")]
    ContentBlocked {
        reason: String,
        details: serde_json::Value,
    },

    #[error("generation API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response from generation API: {0}")]
    InvalidResponse(String),

    #[error("generation request failed: {0}")]
    Request(String),

    #[error("generation API key is not configured")]
    NotConfigured,
}

impl GenerationError {
    /// Default retry predicate: only rate-limit signals are worth waiting out.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GenerationError::RateLimited(_))
    }
}
