// Gemini adapter over the generateContent REST endpoint
// API Reference: https://ai.google.dev/api/generate-content

use crate::llm::provider::{GenerationClient, GenerationError, GenerationOptions};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro-latest";

pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

// Request types for the Gemini API
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

// Response types for the Gemini API
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiCandidateContent>,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Deserialize)]
struct GeminiError {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, GEMINI_API_BASE)
    }

    /// Point the client at a different endpoint (proxies, tests).
    pub fn with_base_url(
        api_key: Option<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.filter(|key| !key.is_empty()),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn classify_failure(status: StatusCode, body: &str) -> GenerationError {
        let parsed = serde_json::from_str::<GeminiErrorResponse>(body).ok();
        let exhausted = parsed
            .as_ref()
            .and_then(|e| e.error.status.as_deref())
            .map(|s| s == "RESOURCE_EXHAUSTED")
            .unwrap_or(false);
        let message = parsed
            .map(|e| e.error.message)
            .unwrap_or_else(|| body.to_string());

        if status == StatusCode::TOO_MANY_REQUESTS || exhausted {
            GenerationError::RateLimited(message)
        } else {
            GenerationError::Api {
                status: status.as_u16(),
                message,
            }
        }
    }

    fn first_candidate_text(response: GenerateContentResponse) -> Result<String, GenerationError> {
        if let Some(feedback) = response.prompt_feedback {
            if let Some(reason) = feedback.get("blockReason").and_then(|r| r.as_str()) {
                warn!(reason, "Gemini blocked the prompt");
                return Err(GenerationError::ContentBlocked {
                    reason: reason.to_string(),
                    details: feedback.clone(),
                });
            }
        }

        let candidate = response.candidates.into_iter().next().ok_or_else(|| {
            GenerationError::InvalidResponse("no candidates in response".to_string())
        })?;

        candidate
            .content
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                GenerationError::InvalidResponse("missing text content in candidate".to_string())
            })
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        let api_key = self.api_key.as_deref().ok_or(GenerationError::NotConfigured)?;

        let request = GenerateContentRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_output_tokens,
                response_mime_type: options.json_response.then_some("application/json"),
            },
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "Calling Gemini");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Request(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Gemini returned an error status");
            return Err(Self::classify_failure(status, &body));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            GenerationError::InvalidResponse(format!("failed to parse Gemini response: {}", e))
        })?;

        Self::first_candidate_text(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = "gemini-test";

    fn endpoint_path() -> String {
        format!("/models/{}:generateContent", MODEL)
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = GeminiClient::with_base_url(Some("k".into()), MODEL, "http://localhost:9/");
        assert_eq!(
            client.endpoint(),
            "http://localhost:9/models/gemini-test:generateContent"
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let client = GeminiClient::new(Some(String::new()), MODEL);
        let err = client
            .generate("prompt", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::NotConfigured));
    }

    #[tokio::test]
    async fn test_returns_first_candidate_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", endpoint_path().as_str())
            .match_header("x-goog-api-key", "secret")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "generationConfig": { "responseMimeType": "application/json" }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"candidates":[{"content":{"parts":[{"text":"{\"ok\":true}"}]}}]}"#,
            )
            .create_async()
            .await;

        let client = GeminiClient::with_base_url(Some("secret".into()), MODEL, server.url());
        let text = client
            .generate("prompt", &GenerationOptions::default())
            .await
            .unwrap();

        assert_eq!(text, r#"{"ok":true}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_429_is_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", endpoint_path().as_str())
            .with_status(429)
            .with_body(r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#)
            .create_async()
            .await;

        let client = GeminiClient::with_base_url(Some("k".into()), MODEL, server.url());
        let err = client
            .generate("prompt", &GenerationOptions::default())
            .await
            .unwrap_err();

        assert!(err.is_rate_limited());
        assert!(err.to_string().contains("Quota exceeded"));
    }

    #[tokio::test]
    async fn test_server_error_is_not_retryable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", endpoint_path().as_str())
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let client = GeminiClient::with_base_url(Some("k".into()), MODEL, server.url());
        let err = client
            .generate("prompt", &GenerationOptions::default())
            .await
            .unwrap_err();

        match err {
            GenerationError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "upstream exploded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_block_reason_becomes_content_blocked() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", endpoint_path().as_str())
            .with_status(200)
            .with_body(r#"{"promptFeedback":{"blockReason":"SAFETY","safetyRatings":[]}}"#)
            .create_async()
            .await;

        let client = GeminiClient::with_base_url(Some("k".into()), MODEL, server.url());
        let err = client
            .generate("prompt", &GenerationOptions::default())
            .await
            .unwrap_err();

        match err {
            GenerationError::ContentBlocked { reason, details } => {
                assert_eq!(reason, "SAFETY");
                assert_eq!(details["blockReason"], "SAFETY");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_candidates_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", endpoint_path().as_str())
            .with_status(200)
            .with_body(r#"{"candidates":[]}"#)
            .create_async()
            .await;

        let client = GeminiClient::with_base_url(Some("k".into()), MODEL, server.url());
        let err = client
            .generate("prompt", &GenerationOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::InvalidResponse(_)));
    }
}
