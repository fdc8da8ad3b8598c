// Type definitions and the request-level error taxonomy

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::documents::DocumentError;
use crate::export::ExportError;
use crate::llm::GenerationError;
use crate::prompt::PromptError;
use crate::queue::QueueError;

/// Kind of analysis requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisKind {
    Fundamentals,
    Strategy,
    Insights,
    ChallengeAnalysis,
    StrategicCalibration,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 5] = [
        AnalysisKind::Fundamentals,
        AnalysisKind::Strategy,
        AnalysisKind::Insights,
        AnalysisKind::ChallengeAnalysis,
        AnalysisKind::StrategicCalibration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Fundamentals => "fundamentals",
            AnalysisKind::Strategy => "strategy",
            AnalysisKind::Insights => "insights",
            AnalysisKind::ChallengeAnalysis => "challenge-analysis",
            AnalysisKind::StrategicCalibration => "strategic-calibration",
        }
    }

    /// Every kind currently needs the full strategic narrative.
    pub fn requires_strategic_text(&self) -> bool {
        true
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid analysis type provided")]
pub struct UnknownAnalysisKind;

impl FromStr for AnalysisKind {
    type Err = UnknownAnalysisKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnalysisKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or(UnknownAnalysisKind)
    }
}

/// Failures surfaced to HTTP callers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Auth(String),

    #[error("Too many requests, please try again later.")]
    RateLimitExceeded { retry_after: Duration },

    #[error("Max retries reached due to persistent rate limiting")]
    RateLimitExhausted { job_id: String, attempts: u32 },

    #[error("Analysis timed out after {} seconds", .timeout.as_secs())]
    TaskTimeout { job_id: String, timeout: Duration },

    #[error("Content blocked by API: {reason}")]
    ContentBlocked {
        reason: String,
        details: serde_json::Value,
    },

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

/// JSON body written for every failed request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: String,
}

const GENERIC_INTERNAL_MESSAGE: &str = "An unexpected error occurred on the server.";

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::ContentBlocked { .. } => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimitExceeded { .. } | AppError::RateLimitExhausted { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AppError::TaskTimeout { .. } | AppError::Upstream(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Auth(_) => "auth_error",
            AppError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            AppError::RateLimitExhausted { .. } => "rate_limit_exhausted",
            AppError::TaskTimeout { .. } => "task_timeout",
            AppError::ContentBlocked { .. } => "content_blocked",
            AppError::Upstream(_) => "upstream_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Builds the error response. Internal messages are only exposed in development mode.
    pub fn into_response_for(self, development: bool) -> Response {
        let status = self.status();
        let kind = self.kind();

        let (message, details) = match &self {
            AppError::Internal(message) if development => (message.clone(), None),
            AppError::Internal(_) => (GENERIC_INTERNAL_MESSAGE.to_string(), None),
            AppError::ContentBlocked { details, .. } => (self.to_string(), Some(details.clone())),
            AppError::RateLimitExhausted { job_id, attempts } => (
                self.to_string(),
                Some(serde_json::json!({ "jobId": job_id, "attempts": attempts })),
            ),
            AppError::TaskTimeout { job_id, timeout } => (
                self.to_string(),
                Some(serde_json::json!({ "jobId": job_id, "timeoutMs": timeout.as_millis() as u64 })),
            ),
            _ => (self.to_string(), None),
        };

        let body = ErrorBody {
            error: message,
            kind: kind.to_string(),
            details,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        let mut response = (status, Json(body)).into_response();
        if let AppError::RateLimitExceeded { retry_after } = self {
            let seconds = retry_after.as_secs().max(1);
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.into_response_for(false)
    }
}

impl From<PromptError> for AppError {
    fn from(err: PromptError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<UnknownAnalysisKind> for AppError {
    fn from(err: UnknownAnalysisKind) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::ContentBlocked { reason, details } => {
                AppError::ContentBlocked { reason, details }
            }
            GenerationError::NotConfigured => {
                AppError::Internal("API key is not configured on the server.".to_string())
            }
            other => AppError::Upstream(other.to_string()),
        }
    }
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::RateLimitExhausted { job_id, attempts } => {
                AppError::RateLimitExhausted { job_id, attempts }
            }
            QueueError::TaskTimeout { job_id, timeout } => AppError::TaskTimeout { job_id, timeout },
            QueueError::Task(inner) => inner.into(),
            QueueError::Closed { .. } => {
                AppError::Internal("The analysis queue is shutting down".to_string())
            }
        }
    }
}

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::InvalidType { .. }
            | DocumentError::TooLarge { .. }
            | DocumentError::UnexpectedField(_)
            | DocumentError::TooManyFiles { .. }
            | DocumentError::Multipart(_)
            | DocumentError::InvalidInputData(_) => AppError::Validation(err.to_string()),
            DocumentError::Extraction { .. } | DocumentError::Io(_) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

impl From<ExportError> for AppError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::MissingResults | ExportError::InvalidResults => {
                AppError::Validation(err.to_string())
            }
            ExportError::Render(_) => AppError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_kind_parse() {
        assert_eq!("fundamentals".parse::<AnalysisKind>(), Ok(AnalysisKind::Fundamentals));
        assert_eq!(
            "challenge-analysis".parse::<AnalysisKind>(),
            Ok(AnalysisKind::ChallengeAnalysis)
        );
        assert_eq!("swot".parse::<AnalysisKind>(), Err(UnknownAnalysisKind));
        assert_eq!("Fundamentals".parse::<AnalysisKind>(), Err(UnknownAnalysisKind));
    }

    #[test]
    fn test_analysis_kind_roundtrips_through_serde() {
        for kind in AnalysisKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Auth("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::RateLimitExhausted { job_id: "j".into(), attempts: 3 }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::TaskTimeout { job_id: "j".into(), timeout: Duration::from_secs(180) }.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::ContentBlocked { reason: "SAFETY".into(), details: serde_json::Value::Null }
                .status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_queue_errors_map_to_taxonomy() {
        let exhausted: AppError = QueueError::RateLimitExhausted {
            job_id: "fundamentals-1".into(),
            attempts: 3,
        }
        .into();
        assert_eq!(exhausted.kind(), "rate_limit_exhausted");

        let blocked: AppError = QueueError::Task(GenerationError::ContentBlocked {
            reason: "SAFETY".into(),
            details: serde_json::json!({ "blockReason": "SAFETY" }),
        })
        .into();
        assert_eq!(blocked.kind(), "content_blocked");

        let upstream: AppError =
            QueueError::Task(GenerationError::InvalidResponse("no candidates".into())).into();
        assert_eq!(upstream.kind(), "upstream_error");
    }

    #[tokio::test]
    async fn test_internal_message_hidden_outside_development() {
        let response = AppError::Internal("disk on fire".into()).into_response_for(false);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, GENERIC_INTERNAL_MESSAGE);
        assert_eq!(body.kind, "internal_error");

        let response = AppError::Internal("disk on fire".into()).into_response_for(true);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "disk on fire");
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = AppError::RateLimitExceeded { retry_after: Duration::from_millis(2500) }
            .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "2");
    }
}
