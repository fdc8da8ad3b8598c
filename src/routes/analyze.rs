//! Analysis Endpoint
//!
//! `POST /api/analyze` accepts either a JSON body or a multipart form carrying
//! the same fields plus optional `.docx` uploads. The request is validated,
//! supporting documents are turned into text, and the prompt goes through the
//! generation queue. Nothing reaches the queue until validation has passed.

use std::sync::Arc;

use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::header,
    middleware,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::documents::{
    check_upload, combine_documents, DocumentError, UploadField, UploadedFile, METHODOLOGY_FILE,
};
use crate::extract::extract_json;
use crate::llm::GenerationOptions;
use crate::middleware::limit_analyze_requests;
use crate::models::{AnalyzeRequest, AnalyzeResponse, AppState};
use crate::prompt::{
    build_prompt, validate_strategic_text, PromptError, PromptInput, MIN_STRATEGIC_TEXT_CHARS,
};
use crate::types::{AnalysisKind, AppError, AppResult};

pub const ANALYZE_PATH: &str = "/api/analyze";

pub const RAW_TEXT_WARNING: &str = "Could not parse JSON from response, returning raw text.";

pub fn router(state: AppState) -> Router<AppState> {
    Router::new().route(
        ANALYZE_PATH,
        post(analyze).layer(middleware::from_fn_with_state(state, limit_analyze_requests)),
    )
}

/// The `inputData` field as received.
#[derive(Debug, Clone, Default)]
pub enum InputData {
    #[default]
    Missing,
    Json(Value),
    /// A multipart `inputData` string that is not JSON.
    Malformed(String),
}

/// Raw analyze request, from either body encoding.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeSubmission {
    pub analysis_type: Option<String>,
    pub input_data: InputData,
    pub methodology: Option<UploadedFile>,
    pub additional_documents: Vec<UploadedFile>,
}

impl AnalyzeSubmission {
    async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut submission = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| DocumentError::Multipart(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();

            let Some(file_name) = field.file_name().map(str::to_string) else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| DocumentError::Multipart(e.body_text()))?;
                match name.as_str() {
                    "analysisType" => submission.analysis_type = Some(value),
                    "inputData" => {
                        submission.input_data = match serde_json::from_str::<Value>(&value) {
                            Ok(parsed) => InputData::Json(parsed),
                            Err(e) => InputData::Malformed(e.to_string()),
                        }
                    }
                    other => debug!(field = other, "Ignoring unknown form field"),
                }
                continue;
            };

            let upload = UploadField::from_name(&name)?;
            let already = match upload {
                UploadField::Methodology => usize::from(submission.methodology.is_some()),
                UploadField::AdditionalDocuments => submission.additional_documents.len(),
            };
            if already >= upload.max_files() {
                return Err(DocumentError::TooManyFiles {
                    field: upload.name(),
                    max: upload.max_files(),
                }
                .into());
            }

            let content_type = field.content_type().map(str::to_string);
            check_upload(content_type.as_deref(), 0)?;
            let data = field
                .bytes()
                .await
                .map_err(|e| DocumentError::Multipart(e.body_text()))?;
            check_upload(content_type.as_deref(), data.len())?;

            debug!(field = upload.name(), file_name = %file_name, bytes = data.len(), "Received upload");
            let file = UploadedFile { file_name, data };
            match upload {
                UploadField::Methodology => submission.methodology = Some(file),
                UploadField::AdditionalDocuments => submission.additional_documents.push(file),
            }
        }

        Ok(submission)
    }
}

impl<S> FromRequest<S> for AnalyzeSubmission
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with(mime::MULTIPART_FORM_DATA.essence_str()));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::from(DocumentError::Multipart(e.body_text())))?;
            return Self::from_multipart(multipart).await;
        }

        let Json(body) = Json::<AnalyzeRequest>::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;

        Ok(Self {
            analysis_type: body.analysis_type,
            input_data: body.input_data.map(InputData::Json).unwrap_or_default(),
            ..Self::default()
        })
    }
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAnalysis {
    pub kind: AnalysisKind,
    pub strategic_text: String,
    pub mission_statement: Option<String>,
}

/// Checks the request fields in the order callers see errors reported.
pub fn validate_submission(
    analysis_type: Option<&str>,
    input_data: &InputData,
) -> AppResult<ValidatedAnalysis> {
    let analysis_type = analysis_type
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("Analysis type is required".to_string()))?;

    let input = match input_data {
        InputData::Json(Value::Object(map)) => map,
        InputData::Malformed(reason) => {
            return Err(DocumentError::InvalidInputData(reason.clone()).into());
        }
        InputData::Missing | InputData::Json(_) => {
            return Err(AppError::Validation(
                "Input data is required and must be an object".to_string(),
            ));
        }
    };

    let strategic_text = input
        .get("strategicText")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty());

    if let Some(text) = strategic_text {
        let actual = text.chars().count();
        if actual < MIN_STRATEGIC_TEXT_CHARS {
            return Err(PromptError::StrategicTextTooShort {
                min: MIN_STRATEGIC_TEXT_CHARS,
                actual,
            }
            .into());
        }
    }

    let kind: AnalysisKind = analysis_type.parse()?;
    validate_strategic_text(kind, strategic_text)?;

    Ok(ValidatedAnalysis {
        kind,
        strategic_text: strategic_text.unwrap_or_default().to_string(),
        mission_statement: input
            .get("missionStatement")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

async fn analyze(
    State(state): State<AppState>,
    submission: Result<AnalyzeSubmission, AppError>,
) -> Response {
    let outcome = match submission {
        Ok(submission) => run_analysis(&state, submission).await,
        Err(err) => Err(err),
    };

    match outcome {
        Ok(response) => Json(response).into_response(),
        Err(err) => {
            warn!(kind = err.kind(), error = %err, "Analysis request failed");
            super::error_response(&state, err)
        }
    }
}

/// Validates, builds the prompt, runs it through the queue and parses the answer.
pub async fn run_analysis(
    state: &AppState,
    submission: AnalyzeSubmission,
) -> AppResult<AnalyzeResponse> {
    let request = validate_submission(submission.analysis_type.as_deref(), &submission.input_data)?;
    info!(
        kind = %request.kind,
        text_chars = request.strategic_text.chars().count(),
        additional_documents = submission.additional_documents.len(),
        "Analysis request validated"
    );

    let methodology = methodology_text(state, submission.methodology.as_ref()).await?;
    let additional = additional_documents_text(state, &submission.additional_documents).await?;

    let prompt = build_prompt(&PromptInput {
        kind: request.kind,
        strategic_text: Some(&request.strategic_text),
        mission_statement: request.mission_statement.as_deref(),
        methodology: methodology.as_deref(),
        additional_documents: additional.as_deref(),
    })?;

    let job_id = format!("{}-{}", request.kind, chrono::Utc::now().timestamp_millis());
    let raw = submit_prompt(state, &job_id, prompt).await?;

    match extract_json(&raw) {
        Some(content) => Ok(AnalyzeResponse {
            content,
            analysis_id: job_id,
            warning: None,
        }),
        None => {
            warn!(job_id = %job_id, "Model response contained no parseable JSON");
            Ok(AnalyzeResponse {
                content: Value::String(raw),
                analysis_id: job_id,
                warning: Some(RAW_TEXT_WARNING.to_string()),
            })
        }
    }
}

async fn submit_prompt(state: &AppState, job_id: &str, prompt: String) -> AppResult<String> {
    let generator = Arc::clone(&state.generator);
    let prompt: Arc<str> = Arc::from(prompt);
    let options = GenerationOptions {
        temperature: state.config.llm.temperature,
        ..GenerationOptions::default()
    };

    let raw = state
        .queue
        .submit(job_id, move || {
            let generator = Arc::clone(&generator);
            let prompt = Arc::clone(&prompt);
            let options = options.clone();
            async move { generator.generate(&prompt, &options).await }.boxed()
        })
        .await?;
    Ok(raw)
}

/// Uploaded methodology text. A new upload is stored only once its text has
/// been extracted; without one, the stored copy is used if it still reads.
async fn methodology_text(
    state: &AppState,
    upload: Option<&UploadedFile>,
) -> AppResult<Option<String>> {
    let text = match upload {
        Some(file) => {
            let text = state.extractor.extract_text(file).await?;
            state.methodology.save(&file.data).await?;
            text
        }
        None => {
            let Some(data) = state.methodology.load().await? else {
                return Ok(None);
            };
            let stored = UploadedFile {
                file_name: METHODOLOGY_FILE.to_string(),
                data: data.into(),
            };
            match state.extractor.extract_text(&stored).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Stored methodology is unreadable, continuing without it");
                    return Ok(None);
                }
            }
        }
    };

    Ok(Some(text).filter(|t| !t.trim().is_empty()))
}

async fn additional_documents_text(
    state: &AppState,
    uploads: &[UploadedFile],
) -> AppResult<Option<String>> {
    if uploads.is_empty() {
        return Ok(None);
    }

    let mut extracted = Vec::with_capacity(uploads.len());
    for file in uploads {
        let text = state.extractor.extract_text(file).await?;
        extracted.push((file.file_name.as_str(), text));
    }

    Ok(Some(combine_documents(
        extracted.iter().map(|(name, text)| (*name, text.as_str())),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn long_text() -> String {
        "We grow by serving mid-market manufacturers with predictive maintenance. ".repeat(3)
    }

    fn message(err: AppError) -> String {
        err.to_string()
    }

    #[test]
    fn test_missing_type_reported_first() {
        let err = validate_submission(None, &InputData::Missing).unwrap_err();
        assert_eq!(message(err), "Analysis type is required");
    }

    #[test]
    fn test_input_data_must_be_an_object() {
        let err = validate_submission(Some("fundamentals"), &InputData::Missing).unwrap_err();
        assert_eq!(message(err), "Input data is required and must be an object");

        let err = validate_submission(Some("fundamentals"), &InputData::Json(json!("text")))
            .unwrap_err();
        assert_eq!(message(err), "Input data is required and must be an object");

        let err = validate_submission(
            Some("fundamentals"),
            &InputData::Malformed("expected value".into()),
        )
        .unwrap_err();
        assert_eq!(message(err), "Invalid JSON format in inputData field");
    }

    #[test]
    fn test_short_text_checked_before_kind() {
        let input = InputData::Json(json!({ "strategicText": "too short" }));
        let err = validate_submission(Some("swot"), &input).unwrap_err();
        assert_eq!(
            message(err),
            "Strategic text must be at least 150 characters if provided"
        );
    }

    #[test]
    fn test_unknown_kind_and_missing_text() {
        let input = InputData::Json(json!({ "strategicText": long_text() }));
        let err = validate_submission(Some("swot"), &input).unwrap_err();
        assert_eq!(message(err), "Invalid analysis type provided");

        let err = validate_submission(Some("insights"), &InputData::Json(json!({}))).unwrap_err();
        assert_eq!(message(err), "Strategic text is required for insights");
    }

    #[test]
    fn test_valid_submission() {
        let input = InputData::Json(json!({
            "strategicText": format!("  {}  ", long_text()),
            "missionStatement": "Keep every line running"
        }));
        let validated = validate_submission(Some("strategic-calibration"), &input).unwrap();
        assert_eq!(validated.kind, AnalysisKind::StrategicCalibration);
        assert_eq!(validated.strategic_text, long_text().trim());
        assert_eq!(
            validated.mission_statement.as_deref(),
            Some("Keep every line running")
        );
    }
}
