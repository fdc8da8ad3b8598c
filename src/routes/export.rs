use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use tracing::info;

use crate::export::{self, docx::DOCX_CONTENT_TYPE, ExportedDocument};
use crate::models::{AppState, ExportRequest};
use crate::types::{AppError, AppResult};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/export", post(export_analysis))
}

async fn export_analysis(
    State(state): State<AppState>,
    payload: Result<Json<ExportRequest>, JsonRejection>,
) -> Response {
    let rendered = payload
        .map_err(|e| AppError::Validation(e.body_text()))
        .and_then(|Json(request)| render(&request));

    match rendered {
        Ok(document) => attachment(document),
        Err(err) => super::error_response(&state, err),
    }
}

fn render(request: &ExportRequest) -> AppResult<ExportedDocument> {
    let results = export::normalize_results(request.analysis_results.as_ref())?;
    let document = export::export_document(
        &results,
        request.analysis_type.as_deref(),
        chrono::Utc::now().timestamp_millis(),
    )?;
    info!(file_name = %document.file_name, "Export generated");
    Ok(document)
}

fn attachment(document: ExportedDocument) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", document.file_name);
    let disposition = match HeaderValue::from_str(&disposition) {
        Ok(value) => value,
        Err(e) => return AppError::Internal(e.to_string()).into_response(),
    };

    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(DOCX_CONTENT_TYPE)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.bytes,
    )
        .into_response()
}
