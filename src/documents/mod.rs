// Uploaded supporting documents: validation, text extraction, prompt assembly

pub mod methodology;

pub use methodology::{MethodologyInfo, MethodologyStore, METHODOLOGY_FILE};

use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use docx_rust::document::BodyContent;
use docx_rust::DocxFile;
use tracing::debug;

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
pub const MAX_ADDITIONAL_DOCUMENTS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Invalid file type. Only .docx files are allowed.")]
    InvalidType { content_type: String },

    #[error("File size exceeds the 20MB limit.")]
    TooLarge { size: usize },

    #[error("Unexpected file field received.")]
    UnexpectedField(String),

    #[error("Too many files uploaded for {field} (max {max}).")]
    TooManyFiles { field: &'static str, max: usize },

    #[error("Failed to read multipart request: {0}")]
    Multipart(String),

    #[error("Invalid JSON format in inputData field")]
    InvalidInputData(String),

    #[error("Failed to read uploaded document: {file_name}: {message}")]
    Extraction { file_name: String, message: String },

    #[error("Upload storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Multipart file fields the analyze endpoint accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadField {
    Methodology,
    AdditionalDocuments,
}

impl UploadField {
    pub fn from_name(name: &str) -> Result<Self, DocumentError> {
        match name {
            "methodology" => Ok(UploadField::Methodology),
            "additionalDocuments" => Ok(UploadField::AdditionalDocuments),
            other => Err(DocumentError::UnexpectedField(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            UploadField::Methodology => "methodology",
            UploadField::AdditionalDocuments => "additionalDocuments",
        }
    }

    pub fn max_files(&self) -> usize {
        match self {
            UploadField::Methodology => 1,
            UploadField::AdditionalDocuments => MAX_ADDITIONAL_DOCUMENTS,
        }
    }
}

/// A file part accepted from a multipart request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Bytes,
}

/// Rejects anything that is not a docx of acceptable size.
pub fn check_upload(content_type: Option<&str>, size: usize) -> Result<(), DocumentError> {
    let content_type = content_type.unwrap_or_default();
    if content_type != DOCX_MIME {
        return Err(DocumentError::InvalidType {
            content_type: content_type.to_string(),
        });
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(DocumentError::TooLarge { size });
    }
    Ok(())
}

/// Pulls plain text out of an uploaded document.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, file: &UploadedFile) -> Result<String, DocumentError>;
}

/// Paragraph text of a .docx, one paragraph per line.
pub struct DocxTextExtractor;

#[async_trait]
impl TextExtractor for DocxTextExtractor {
    async fn extract_text(&self, file: &UploadedFile) -> Result<String, DocumentError> {
        let data = file.data.clone();
        let file_name = file.file_name.clone();

        let text = tokio::task::spawn_blocking(move || docx_paragraph_text(&data))
            .await
            .map_err(|e| DocumentError::Extraction {
                file_name: file_name.clone(),
                message: e.to_string(),
            })?
            .map_err(|message| DocumentError::Extraction {
                file_name: file_name.clone(),
                message,
            })?;

        debug!(file_name = %file_name, chars = text.len(), "Extracted document text");
        Ok(text)
    }
}

pub(crate) fn docx_paragraph_text(data: &[u8]) -> Result<String, String> {
    let file = DocxFile::from_reader(Cursor::new(data)).map_err(|e| format!("{:?}", e))?;
    let docx = file.parse().map_err(|e| format!("{:?}", e))?;

    let paragraphs: Vec<String> = docx
        .document
        .body
        .content
        .iter()
        .filter_map(|content| match content {
            BodyContent::Paragraph(paragraph) => Some(paragraph.iter_text().fold(
                String::new(),
                |mut line, text| {
                    line.push_str(text);
                    line
                },
            )),
            _ => None,
        })
        .collect();

    Ok(paragraphs.join("\n"))
}

/// Concatenates extracted documents under a labelled separator each.
pub fn combine_documents<'a, I>(documents: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    documents
        .into_iter()
        .map(|(name, text)| format!("\n\n--- Document: {} ---\n{}", name, text))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rust::document::Paragraph;
    use docx_rust::Docx;

    fn docx_bytes(paragraphs: &[&str]) -> Bytes {
        let mut docx = Docx::default();
        for text in paragraphs {
            docx.document.push(Paragraph::default().push_text(*text));
        }
        let cursor = docx.write(Cursor::new(Vec::new())).unwrap();
        Bytes::from(cursor.into_inner())
    }

    #[test]
    fn test_upload_field_names() {
        assert_eq!(UploadField::from_name("methodology").unwrap(), UploadField::Methodology);
        assert_eq!(UploadField::AdditionalDocuments.max_files(), 10);
        let err = UploadField::from_name("avatar").unwrap_err();
        assert_eq!(err.to_string(), "Unexpected file field received.");
    }

    #[test]
    fn test_check_upload() {
        assert!(check_upload(Some(DOCX_MIME), 1024).is_ok());
        assert!(matches!(
            check_upload(Some("application/pdf"), 1024),
            Err(DocumentError::InvalidType { .. })
        ));
        assert!(matches!(check_upload(None, 1024), Err(DocumentError::InvalidType { .. })));
        assert!(matches!(
            check_upload(Some(DOCX_MIME), MAX_UPLOAD_BYTES + 1),
            Err(DocumentError::TooLarge { .. })
        ));
        assert!(check_upload(Some(DOCX_MIME), MAX_UPLOAD_BYTES).is_ok());
    }

    #[test]
    fn test_combine_documents() {
        let combined = combine_documents([("a.docx", "alpha"), ("b.docx", "beta")]);
        assert_eq!(
            combined,
            "\n\n--- Document: a.docx ---\nalpha\n\n--- Document: b.docx ---\nbeta"
        );
        assert_eq!(combine_documents(std::iter::empty::<(&str, &str)>()), "");
    }

    #[tokio::test]
    async fn test_docx_extraction_joins_paragraphs() {
        let file = UploadedFile {
            file_name: "plan.docx".to_string(),
            data: docx_bytes(&["Market entry", "Pricing review"]),
        };
        let text = DocxTextExtractor.extract_text(&file).await.unwrap();
        assert_eq!(text, "Market entry\nPricing review");
    }

    #[tokio::test]
    async fn test_garbage_upload_is_an_extraction_error() {
        let file = UploadedFile {
            file_name: "broken.docx".to_string(),
            data: Bytes::from_static(b"not a zip archive"),
        };
        let err = DocxTextExtractor.extract_text(&file).await.unwrap_err();
        assert!(matches!(err, DocumentError::Extraction { .. }));
        assert!(err.to_string().starts_with("Failed to read uploaded document: broken.docx"));
    }
}
