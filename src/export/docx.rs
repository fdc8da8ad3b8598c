// Word document writer for rendered analysis blocks

use std::io::Cursor;

use docx_rust::document::Paragraph;
use docx_rust::formatting::{CharacterProperty, ParagraphProperty};
use docx_rust::styles::{Style, StyleType};
use docx_rust::Docx;
use serde_json::Value;
use tracing::info;

use super::{render_blocks, title_case, Block, BlockStyle, ExportError};

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const BULLET: &str = "\u{2022} ";

/// A rendered document ready to be sent as an attachment.
#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl BlockStyle {
    fn style_id(&self) -> &'static str {
        match self {
            BlockStyle::Title => "Title",
            BlockStyle::Heading1 => "Heading1",
            BlockStyle::Heading2 => "Heading2",
            BlockStyle::SubHeading => "SubHeading",
            BlockStyle::Lead => "Lead",
            BlockStyle::Body | BlockStyle::Bullet => "BodyText",
            BlockStyle::Placeholder => "Placeholder",
        }
    }
}

// (style id, display name, bold, half-point size)
const STYLES: [(&str, &str, bool, isize); 7] = [
    ("Title", "Title", true, 48),
    ("Heading1", "Heading 1", true, 36),
    ("Heading2", "Heading 2", true, 28),
    ("SubHeading", "Subheading", true, 24),
    ("Lead", "Lead", true, 22),
    ("BodyText", "Body Text", false, 22),
    ("Placeholder", "Placeholder", false, 20),
];

fn register_styles(docx: &mut Docx) {
    for (id, name, bold, size) in STYLES {
        docx.styles.push(
            Style::new(StyleType::Paragraph, id)
                .name(name)
                .character(CharacterProperty::default().bold(bold).size(size)),
        );
    }
}

fn paragraph(block: &Block) -> Paragraph<'_> {
    let para =
        Paragraph::default().property(ParagraphProperty::default().style_id(block.style.style_id()));
    match block.style {
        BlockStyle::Bullet => para.push_text(BULLET).push_text(block.text.as_str()),
        _ => para.push_text(block.text.as_str()),
    }
}

/// `challenge-analysis` stays as is; anything unsafe in a header falls back to `export`.
fn file_label(analysis_type: Option<&str>) -> &str {
    match analysis_type.map(str::trim) {
        Some(label)
            if !label.is_empty()
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') =>
        {
            label
        }
        _ => "export",
    }
}

/// Writes blocks to an in-memory .docx, preceded by a title line.
pub fn write_docx(title: &str, blocks: &[Block]) -> Result<Vec<u8>, ExportError> {
    let title_block = Block {
        style: BlockStyle::Title,
        text: title.to_string(),
    };

    let mut docx = Docx::default();
    register_styles(&mut docx);
    docx.document.push(paragraph(&title_block));
    for block in blocks {
        docx.document.push(paragraph(block));
    }

    let cursor = docx
        .write(Cursor::new(Vec::new()))
        .map_err(|e| ExportError::Render(format!("{:?}", e)))?;
    Ok(cursor.into_inner())
}

/// Renders `results` into a downloadable document.
pub fn export_document(
    results: &Value,
    analysis_type: Option<&str>,
    timestamp_ms: i64,
) -> Result<ExportedDocument, ExportError> {
    let title = match analysis_type.map(str::trim).filter(|t| !t.is_empty()) {
        Some(kind) => format!("Strategic Analysis: {}", title_case(&kind.replace('-', " "))),
        None => "Strategic Analysis".to_string(),
    };

    let blocks = render_blocks(results);
    let bytes = write_docx(&title, &blocks)?;
    let file_name = format!(
        "strategic-analysis-{}-{}.docx",
        file_label(analysis_type),
        timestamp_ms
    );

    info!(file_name = %file_name, blocks = blocks.len(), bytes = bytes.len(), "Rendered export document");

    Ok(ExportedDocument { file_name, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::docx_paragraph_text;
    use serde_json::json;

    #[test]
    fn test_file_label() {
        assert_eq!(file_label(Some("challenge-analysis")), "challenge-analysis");
        assert_eq!(file_label(None), "export");
        assert_eq!(file_label(Some("  ")), "export");
        assert_eq!(file_label(Some("a\"; b")), "export");
    }

    #[test]
    fn test_exported_document_reads_back() {
        let results = json!({
            "Opportunities": [
                { "headline": "Expand to EU", "explanation": "Demand is growing" }
            ],
            "Success_Metrics": ["NPS above 50"],
            "Immediate_Actions": ["do not render me"]
        });

        let doc = export_document(&results, Some("challenge-analysis"), 1_700_000_000_000).unwrap();
        assert_eq!(doc.file_name, "strategic-analysis-challenge-analysis-1700000000000.docx");

        let text = docx_paragraph_text(&doc.bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Strategic Analysis: Challenge Analysis",
                "Opportunities",
                "Expand to EU",
                "Demand is growing",
                "Success Metrics",
                "\u{2022} NPS above 50",
            ]
        );
    }

    #[test]
    fn test_untyped_export_uses_generic_name() {
        let doc = export_document(&json!({ "Analysis Results": "raw" }), None, 5).unwrap();
        assert_eq!(doc.file_name, "strategic-analysis-export-5.docx");
        let text = docx_paragraph_text(&doc.bytes).unwrap();
        assert_eq!(text, "Strategic Analysis\nraw");
    }
}
