//! Prompt Builder
//!
//! Turns an analysis kind, the caller's strategic text and any extracted
//! supporting documents into the single prompt sent to the generation API.
//! User-supplied text is stripped of conversational role markers first.

mod templates;

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::types::AnalysisKind;

/// Minimum strategic text length, in characters, after trimming.
pub const MIN_STRATEGIC_TEXT_CHARS: usize = 150;

const NONE_PROVIDED: &str = "None provided.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    #[error("Strategic text is required for {0}")]
    MissingStrategicText(AnalysisKind),

    #[error("Strategic text must be at least {min} characters if provided")]
    StrategicTextTooShort { min: usize, actual: usize },
}

/// Everything the builder needs for one request.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub kind: AnalysisKind,
    pub strategic_text: Option<&'a str>,
    pub mission_statement: Option<&'a str>,
    pub methodology: Option<&'a str>,
    pub additional_documents: Option<&'a str>,
}

impl<'a> PromptInput<'a> {
    pub fn new(kind: AnalysisKind, strategic_text: &'a str) -> Self {
        Self {
            kind,
            strategic_text: Some(strategic_text),
            mission_statement: None,
            methodology: None,
            additional_documents: None,
        }
    }
}

fn role_delimiters() -> &'static Regex {
    static ROLES: OnceLock<Regex> = OnceLock::new();
    ROLES.get_or_init(|| Regex::new(r"(?i)human:|assistant:").expect("role pattern is valid"))
}

fn line_footnotes() -> &'static Regex {
    static FOOTNOTES: OnceLock<Regex> = OnceLock::new();
    FOOTNOTES.get_or_init(|| Regex::new(r"\bLine\s*\d+\b").expect("footnote pattern is valid"))
}

/// Removes role markers until none remain, so split markers like
/// `HumHuman:an:` cannot reassemble after a single pass.
pub fn strip_role_delimiters(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = role_delimiters().replace_all(&current, "").into_owned();
        if next == current {
            return next.trim().to_string();
        }
        current = next;
    }
}

/// Checks the strategic text against the rules for `kind`.
pub fn validate_strategic_text(kind: AnalysisKind, text: Option<&str>) -> Result<(), PromptError> {
    let trimmed = text.map(str::trim).unwrap_or_default();

    if trimmed.is_empty() {
        if kind.requires_strategic_text() {
            return Err(PromptError::MissingStrategicText(kind));
        }
        return Ok(());
    }

    let actual = trimmed.chars().count();
    if actual < MIN_STRATEGIC_TEXT_CHARS {
        return Err(PromptError::StrategicTextTooShort {
            min: MIN_STRATEGIC_TEXT_CHARS,
            actual,
        });
    }
    Ok(())
}

/// Builds the prompt for one analysis request.
pub fn build_prompt(input: &PromptInput<'_>) -> Result<String, PromptError> {
    validate_strategic_text(input.kind, input.strategic_text)?;

    let raw_text = input.strategic_text.unwrap_or_default();
    let strategic_text = match input.kind {
        AnalysisKind::StrategicCalibration => {
            strip_role_delimiters(&line_footnotes().replace_all(raw_text, ""))
        }
        _ => strip_role_delimiters(raw_text),
    };

    let methodology = sanitized_or_placeholder(input.methodology);
    let additional = sanitized_or_placeholder(input.additional_documents);
    let mission = input
        .mission_statement
        .map(strip_role_delimiters)
        .filter(|m| !m.is_empty());

    let mut prompt = String::new();
    prompt.push_str(templates::system_header(input.kind));
    prompt.push_str("\n\n");

    match input.kind {
        AnalysisKind::ChallengeAnalysis => {
            prompt.push_str(templates::CHALLENGE_BRIEF);
            prompt.push_str("\n\n");
        }
        AnalysisKind::StrategicCalibration => {
            prompt.push_str(templates::CALIBRATION_BRIEF);
            prompt.push_str("\n\n");
        }
        _ => {}
    }

    prompt.push_str("Methodology Document Content:\n");
    prompt.push_str(&methodology);
    prompt.push_str("\n\nAdditional Documents Content:\n");
    prompt.push_str(&additional);
    prompt.push_str("\n\n");

    if let Some(mission) = mission {
        prompt.push_str("Mission Statement:\n");
        prompt.push_str(&mission);
        prompt.push_str("\n\n");
    }

    prompt.push_str("Strategic Text:\n");
    prompt.push_str(&strategic_text);
    prompt.push_str("\n\n");

    match input.kind {
        AnalysisKind::ChallengeAnalysis => prompt.push_str(templates::CHALLENGE_INSTRUCTIONS),
        AnalysisKind::StrategicCalibration => {
            prompt.push_str(templates::CALIBRATION_INSTRUCTIONS)
        }
        kind => prompt.push_str(&generic_instructions(kind)),
    }
    prompt.push('\n');

    debug!(
        analysis_type = %input.kind,
        prompt_len = prompt.len(),
        "Constructed analysis prompt"
    );
    Ok(prompt)
}

fn sanitized_or_placeholder(text: Option<&str>) -> String {
    text.map(strip_role_delimiters)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NONE_PROVIDED.to_string())
}

fn generic_instructions(kind: AnalysisKind) -> String {
    format!(
        "Instructions: Generate the {kind} analysis based on the text provided. \
         Respond with valid JSON only, following this structure:\n{{\n  \"{kind}\": \"Your {kind}...\"\n}}"
    )
}
