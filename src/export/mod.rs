//! Analysis Export
//!
//! Turns an analysis result of arbitrary shape into an ordered list of styled
//! [`Block`]s, which [`docx`] then writes out as a Word document.
//!
//! Values are classified structurally before rendering. Array items that
//! carry one of the known lead/body field pairs (see [`PAIR_SHAPES`]) render
//! as a bold lead line followed by a body line; other objects recurse with
//! their keys as headings.

pub mod docx;

use serde_json::{Map, Value};

use crate::extract::{extract_or_wrap, PLAIN_TEXT_KEY};

pub use self::docx::{export_document, ExportedDocument};

/// Key never rendered; its content is action items the document leaves out.
pub const SKIPPED_KEY: &str = "Immediate_Actions";

pub const EMPTY_PLACEHOLDER: &str = "(empty)";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Analysis results are required for export")]
    MissingResults,

    #[error("Analysis results must be an object, an array or a string")]
    InvalidResults,

    #[error("Failed to render document: {0}")]
    Render(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairKind {
    Insight,
    Headline,
}

/// Field names of a two-part list item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairShape {
    pub kind: PairKind,
    pub lead: &'static str,
    pub body: &'static str,
}

/// Field pairs the prompt templates ask the model to produce in lists.
pub const PAIR_SHAPES: [PairShape; 2] = [
    PairShape {
        kind: PairKind::Insight,
        lead: "insight",
        body: "implication",
    },
    PairShape {
        kind: PairKind::Headline,
        lead: "headline",
        body: "explanation",
    },
];

#[derive(Debug, Clone, PartialEq)]
pub enum ValueShape<'a> {
    Scalar(&'a Value),
    List(&'a [Value]),
    InsightPair { insight: &'a str, implication: &'a str },
    HeadlinePair { headline: &'a str, explanation: &'a str },
    GenericObject(&'a Map<String, Value>),
}

/// Classifies `value`. Pair shapes are only recognised for list items.
pub fn classify(value: &Value, in_list: bool) -> ValueShape<'_> {
    match value {
        Value::Array(items) => ValueShape::List(items),
        Value::Object(map) => {
            if in_list {
                if let Some(shape) = match_pair(map) {
                    return shape;
                }
            }
            ValueShape::GenericObject(map)
        }
        scalar => ValueShape::Scalar(scalar),
    }
}

fn match_pair(map: &Map<String, Value>) -> Option<ValueShape<'_>> {
    PAIR_SHAPES.iter().find_map(|shape| {
        let lead = non_empty_str(map.get(shape.lead))?;
        let body = non_empty_str(map.get(shape.body))?;
        Some(match shape.kind {
            PairKind::Insight => ValueShape::InsightPair {
                insight: lead,
                implication: body,
            },
            PairKind::Headline => ValueShape::HeadlinePair {
                headline: lead,
                explanation: body,
            },
        })
    })
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStyle {
    Title,
    Heading1,
    Heading2,
    SubHeading,
    Lead,
    Body,
    Bullet,
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub style: BlockStyle,
    pub text: String,
}

impl Block {
    fn new(style: BlockStyle, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }
}

/// Accepts what the export endpoint receives as `analysisResults`.
///
/// Strings go through the response extractor; objects and arrays pass as is.
pub fn normalize_results(results: Option<&Value>) -> Result<Value, ExportError> {
    match results {
        None | Some(Value::Null) => Err(ExportError::MissingResults),
        Some(Value::String(text)) => Ok(extract_or_wrap(text).into_value()),
        Some(value @ (Value::Object(_) | Value::Array(_))) => Ok(value.clone()),
        Some(_) => Err(ExportError::InvalidResults),
    }
}

/// `Core_Strategic_Insights` -> `Core Strategic Insights`
pub fn title_case(key: &str) -> String {
    key.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn heading_style(depth: usize) -> BlockStyle {
    match depth {
        0 => BlockStyle::Heading1,
        1 => BlockStyle::Heading2,
        _ => BlockStyle::SubHeading,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Flattens `results` into document blocks, in key order.
pub fn render_blocks(results: &Value) -> Vec<Block> {
    let mut blocks = Vec::new();
    walk_value(results, 0, &mut blocks);
    blocks
}

fn walk_value(value: &Value, depth: usize, blocks: &mut Vec<Block>) {
    match classify(value, false) {
        ValueShape::Scalar(scalar) => match scalar_text(scalar) {
            Some(text) => blocks.push(Block::new(BlockStyle::Body, text)),
            None => blocks.push(Block::new(BlockStyle::Placeholder, EMPTY_PLACEHOLDER)),
        },
        ValueShape::List(items) => walk_list(items, depth, blocks),
        ValueShape::GenericObject(map) => walk_object(map, depth, blocks),
        // pairs are only produced for list items
        ValueShape::InsightPair { .. } | ValueShape::HeadlinePair { .. } => {}
    }
}

fn walk_list(items: &[Value], depth: usize, blocks: &mut Vec<Block>) {
    if items.is_empty() {
        blocks.push(Block::new(BlockStyle::Placeholder, EMPTY_PLACEHOLDER));
        return;
    }

    for item in items {
        match classify(item, true) {
            ValueShape::Scalar(scalar) => match scalar_text(scalar) {
                Some(text) => blocks.push(Block::new(BlockStyle::Bullet, text)),
                None => blocks.push(Block::new(BlockStyle::Placeholder, EMPTY_PLACEHOLDER)),
            },
            ValueShape::InsightPair {
                insight: lead,
                implication: body,
            }
            | ValueShape::HeadlinePair {
                headline: lead,
                explanation: body,
            } => {
                blocks.push(Block::new(BlockStyle::Lead, lead));
                blocks.push(Block::new(BlockStyle::Body, body));
            }
            ValueShape::List(nested) => walk_list(nested, depth, blocks),
            ValueShape::GenericObject(map) => walk_object(map, depth, blocks),
        }
    }
}

fn walk_object(map: &Map<String, Value>, depth: usize, blocks: &mut Vec<Block>) {
    for (key, value) in map {
        if key == SKIPPED_KEY {
            continue;
        }
        if key != PLAIN_TEXT_KEY {
            blocks.push(Block::new(heading_style(depth), title_case(key)));
        }
        walk_value(value, depth + 1, blocks);
    }
}
