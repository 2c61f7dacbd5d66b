//! Decoding of completion text into a typed validation payload.
//!
//! Candidates are tried in order: fenced ```json block, first balanced
//! `{...}` span, whole body. A JSON object missing any mandatory key counts as
//! a parse failure, not as a sparse result.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::StructuredLabel;

pub const REQUIRED_KEYS: [&str; 4] = ["isValid", "confidence", "correctedText", "extractedInformation"];

static FENCED_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n?(.*?)```").expect("static regex"));

/// Why a completion could not be used
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseFailure {
    #[error("no JSON object found in response")]
    NoJson,

    #[error("response JSON is missing required keys: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error("response JSON has the wrong shape: {0}")]
    Shape(String),
}

/// Typed model response
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationPayload {
    pub is_valid: bool,

    pub confidence: f64,

    pub corrected_text: String,

    pub extracted_information: StructuredLabel,

    #[serde(default, deserialize_with = "crate::domain::validation::lenient_string_list")]
    pub ocr_issues_found: Vec<String>,

    #[serde(default)]
    pub completeness_score: Option<f64>,

    #[serde(default, deserialize_with = "crate::domain::validation::lenient_string_list")]
    pub compliance_issues: Vec<String>,

    #[serde(default, deserialize_with = "crate::domain::validation::lenient_string_list")]
    pub recommendations: Vec<String>,
}

impl ValidationPayload {
    /// Confidence in 0..1; percentages are rescaled
    pub fn normalized_confidence(&self) -> f64 {
        let c = if self.confidence > 1.0 && self.confidence <= 100.0 {
            self.confidence / 100.0
        } else {
            self.confidence
        };
        if c.is_finite() {
            c.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Completeness in 0..10, falling back to the local estimate
    pub fn normalized_completeness(&self) -> u8 {
        match self.completeness_score {
            Some(score) if score.is_finite() => score.round().clamp(0.0, 10.0) as u8,
            _ => self.extracted_information.completeness_score(),
        }
    }
}

/// First balanced `{...}` span, ignoring braces inside strings
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Candidate JSON spans, most specific first
fn candidates(text: &str) -> Vec<&str> {
    let mut spans = Vec::with_capacity(3);
    if let Some(block) = FENCED_BLOCK_RE.captures(text).and_then(|c| c.get(1)) {
        spans.push(block.as_str().trim());
    }
    if let Some(object) = balanced_object(text) {
        spans.push(object);
    }
    spans.push(text.trim());
    spans
}

/// Decode a completion into a payload
pub fn parse_completion(text: &str) -> Result<ValidationPayload, ParseFailure> {
    let object = candidates(text)
        .into_iter()
        .find_map(|span| match serde_json::from_str::<serde_json::Value>(span) {
            Ok(value @ serde_json::Value::Object(_)) => Some(value),
            _ => None,
        })
        .ok_or(ParseFailure::NoJson)?;

    let missing: Vec<String> = REQUIRED_KEYS
        .iter()
        .filter(|key| object.get(**key).map_or(true, |v| v.is_null()))
        .map(|key| key.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ParseFailure::MissingKeys(missing));
    }

    serde_json::from_value(object).map_err(|e| ParseFailure::Shape(e.to_string()))
}
