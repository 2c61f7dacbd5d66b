//! AI validation records.
//!
//! A `ValidationRecord` is the AI stage's only output. `ai_provider: none` with
//! `is_valid: false` marks the degraded terminal state where every provider
//! failed; it is a normal value, not an error.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Which completion provider produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiProvider {
    Primary,
    Secondary,
    None,
}

impl AiProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::None => "none",
        }
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Regulatory fields extracted from a label.
///
/// Every field is optional; an empty list means "not detected".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StructuredLabel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_weight: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,

    #[serde(deserialize_with = "lenient_string_list")]
    pub ingredients: Vec<String>,

    #[serde(deserialize_with = "lenient_string_list")]
    pub allergens: Vec<String>,

    #[serde(deserialize_with = "lenient_string_map")]
    pub nutritional_info: BTreeMap<String, String>,

    #[serde(deserialize_with = "lenient_string_list")]
    pub warnings: Vec<String>,

    #[serde(deserialize_with = "lenient_string_list")]
    pub claims: Vec<String>,
}

impl StructuredLabel {
    /// Number of populated fields out of the nine tracked
    pub fn populated_fields(&self) -> usize {
        [
            self.product_name.is_some(),
            self.brand_name.is_some(),
            self.net_weight.is_some(),
            self.manufacturer.is_some(),
            !self.ingredients.is_empty(),
            !self.allergens.is_empty(),
            !self.nutritional_info.is_empty(),
            !self.warnings.is_empty(),
            !self.claims.is_empty(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    /// Local 0-10 completeness estimate
    pub fn completeness_score(&self) -> u8 {
        ((self.populated_fields() * 10) as f64 / 9.0).round() as u8
    }
}

/// Accepts a list of strings, a single string, or null. Non-string items are stringified.
pub(crate) fn lenient_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Vec::new(),
        Some(serde_json::Value::String(s)) => vec![s.trim().to_string()],
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s.trim().to_string()),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(other) => vec![other.to_string()],
    })
}

/// Accepts an object whose values may be strings, numbers or null.
fn lenient_string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let mut map = BTreeMap::new();
    if let Some(serde_json::Value::Object(entries)) = value {
        for (key, value) in entries {
            let rendered = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            map.insert(key, rendered);
        }
    }
    Ok(map)
}

/// Output of the AI correction and extraction stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRecord {
    /// True only when a provider answered with a well-formed payload
    pub success: bool,

    pub is_valid: bool,

    /// 0..1
    pub confidence: f64,

    /// OCR text the record was computed from
    pub source_text: String,

    /// Line-preserving corrected transcription
    pub corrected_text: String,

    pub extracted: StructuredLabel,

    pub ocr_issues_found: Vec<String>,

    /// 0..10
    pub completeness_score: u8,

    pub compliance_issues: Vec<String>,

    pub recommendations: Vec<String>,

    pub ai_provider: AiProvider,

    /// Provider role -> failure message, for diagnostics
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,

    pub processing_time_ms: u64,
}

impl ValidationRecord {
    /// True for the terminal state where no provider could be reached
    pub fn is_degraded(&self) -> bool {
        self.ai_provider == AiProvider::None
    }
}
