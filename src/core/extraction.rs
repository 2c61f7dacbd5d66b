//! Text extraction stage.
//!
//! Runs the OCR engine and normalizes its output into an `ExtractionResult`.
//! The stage never fails: engine errors become a result with `success: false`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::adapters::{OcrEngine, OcrOptions, OcrOutput};
use crate::domain::{ExtractionResult, Finding, FindingSet, ImageSource, OcrWord, Severity};

/// Words below this engine confidence (0-100) count as low-confidence
pub const LOW_CONFIDENCE_WORD_THRESHOLD: f64 = 60.0;

/// Characters printed on typical food and supplement labels
pub const LABEL_CHAR_ALLOWLIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789 .,;:()[]%/-&'\"*+!?#<>=";

pub const SOURCE: &str = "extraction";

/// Section headers recognized on labels.
///
/// Detection is greedy: a section runs from its header to the next recognized
/// header. Headers nested inside another section's body (e.g. "ingredients"
/// inside a warning sentence) split that section; this is not disambiguated.
static SECTION_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(inactive\s+ingredients?|active\s+ingredients?|other\s+ingredients|ingredients?|nutrition\s+facts|supplement\s+facts|directions(?:\s+for\s+use)?|warnings?|caution|allergy\s+information|allergens?|storage(?:\s+instructions)?|distributed\s+by|manufactured\s+(?:by|for))\b\s*:?|\bcontains\s*:",
    )
    .expect("static regex")
});

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Map a matched header to its section name
fn section_name(header: &str) -> &'static str {
    let header = WHITESPACE_RE.replace_all(header.trim_end_matches(':').trim(), " ");
    match header.as_ref() {
        h if h.starts_with("inactive ingredient") => "inactiveIngredients",
        h if h.starts_with("active ingredient") => "activeIngredients",
        h if h.starts_with("other ingredients") || h.starts_with("ingredient") => "ingredients",
        "nutrition facts" => "nutritionFacts",
        "supplement facts" => "supplementFacts",
        h if h.starts_with("directions") => "directions",
        h if h.starts_with("warning") || h == "caution" => "warnings",
        h if h.starts_with("storage") => "storage",
        "distributed by" | "manufactured by" | "manufactured for" => "manufacturer",
        _ => "allergens",
    }
}

/// Greedy section detection over the lower-cased text.
///
/// The first occurrence of each section wins. Bodies are sliced from the
/// original text when lower-casing preserved byte offsets.
pub fn detect_sections(text: &str) -> BTreeMap<String, String> {
    let lower = text.to_lowercase();
    let headers: Vec<(usize, usize, &'static str)> = SECTION_HEADER_RE
        .find_iter(&lower)
        .map(|m| (m.start(), m.end(), section_name(m.as_str())))
        .collect();

    let mut sections = BTreeMap::new();
    for (idx, (_, body_start, name)) in headers.iter().enumerate() {
        if sections.contains_key(*name) {
            continue;
        }
        let body_end = headers
            .get(idx + 1)
            .map(|(start, _, _)| *start)
            .unwrap_or(lower.len());

        let body = if lower.len() == text.len() {
            text.get(*body_start..body_end)
        } else {
            None
        }
        .unwrap_or(&lower[*body_start..body_end]);

        let body = body.trim().trim_start_matches(':').trim();
        if !body.is_empty() {
            sections.insert(name.to_string(), body.to_string());
        }
    }
    sections
}

/// Text extraction stage
pub struct ExtractionStage {
    engine: Arc<dyn OcrEngine>,
    options: OcrOptions,
    low_confidence_threshold: f64,
}

impl ExtractionStage {
    /// Create a stage with label-tuned defaults
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self {
            engine,
            options: OcrOptions {
                char_allowlist: Some(LABEL_CHAR_ALLOWLIST.to_string()),
                ..Default::default()
            },
            low_confidence_threshold: LOW_CONFIDENCE_WORD_THRESHOLD,
        }
    }

    pub fn with_options(mut self, options: OcrOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_low_confidence_threshold(mut self, threshold: f64) -> Self {
        self.low_confidence_threshold = threshold;
        self
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Extract text from an image. Never fails.
    #[instrument(skip(self, image), fields(engine = %self.engine.name()))]
    pub async fn extract(&self, image: &ImageSource) -> ExtractionResult {
        let started = Instant::now();

        match self.engine.recognize(image, &self.options).await {
            Ok(output) => {
                let result = self.normalize(output, started.elapsed().as_millis() as u64);
                info!(
                    confidence = result.confidence,
                    words = result.words.len(),
                    sections = result.detected_sections.len(),
                    "Extraction completed"
                );
                result
            }
            Err(e) => {
                warn!(error = %e, "OCR engine failed");
                ExtractionResult::failed(e.to_string(), started.elapsed().as_millis() as u64)
            }
        }
    }

    /// Turn raw engine output into an `ExtractionResult`
    pub fn normalize(&self, output: OcrOutput, processing_time_ms: u64) -> ExtractionResult {
        let text = output.text.trim().to_string();
        let lines = if output.lines.is_empty() {
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        } else {
            output.lines
        };

        let low_confidence_words = output
            .words
            .iter()
            .filter(|w| w.confidence < self.low_confidence_threshold)
            .count();

        ExtractionResult {
            success: true,
            error: None,
            detected_sections: detect_sections(&text),
            text,
            confidence: (output.confidence / 100.0).clamp(0.0, 1.0),
            words: output.words,
            lines,
            low_confidence_words,
            processing_time_ms,
        }
    }
}

/// Build an extraction result for text supplied directly instead of via OCR
pub fn from_text(text: &str) -> ExtractionResult {
    let text = text.trim().to_string();
    let words: Vec<OcrWord> = text
        .split_whitespace()
        .map(|w| OcrWord {
            text: w.to_string(),
            confidence: 100.0,
            bbox: Default::default(),
        })
        .collect();
    let lines = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    ExtractionResult {
        success: true,
        error: None,
        detected_sections: detect_sections(&text),
        confidence: if words.is_empty() { 0.0 } else { 1.0 },
        text,
        words,
        lines,
        low_confidence_words: 0,
        processing_time_ms: 0,
    }
}

/// Findings for the extraction stage itself
pub fn findings(result: &ExtractionResult, engine: &str) -> FindingSet {
    let mut set = FindingSet::new();
    if !result.success {
        set.push(Finding::new(
            "ocr_failure",
            Severity::Error,
            format!(
                "Text extraction failed: {}",
                result.error.as_deref().unwrap_or("unknown error")
            ),
            SOURCE,
            engine,
        ));
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::OcrError;
    use crate::domain::BoundingBox;
    use async_trait::async_trait;

    struct StaticEngine(Result<OcrOutput, String>);

    #[async_trait]
    impl OcrEngine for StaticEngine {
        fn name(&self) -> &str {
            "static"
        }

        async fn recognize(&self, _: &ImageSource, _: &OcrOptions) -> Result<OcrOutput, OcrError> {
            self.0.clone().map_err(OcrError::Engine)
        }
    }

    fn word(text: &str, confidence: f64) -> OcrWord {
        OcrWord {
            text: text.to_string(),
            confidence,
            bbox: BoundingBox::default(),
        }
    }

    #[test]
    fn test_detect_sections_stops_at_next_header() {
        let text = "ORGANIC TOMATO SOUP\nINGREDIENTS: Water, Tomato Paste, Salt.\nWARNING: Contents hot.\nDirections: Heat and serve.";
        let sections = detect_sections(text);

        assert_eq!(sections.get("ingredients").unwrap(), "Water, Tomato Paste, Salt.");
        assert_eq!(sections.get("warnings").unwrap(), "Contents hot.");
        assert_eq!(sections.get("directions").unwrap(), "Heat and serve.");
    }

    #[test]
    fn test_detect_sections_active_and_inactive() {
        let text = "Active Ingredients: Ibuprofen 200 mg\nInactive Ingredients: starch, stearic acid\nContains: soy";
        let sections = detect_sections(text);

        assert_eq!(sections.get("activeIngredients").unwrap(), "Ibuprofen 200 mg");
        assert_eq!(sections.get("inactiveIngredients").unwrap(), "starch, stearic acid");
        assert_eq!(sections.get("allergens").unwrap(), "soy");
        assert!(!sections.contains_key("ingredients"));
    }

    #[test]
    fn test_detect_sections_first_occurrence_wins() {
        let sections = detect_sections("Ingredients: oats\nIngredients: corn");
        assert_eq!(sections.get("ingredients").unwrap(), "oats");
    }

    #[test]
    fn test_no_sections_in_plain_text() {
        assert!(detect_sections("Best before 2026").is_empty());
    }

    #[tokio::test]
    async fn test_extract_rescales_confidence() {
        let stage = ExtractionStage::new(Arc::new(StaticEngine(Ok(OcrOutput {
            text: "INGREDIENTS: Water, Sugar\n".to_string(),
            confidence: 90.0,
            words: vec![word("INGREDIENTS:", 95.0), word("Water,", 92.0), word("Sugar", 40.0)],
            lines: vec![],
        }))));

        let result = stage.extract(&ImageSource::Bytes(vec![1, 2, 3])).await;

        assert!(result.success);
        assert!((result.confidence - 0.9).abs() < 1e-9);
        assert_eq!(result.low_confidence_words, 1);
        assert_eq!(result.lines, vec!["INGREDIENTS: Water, Sugar"]);
        assert_eq!(result.section("ingredients"), Some("Water, Sugar"));
    }

    #[tokio::test]
    async fn test_extract_never_fails() {
        let stage = ExtractionStage::new(Arc::new(StaticEngine(Err("engine crashed".into()))));
        let result = stage.extract(&ImageSource::Bytes(vec![1])).await;

        assert!(!result.success);
        assert_eq!(result.text, "");
        assert_eq!(result.confidence, 0.0);
        assert!(result.error.unwrap().contains("engine crashed"));

        let failed = ExtractionResult::failed("engine crashed", 0);
        let set = findings(&failed, "static");
        assert_eq!(set.count(Severity::Error), 1);
    }

    #[test]
    fn test_from_text_is_fully_confident() {
        let result = from_text("Ingredients: water, salt");
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.low_confidence_words, 0);
        assert_eq!(result.words.len(), 3);
        assert_eq!(result.section("ingredients"), Some("water, salt"));
    }
}
