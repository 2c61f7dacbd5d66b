//! Prompt construction for the AI correction and extraction stage.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::domain::QualityAssessment;

/// Everything the prompt is built from
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub text: &'a str,
    pub quality: &'a QualityAssessment,
    pub sections: &'a BTreeMap<String, String>,
    pub regulations: &'a [String],
}

const RESPONSE_SCHEMA: &str = r#"{
  "isValid": boolean,
  "confidence": number between 0 and 1,
  "correctedText": "the full corrected transcription, same lines as the input",
  "ocrIssuesFound": ["each OCR error you corrected, as 'wrong -> right'"],
  "extractedInformation": {
    "productName": "string or null",
    "brandName": "string or null",
    "netWeight": "string or null",
    "manufacturer": "string or null",
    "ingredients": ["each ingredient, in label order"],
    "allergens": ["each declared allergen"],
    "nutritionalInfo": { "totalFat": "2g", "sodium": "140mg" },
    "warnings": ["each warning statement"],
    "claims": ["each nutrient content or health claim, e.g. 'low fat'"]
  },
  "completenessScore": integer 0-10,
  "complianceIssues": ["each regulatory problem with the label"],
  "recommendations": ["each suggested fix"]
}"#;

/// Build the single structured prompt sent to every provider
pub fn build_prompt(input: &PromptInput<'_>) -> String {
    let mut prompt = String::with_capacity(input.text.len() * 2 + 2048);

    prompt.push_str(
        "You are reviewing text read by OCR from a photographed product label for regulatory compliance.\n\n",
    );

    let regulations = if input.regulations.is_empty() {
        "FDA food labeling (21 CFR 101)".to_string()
    } else {
        input.regulations.join(", ")
    };
    let _ = writeln!(prompt, "Target regulations: {}", regulations);
    let _ = writeln!(
        prompt,
        "OCR quality: {} (confidence {:.0}%)",
        input.quality.tier.as_str(),
        input.quality.confidence * 100.0
    );
    if !input.quality.issues.is_empty() {
        let _ = writeln!(prompt, "OCR quality issues: {}", input.quality.issues.join("; "));
    }

    prompt.push_str(
        "\nTASK 1 - CORRECTION\n\
         Correct only obvious OCR errors (misread characters, broken words, wrong spacing).\n\
         Reproduce the text verbatim otherwise: keep every line, in order, with the same line breaks.\n\
         Do NOT paraphrase, summarize, reorder, translate or add text that is not on the label.\n\
         If a passage is unreadable, keep it as-is.\n\n\
         TASK 2 - EXTRACTION\n\
         Extract the regulatory fields from the corrected text. Leave a field empty when it is not on the label.\n\
         Do not infer ingredients or claims that are not printed.\n\n",
    );

    if !input.sections.is_empty() {
        prompt.push_str("Sections detected by layout analysis (may be incomplete):\n");
        for (name, body) in input.sections {
            let _ = writeln!(prompt, "- {}: {}", name, body.replace('\n', " "));
        }
        prompt.push('\n');
    }

    prompt.push_str("OCR TEXT:\n<<<\n");
    prompt.push_str(input.text);
    prompt.push_str("\n>>>\n\n");

    prompt.push_str("Respond with a single JSON object inside a ```json fenced code block, using exactly this shape:\n");
    prompt.push_str(RESPONSE_SCHEMA);
    prompt.push('\n');

    prompt
}
