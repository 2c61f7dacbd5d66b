//! Fakes for each capability trait, shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use labelcheck::adapters::{
    CompletionParams, CompletionProvider, OcrEngine, OcrError, OcrOptions, OcrOutput,
    ProviderError, StdioToolClient,
};
use labelcheck::domain::{BoundingBox, ImageSource, OcrWord};

/// Path of the reference regulatory server built alongside the tests
pub fn regulatory_server() -> &'static str {
    env!("CARGO_BIN_EXE_labelcheck-regulatory")
}

pub fn stdio_client() -> StdioToolClient {
    StdioToolClient::new(regulatory_server(), Vec::new())
}

/// OCR engine that returns fixed text with uniform word confidence
pub struct FakeOcr {
    text: String,
    word_confidence: f64,
    fail: bool,
}

impl FakeOcr {
    pub fn clear(text: &str) -> Self {
        Self {
            text: text.to_string(),
            word_confidence: 96.0,
            fail: false,
        }
    }

    pub fn with_word_confidence(mut self, confidence: f64) -> Self {
        self.word_confidence = confidence;
        self
    }

    pub fn failing() -> Self {
        Self {
            text: String::new(),
            word_confidence: 0.0,
            fail: true,
        }
    }
}

#[async_trait]
impl OcrEngine for FakeOcr {
    fn name(&self) -> &str {
        "fake_ocr"
    }

    async fn recognize(&self, _image: &ImageSource, _options: &OcrOptions) -> Result<OcrOutput, OcrError> {
        if self.fail {
            return Err(OcrError::Engine("engine crashed".to_string()));
        }

        let words = self
            .text
            .split_whitespace()
            .enumerate()
            .map(|(i, word)| OcrWord {
                text: word.to_string(),
                confidence: self.word_confidence,
                bbox: BoundingBox {
                    x0: i as u32 * 10,
                    y0: 0,
                    x1: i as u32 * 10 + 8,
                    y1: 12,
                },
            })
            .collect();

        Ok(OcrOutput {
            text: self.text.clone(),
            confidence: self.word_confidence,
            words,
            lines: Vec::new(),
        })
    }
}

/// What a scripted provider does on every call
#[derive(Clone)]
pub enum Script {
    Answer(String),
    Fail(ProviderError),
    Hang,
}

/// Completion provider that follows a script and counts calls
pub struct ScriptedProvider {
    name: &'static str,
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(name: &'static str, script: Script) -> Arc<Self> {
        Arc::new(Self {
            name,
            script,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn complete(&self, _prompt: &str, _params: &CompletionParams) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Answer(text) => Ok(text.clone()),
            Script::Fail(error) => Err(error.clone()),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProviderError::EmptyResponse)
            }
        }
    }
}

/// A well-formed model answer in a fenced block
pub fn model_answer(corrected_text: &str, ingredients: &[&str]) -> String {
    let payload = serde_json::json!({
        "isValid": true,
        "confidence": 0.95,
        "correctedText": corrected_text,
        "extractedInformation": {
            "productName": "Simple Syrup",
            "ingredients": ingredients,
            "allergens": [],
            "nutritionalInfo": {},
            "warnings": [],
            "claims": []
        },
        "ocrIssuesFound": [],
        "completenessScore": 6,
        "complianceIssues": [],
        "recommendations": ["Add a net weight statement"]
    });
    format!("Here is the result:\n```json\n{}\n```\n", serde_json::to_string_pretty(&payload).unwrap())
}

/// Label text long enough to pass the short-text rule
pub const CLEAR_LABEL: &str = "SIMPLE SYRUP\nNet Wt 12 oz (340 g)\nINGREDIENTS: Water, Sugar, Salt\nDistributed by Example Foods Inc.";
