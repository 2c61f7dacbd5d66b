//! Tesseract adapter for optical text recognition.
//!
//! Shells out to the `tesseract` CLI in TSV mode so per-word confidences and
//! bounding boxes are available. Remote and in-memory images are first written
//! to a temporary directory that lives for the duration of the call.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::{OcrEngine, OcrError, OcrOptions, OcrOutput, PageSegmentation};
use crate::domain::{BoundingBox, ImageSource, OcrWord};

/// Tesseract TSV level for a single word
const WORD_LEVEL: u32 = 5;

/// Tesseract adapter using subprocess mode
pub struct TesseractEngine {
    /// Path to the tesseract binary (default: "tesseract")
    binary_path: String,

    /// Traineddata language, e.g. "eng"
    language: String,

    /// Upper bound on a single recognition call
    call_timeout: Duration,

    /// HTTP client for URL images
    client: reqwest::Client,
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TesseractEngine {
    /// Create an engine using `TESSERACT_PATH` or `tesseract` from PATH
    pub fn new() -> Self {
        let binary_path =
            std::env::var("TESSERACT_PATH").unwrap_or_else(|_| "tesseract".to_string());
        Self::with_binary_path(binary_path)
    }

    /// Create an engine with a custom binary path
    pub fn with_binary_path(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            language: "eng".to_string(),
            call_timeout: Duration::from_secs(60),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Make the image available as a local file
    async fn materialize(&self, image: &ImageSource, dir: &TempDir) -> Result<PathBuf, OcrError> {
        match image {
            ImageSource::Path(path) => {
                tokio::fs::metadata(path).await.map_err(|e| {
                    OcrError::ImageLoad(format!("{}: {}", path.display(), e))
                })?;
                Ok(path.clone())
            }
            ImageSource::Url(url) => {
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| OcrError::ImageLoad(format!("failed to fetch {}: {}", url, e)))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(OcrError::ImageLoad(format!("fetching {} returned {}", url, status)));
                }

                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| OcrError::ImageLoad(format!("failed to read {}: {}", url, e)))?;
                write_temp_image(dir.path(), &bytes).await
            }
            ImageSource::Bytes(bytes) => write_temp_image(dir.path(), bytes).await,
        }
    }
}

async fn write_temp_image(dir: &Path, bytes: &[u8]) -> Result<PathBuf, OcrError> {
    if bytes.is_empty() {
        return Err(OcrError::ImageLoad("image is empty".to_string()));
    }
    let path = dir.join("label-image");
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| OcrError::ImageLoad(format!("failed to stage image: {}", e)))?;
    Ok(path)
}

fn psm_number(mode: PageSegmentation) -> &'static str {
    match mode {
        PageSegmentation::Auto => "3",
        PageSegmentation::SingleColumn => "4",
        PageSegmentation::SingleBlock => "6",
        PageSegmentation::SparseText => "11",
    }
}

/// Parse `tesseract ... tsv` output into words, lines and a mean confidence
pub fn parse_tsv(tsv: &str) -> Result<OcrOutput, OcrError> {
    let mut words = Vec::new();
    let mut lines: Vec<((u32, u32, u32, u32), Vec<String>)> = Vec::new();

    for (row, record) in tsv.lines().enumerate() {
        if row == 0 && record.starts_with("level") {
            continue;
        }
        if record.trim().is_empty() {
            continue;
        }

        let cols: Vec<&str> = record.split('\t').collect();
        if cols.len() < 11 {
            return Err(OcrError::Output(format!(
                "row {} has {} columns, expected 12",
                row,
                cols.len()
            )));
        }

        let num = |idx: usize| -> Result<u32, OcrError> {
            cols[idx]
                .trim()
                .parse::<u32>()
                .map_err(|_| OcrError::Output(format!("row {} column {} is not a number", row, idx)))
        };

        if num(0)? != WORD_LEVEL {
            continue;
        }

        let text = cols.get(11).map(|t| t.trim()).unwrap_or_default();
        let confidence: f64 = cols[10].trim().parse().unwrap_or(-1.0);
        if text.is_empty() || confidence < 0.0 {
            continue;
        }

        let (left, top, width, height) = (num(6)?, num(7)?, num(8)?, num(9)?);
        words.push(OcrWord {
            text: text.to_string(),
            confidence,
            bbox: BoundingBox {
                x0: left,
                y0: top,
                x1: left.saturating_add(width),
                y1: top.saturating_add(height),
            },
        });

        let key = (num(1)?, num(2)?, num(3)?, num(4)?);
        match lines.last_mut() {
            Some((last_key, line_words)) if *last_key == key => line_words.push(text.to_string()),
            _ => lines.push((key, vec![text.to_string()])),
        }
    }

    let confidence = if words.is_empty() {
        0.0
    } else {
        words.iter().map(|w| w.confidence).sum::<f64>() / words.len() as f64
    };

    let lines: Vec<String> = lines.into_iter().map(|(_, w)| w.join(" ")).collect();

    Ok(OcrOutput {
        text: lines.join("\n"),
        confidence,
        words,
        lines,
    })
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(
        &self,
        image: &ImageSource,
        options: &OcrOptions,
    ) -> Result<OcrOutput, OcrError> {
        let staging = tempfile::tempdir()
            .map_err(|e| OcrError::ImageLoad(format!("failed to create temp dir: {}", e)))?;
        let image_path = self.materialize(image, &staging).await?;

        let mut command = Command::new(&self.binary_path);
        command
            .arg(&image_path)
            .arg("stdout")
            .args(["-l", &self.language])
            .args(["--psm", psm_number(options.page_segmentation)]);
        if let Some(allowlist) = &options.char_allowlist {
            command.arg("-c").arg(format!("tessedit_char_whitelist={}", allowlist));
        }
        command
            .arg("tsv")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(binary = %self.binary_path, image = %image_path.display(), "Running tesseract");

        let output = timeout(self.call_timeout, command.output())
            .await
            .map_err(|_| OcrError::Timeout(self.call_timeout))?
            .map_err(|e| OcrError::Engine(format!("failed to run {}: {}", self.binary_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(format!(
                "tesseract exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|_| OcrError::Output("tesseract output is not valid UTF-8".to_string()))?;

        parse_tsv(&stdout)
    }
}
