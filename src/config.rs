//! Configuration for labelcheck.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (LABELCHECK_*, ANTHROPIC_API_KEY, OPENAI_API_KEY)
//! 2. Config file (.labelcheck/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - `LABELCHECK_CONFIG` names a file explicitly
//! - Otherwise searches the current directory and parents for .labelcheck/config.yaml
//! - Then falls back to the user config dir (e.g. ~/.config/labelcheck/config.yaml)
//! - Relative paths in the file are relative to the project root (parent of .labelcheck/)

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::{CompletionParams, OcrOptions, PageSegmentation};
use crate::core::extraction::{LABEL_CHAR_ALLOWLIST, LOW_CONFIDENCE_WORD_THRESHOLD};

const CONFIG_DIR: &str = ".labelcheck";
const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-latest";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
const DEFAULT_REGULATORY_COMMAND: &str = "labelcheck-regulatory";
const DEFAULT_REGULATORY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MAX_CONCURRENT: usize = 4;
const DEFAULT_AI_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_OCR_TIMEOUT_MS: u64 = 60_000;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub version: Option<String>,
    pub ocr: OcrSection,
    pub ai: AiSection,
    pub regulatory: RegulatorySection,
    pub pipeline: PipelineSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OcrSection {
    pub binary: Option<String>,
    pub language: Option<String>,
    pub page_segmentation: Option<PageSegmentation>,
    pub char_allowlist: Option<String>,
    pub low_confidence_threshold: Option<f64>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AiSection {
    pub primary: Option<ProviderSection>,
    pub secondary: Option<ProviderSection>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSection {
    pub kind: ProviderKind,
    pub model: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
}

/// Completion provider implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    Openai,
}

impl ProviderKind {
    fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => DEFAULT_ANTHROPIC_MODEL,
            Self::Openai => DEFAULT_OPENAI_MODEL,
        }
    }

    fn default_key_env(&self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Openai => "OPENAI_API_KEY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Stdio,
    Http,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegulatorySection {
    pub transport: Option<TransportKind>,
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
    pub url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub max_concurrent: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub regulations: Vec<String>,
}

/// Resolved OCR settings
#[derive(Debug, Clone, Serialize)]
pub struct OcrSettings {
    pub binary: String,
    pub language: String,
    pub page_segmentation: PageSegmentation,
    pub char_allowlist: Option<String>,
    pub low_confidence_threshold: f64,
    pub timeout_ms: u64,
}

impl OcrSettings {
    pub fn options(&self) -> OcrOptions {
        OcrOptions {
            page_segmentation: self.page_segmentation,
            char_allowlist: self.char_allowlist.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// One resolved provider slot
#[derive(Clone, Serialize)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub model: String,
    pub api_key_env: String,
    #[serde(skip)]
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl ProviderSettings {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("api_key_env", &self.api_key_env)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AiSettings {
    pub primary: ProviderSettings,
    pub secondary: ProviderSettings,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_ms: u64,
}

impl AiSettings {
    pub fn params(&self) -> CompletionParams {
        CompletionParams {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// How the regulatory service is reached
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum RegulatoryTransport {
    Stdio { command: String, args: Vec<String> },
    Http { url: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RegulatorySettings {
    #[serde(flatten)]
    pub transport: RegulatoryTransport,
    pub timeout_ms: u64,
    pub max_concurrent: usize,
}

impl RegulatorySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Fully resolved configuration
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub ocr: OcrSettings,
    pub ai: AiSettings,
    pub regulatory: RegulatorySettings,
    /// Default regulation set for jobs that name none
    pub regulations: Vec<String>,
}

/// Find a config file by searching `start` and its parents, then the user config dir
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    dirs::config_dir()
        .map(|dir| dir.join("labelcheck").join(CONFIG_FILE))
        .filter(|path| path.exists())
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's project root
pub fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from the process environment and discovered config file
pub fn load_config() -> Result<ResolvedConfig> {
    let config_file = match std::env::var("LABELCHECK_CONFIG") {
        Ok(path) => Some(PathBuf::from(path)),
        Err(_) => {
            let cwd = std::env::current_dir().context("Failed to determine current directory")?;
            find_config_file(&cwd)
        }
    };

    let file = match config_file {
        Some(path) => {
            let parsed = load_config_file(&path)?;
            Some((path, parsed))
        }
        None => None,
    };

    resolve_with(file, |key| std::env::var(key).ok())
}

fn parse_env<T: std::str::FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T::Err: fmt::Display,
{
    match env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {} ({})", key, raw, e)),
        None => Ok(None),
    }
}

fn resolve_provider(
    section: Option<&ProviderSection>,
    default_kind: ProviderKind,
    model_env: Option<String>,
    env: &impl Fn(&str) -> Option<String>,
) -> ProviderSettings {
    let kind = section.map(|s| s.kind).unwrap_or(default_kind);
    let api_key_env = section
        .and_then(|s| s.api_key_env.clone())
        .unwrap_or_else(|| kind.default_key_env().to_string());

    ProviderSettings {
        kind,
        model: model_env
            .or_else(|| section.and_then(|s| s.model.clone()))
            .unwrap_or_else(|| kind.default_model().to_string()),
        api_key: env(&api_key_env),
        api_key_env,
        base_url: section.and_then(|s| s.base_url.clone()),
    }
}

/// Resolve configuration from an optional parsed file and an environment lookup
pub fn resolve_with(
    file: Option<(PathBuf, ConfigFile)>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let (config_file, config) = match file {
        Some((path, config)) => (Some(path), config),
        None => (None, ConfigFile::default()),
    };

    // Base directory is the parent of .labelcheck/ (i.e., grandparent of config.yaml)
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .and_then(Path::parent)
        .unwrap_or(Path::new("."))
        .to_path_buf();

    let ocr = OcrSettings {
        binary: env("TESSERACT_PATH")
            .or_else(|| config.ocr.binary.clone())
            .unwrap_or_else(|| "tesseract".to_string()),
        language: config.ocr.language.clone().unwrap_or_else(|| "eng".to_string()),
        page_segmentation: config.ocr.page_segmentation.unwrap_or_default(),
        char_allowlist: Some(
            config
                .ocr
                .char_allowlist
                .clone()
                .unwrap_or_else(|| LABEL_CHAR_ALLOWLIST.to_string()),
        )
        .filter(|a| !a.is_empty()),
        low_confidence_threshold: config
            .ocr
            .low_confidence_threshold
            .unwrap_or(LOW_CONFIDENCE_WORD_THRESHOLD),
        timeout_ms: config.ocr.timeout_ms.unwrap_or(DEFAULT_OCR_TIMEOUT_MS),
    };

    let ai = AiSettings {
        primary: resolve_provider(
            config.ai.primary.as_ref(),
            ProviderKind::Anthropic,
            env("LABELCHECK_PRIMARY_MODEL"),
            &env,
        ),
        secondary: resolve_provider(
            config.ai.secondary.as_ref(),
            ProviderKind::Openai,
            env("LABELCHECK_SECONDARY_MODEL"),
            &env,
        ),
        max_tokens: config.ai.max_tokens.unwrap_or(CompletionParams::default().max_tokens),
        temperature: config.ai.temperature.unwrap_or(CompletionParams::default().temperature),
        timeout_ms: parse_env(&env, "LABELCHECK_AI_TIMEOUT_MS")?
            .or(config.ai.timeout_ms)
            .unwrap_or(DEFAULT_AI_TIMEOUT_MS),
    };

    let url = env("LABELCHECK_REGULATORY_URL").or_else(|| config.regulatory.url.clone());
    let transport_kind = match (config.regulatory.transport, &url) {
        (Some(kind), _) if env("LABELCHECK_REGULATORY_URL").is_none() => kind,
        (_, Some(_)) => TransportKind::Http,
        (_, None) => TransportKind::Stdio,
    };
    let transport = match transport_kind {
        TransportKind::Http => RegulatoryTransport::Http {
            url: url.context("regulatory.transport is http but no regulatory.url is set")?,
        },
        TransportKind::Stdio => {
            let command = env("LABELCHECK_REGULATORY_COMMAND")
                .or_else(|| config.regulatory.command.clone())
                .unwrap_or_else(|| DEFAULT_REGULATORY_COMMAND.to_string());
            // Bare names are looked up on PATH; anything with a separator is a path
            let command = if command.contains(std::path::MAIN_SEPARATOR) || command.contains('/') {
                resolve_path(&base_dir, &command).display().to_string()
            } else {
                command
            };
            RegulatoryTransport::Stdio {
                command,
                args: config.regulatory.args.clone().unwrap_or_default(),
            }
        }
    };

    let regulatory = RegulatorySettings {
        transport,
        timeout_ms: parse_env(&env, "LABELCHECK_REGULATORY_TIMEOUT_MS")?
            .or(config.regulatory.timeout_ms)
            .unwrap_or(DEFAULT_REGULATORY_TIMEOUT_MS),
        max_concurrent: config
            .regulatory
            .max_concurrent
            .unwrap_or(DEFAULT_MAX_CONCURRENT)
            .max(1),
    };

    let regulations = match env("LABELCHECK_REGULATIONS") {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        None => config.pipeline.regulations.clone(),
    };

    Ok(ResolvedConfig {
        config_file,
        ocr,
        ai,
        regulatory,
        regulations,
    })
}
