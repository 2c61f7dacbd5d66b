//! Command-line interface for labelcheck.
//!
//! Provides commands for checking a label image end to end, running the
//! extraction stage alone, validating already-extracted text, calling a
//! regulatory tool directly, and showing the resolved configuration.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::ToolName;
use crate::config::{self, ResolvedConfig};
use crate::core::{tool_client, LabelPipeline};
use crate::domain::{ComplianceVerdict, ImageSource, LabelJob, Severity, VerdictStatus};

/// labelcheck - product label compliance checks
#[derive(Parser, Debug)]
#[command(name = "labelcheck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline on a label image
    Check {
        /// Image path or http(s) URL
        image: String,

        /// Target regulation (repeatable, defaults to pipeline.regulations)
        #[arg(short, long = "regulation")]
        regulations: Vec<String>,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,

        /// Exit with status 2 when the label requires review
        #[arg(long)]
        fail_on_review: bool,
    },

    /// Extract text and assess its quality, without AI or regulatory checks
    Extract {
        /// Image path or http(s) URL
        image: String,

        /// Print the extraction result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Correct and structure already-extracted label text
    ValidateText {
        /// Input file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Target regulation (repeatable)
        #[arg(short, long = "regulation")]
        regulations: Vec<String>,
    },

    /// Call a regulatory tool directly
    Tool {
        /// Tool name (validate_ingredients, check_additive_status, ...)
        name: String,

        /// Tool arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let cfg = config::load_config()?;

        match self.command {
            Commands::Check {
                image,
                regulations,
                json,
                fail_on_review,
            } => check_label(&cfg, &image, regulations, json, fail_on_review).await,
            Commands::Extract { image, json } => extract_only(&cfg, &image, json).await,
            Commands::ValidateText { input, regulations } => {
                validate_text(&cfg, input, regulations).await
            }
            Commands::Tool { name, args } => call_tool(&cfg, &name, &args).await,
            Commands::Config => show_config(&cfg),
        }
    }
}

fn image_filename(image: &str) -> String {
    image
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(image)
        .to_string()
}

/// Run the full pipeline on one image
async fn check_label(
    cfg: &ResolvedConfig,
    image: &str,
    regulations: Vec<String>,
    json: bool,
    fail_on_review: bool,
) -> Result<()> {
    let pipeline = LabelPipeline::from_config(cfg)?;
    let job = LabelJob::new(image_filename(image), ImageSource::from_reference(image))
        .with_regulations(regulations);

    let verdict = pipeline.run(&job).await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&verdict).context("Failed to encode verdict")?
        );
    } else {
        print_verdict(&verdict);
    }

    if fail_on_review && verdict.status == VerdictStatus::RequiresReview {
        std::process::exit(2);
    }
    Ok(())
}

fn print_verdict(verdict: &ComplianceVerdict) {
    let status = match verdict.status {
        VerdictStatus::Approved => "APPROVED",
        VerdictStatus::RequiresReview => "REQUIRES REVIEW",
    };
    println!("{}: {}", verdict.filename, status);
    println!("Run ID: {}", verdict.run_id);
    println!();

    println!("Stages:");
    for stage in &verdict.stages {
        let detail = stage.detail.as_deref().map(|d| format!(" ({})", d)).unwrap_or_default();
        println!("  {:<17} {:<10} {:>6}ms{}", format!("{:?}", stage.stage), format!("{:?}", stage.status), stage.duration_ms, detail);
    }
    println!();

    println!("Findings:");
    if verdict.findings.is_empty() {
        println!("  (none)");
    }
    for finding in &verdict.findings {
        println!(
            "  [{:<10}] {} ({}/{})",
            finding.severity.as_str(),
            finding.message,
            finding.source,
            finding.source_tag
        );
    }

    if !verdict.recommendations.is_empty() {
        println!();
        println!("Recommendations:");
        for recommendation in &verdict.recommendations {
            println!("  - {}", recommendation.message);
        }
    }

    println!();
    println!(
        "{} compliance, {} error, {} warning finding(s)",
        verdict.count(Severity::Compliance),
        verdict.count(Severity::Error),
        verdict.count(Severity::Warning)
    );
    println!("Corrected text sha256: {}", verdict.provenance.corrected_text_sha256);
}

/// Extraction and quality gate only
async fn extract_only(cfg: &ResolvedConfig, image: &str, json: bool) -> Result<()> {
    let pipeline = LabelPipeline::from_config(cfg)?;
    let (result, assessment) = pipeline.extract(&ImageSource::from_reference(image)).await;

    if json {
        let output = serde_json::json!({ "extraction": result, "quality": assessment });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to encode extraction")?
        );
        return Ok(());
    }

    if let Some(error) = &result.error {
        eprintln!("Extraction failed: {}", error);
        std::process::exit(1);
    }

    println!("{}", result.text);
    eprintln!();
    eprintln!(
        "[confidence {:.2}, {} word(s), {} low-confidence, tier {}]",
        result.confidence,
        result.words.len(),
        result.low_confidence_words,
        assessment.tier.as_str()
    );
    for issue in &assessment.issues {
        eprintln!("  issue: {}", issue);
    }
    for section in result.detected_sections.keys() {
        eprintln!("  section: {}", section);
    }
    Ok(())
}

/// Run the AI stage on text from a file or stdin
async fn validate_text(
    cfg: &ResolvedConfig,
    input_file: Option<PathBuf>,
    regulations: Vec<String>,
) -> Result<()> {
    let input = if let Some(path) = input_file {
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        buffer
    } else {
        anyhow::bail!("No input provided. Use --input <file> or pipe to stdin");
    };

    if input.trim().is_empty() {
        anyhow::bail!("Input is empty");
    }

    let pipeline = LabelPipeline::from_config(cfg)?;
    let record = pipeline.validate_text(&input, &regulations).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&record).context("Failed to encode validation record")?
    );
    Ok(())
}

/// Call one regulatory tool and print its decoded payload
async fn call_tool(cfg: &ResolvedConfig, name: &str, args: &str) -> Result<()> {
    let tool: ToolName = name.parse().map_err(anyhow::Error::msg)?;
    let arguments: serde_json::Value =
        serde_json::from_str(args).context("--args must be a JSON object")?;
    if !arguments.is_object() {
        anyhow::bail!("--args must be a JSON object");
    }

    let client = tool_client(&cfg.regulatory)?;
    let payload = client
        .call_tool(tool, arguments)
        .await
        .with_context(|| format!("Tool '{}' failed via {}", tool, client.name()))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("Failed to encode payload")?
    );
    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config(cfg: &ResolvedConfig) -> Result<()> {
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    print!("{}", serde_yaml::to_string(cfg).context("Failed to encode configuration")?);
    println!();
    println!("Providers:");
    for (role, provider) in [("primary", &cfg.ai.primary), ("secondary", &cfg.ai.secondary)] {
        let state = if provider.is_configured() {
            "configured"
        } else {
            "no API key"
        };
        println!("  {}: {:?} {} ({}: {})", role, provider.kind, provider.model, provider.api_key_env, state);
    }
    Ok(())
}
