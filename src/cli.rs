//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Auto-Factory - consulting report factory
///
/// Computes KPI summaries from CSV data, renders them into a consulting
/// report and a slide outline, and certifies that every number, chart and
/// provenance field in those artifacts matches the summary.
///
/// Examples:
///   autofactory summarize --input data/ --output analysis_summary.json
///   autofactory render --summary analysis_summary.json --model claude-3-haiku-20240307
///   autofactory validate --summary reports/analysis_summary.json reports/*.md
///   autofactory init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .autofactory.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Do not require provenance fields
    ///
    /// Rendering proceeds with whatever provenance is known, and provenance
    /// findings are reported as warnings.
    #[arg(long, global = true)]
    pub no_provenance: bool,

    /// Directory with template overrides
    ///
    /// Looks for consulting_report.md.tmpl and slides_outline.md.tmpl.
    #[arg(long, value_name = "DIR", global = true)]
    pub template_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compute a summary from the CSV files in a directory
    Summarize {
        /// Directory holding orders.csv / customers.csv
        #[arg(short, long, value_name = "DIR")]
        input: PathBuf,

        /// Where to write the summary JSON
        #[arg(short, long, default_value = "analysis_summary.json", value_name = "FILE")]
        output: PathBuf,

        /// Chart path to record in the summary (repeatable)
        #[arg(long = "chart", value_name = "PATH")]
        charts: Vec<String>,
    },

    /// Render artifacts from a summary
    Render {
        /// Summary JSON to render
        #[arg(short, long, value_name = "FILE")]
        summary: PathBuf,

        /// Output directory (default: from config, else "reports")
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Which artifacts to render
        #[arg(short, long, default_value = "all", value_name = "KIND")]
        template: TemplateChoice,

        /// LLM model name recorded in provenance
        #[arg(short, long, env = "AUTOFACTORY_MODEL")]
        model: Option<String>,

        /// Input tokens consumed by the LLM layer
        #[arg(long, value_name = "COUNT")]
        tokens_in: Option<u64>,

        /// Output tokens produced by the LLM layer
        #[arg(long, value_name = "COUNT")]
        tokens_out: Option<u64>,

        /// Override the detected git commit
        #[arg(long, value_name = "SHA")]
        git_commit: Option<String>,

        /// Dataset files to hash (default: the summary itself)
        #[arg(long, value_name = "FILE", value_delimiter = ',')]
        dataset: Vec<PathBuf>,
    },

    /// Validate artifacts against a summary
    ///
    /// Exit code 2 when any error finding is reported.
    Validate {
        /// Summary JSON that is the source of truth
        #[arg(short, long, value_name = "FILE")]
        summary: PathBuf,

        /// Artifacts to validate
        #[arg(required = true, value_name = "ARTIFACT")]
        artifacts: Vec<PathBuf>,

        /// Directory chart paths are resolved against (default: summary's directory)
        #[arg(long, value_name = "DIR")]
        base_dir: Option<PathBuf>,

        /// Also print findings as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Generate a default .autofactory.toml configuration file
    InitConfig,
}

/// Artifact selector for `render`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TemplateChoice {
    /// Consulting report only
    Report,
    /// Slide outline only
    Slides,
    /// Both artifacts (default)
    #[default]
    All,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref dir) = self.template_dir {
            if !dir.is_dir() {
                return Err(format!(
                    "Template directory does not exist: {}",
                    dir.display()
                ));
            }
        }

        match self.command {
            Command::Summarize { ref input, .. } => {
                if !input.is_dir() {
                    return Err(format!("Input directory does not exist: {}", input.display()));
                }
            }
            Command::Render {
                ref summary,
                ref dataset,
                ..
            } => {
                if !summary.is_file() {
                    return Err(format!("Summary file not found: {}", summary.display()));
                }
                if let Some(missing) = dataset.iter().find(|p| !p.is_file()) {
                    return Err(format!("Dataset file not found: {}", missing.display()));
                }
            }
            Command::Validate { ref summary, .. } => {
                if !summary.is_file() {
                    return Err(format!("Summary file not found: {}", summary.display()));
                }
            }
            Command::InitConfig => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
