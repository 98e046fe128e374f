//! Auto-Factory - consulting report factory
//!
//! A CLI tool that turns KPI summaries into a consulting report and a
//! slide outline, and certifies that the artifacts agree with the summary
//! they were rendered from.
//!
//! Exit codes:
//!   0 - Success (validation passed)
//!   1 - Runtime error (missing files, bad config, render failure, etc.)
//!   2 - Validation found at least one error

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod provenance;
mod report;
mod rounding;
mod scanner;
mod validate;

use anyhow::{Context, Result};
use cli::{Args, Command, TemplateChoice};
use config::Config;
use models::{Provenance, SummaryModel};
use report::{write_atomic, ArtifactRenderer, Template};
use rounding::RoundingPolicy;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use validate::{Artifact, ConsistencyValidator};

/// File name of the provenance-enriched summary written next to the artifacts.
const SUMMARY_FILE: &str = "analysis_summary.json";

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("Auto-Factory v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .autofactory.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Edit it to customize rounding, tolerances, provenance, and templates.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Dispatch a subcommand. Returns the process exit code.
fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    match args.command {
        Command::Summarize {
            ref input,
            ref output,
            ref charts,
        } => handle_summarize(&config, input, output, charts),
        Command::Render {
            ref summary,
            ref output_dir,
            template,
            ref model,
            tokens_in,
            tokens_out,
            ref git_commit,
            ref dataset,
        } => {
            let output_dir = output_dir
                .clone()
                .unwrap_or_else(|| config.general.output_dir.clone());
            let explicit = Provenance {
                model: model.clone(),
                tokens_in,
                tokens_out,
                git_commit: git_commit.clone(),
                ..Default::default()
            };
            handle_render(&config, summary, &output_dir, template, explicit, dataset)
        }
        Command::Validate {
            ref summary,
            ref artifacts,
            ref base_dir,
            json,
        } => handle_validate(&config, summary, artifacts, base_dir.clone(), json),
        Command::InitConfig => handle_init_config().map(|_| 0),
    }
}

/// Compute a summary from CSV files.
fn handle_summarize(config: &Config, input: &Path, output: &Path, charts: &[String]) -> Result<i32> {
    println!("🔬 Analyzing datasets in {}", input.display());

    let summary = analysis::Analyzer::new(&config.analysis)
        .summarize(input, charts)
        .with_context(|| format!("Failed to analyze {}", input.display()))?;

    let json = summary.to_json().context("Failed to serialize summary")?;
    write_atomic(output, &json)
        .with_context(|| format!("Failed to write summary to {}", output.display()))?;

    println!("\n📊 Summary:");
    println!("   KPIs: {}", summary.kpis.len());
    println!("   Categories: {}", summary.categories.len());
    if let Some(ref hash) = summary.provenance.dataset_hash {
        println!("   Dataset SHA-256: {}", hash);
    }
    println!("\n✅ Summary saved to: {}", output.display());
    Ok(0)
}

/// Render artifacts from a summary.
fn handle_render(
    config: &Config,
    summary_path: &Path,
    output_dir: &Path,
    choice: TemplateChoice,
    explicit: Provenance,
    dataset: &[PathBuf],
) -> Result<i32> {
    let summary = SummaryModel::load(summary_path)
        .with_context(|| format!("Failed to load summary from {}", summary_path.display()))?;

    let provenance = resolve_provenance(summary_path, &summary, explicit, dataset)?;
    let missing = provenance.missing();
    if !missing.is_empty() {
        warn!(
            "Provenance incomplete: {}",
            missing.iter().map(|f| f.key()).collect::<Vec<_>>().join(", ")
        );
    }

    let policy = RoundingPolicy::from(&config.rounding);
    let renderer = ArtifactRenderer::new(&policy, config.report.title.clone())
        .with_template_dir(config.report.template_dir.clone())
        .require_provenance(config.provenance.enabled);

    let templates: &[Template] = match choice {
        TemplateChoice::Report => &[Template::Report],
        TemplateChoice::Slides => &[Template::Slides],
        TemplateChoice::All => &Template::ALL,
    };

    println!("📝 Rendering {} artifact(s) into {}", templates.len(), output_dir.display());

    let enriched = summary.with_provenance(provenance);
    for template in templates {
        let path = renderer
            .publish(&enriched, &enriched.provenance, *template, output_dir)
            .with_context(|| format!("Failed to render {}", template.file_name()))?;
        println!("   📄 {}", path.display());
    }

    if config.report.write_json {
        let path = output_dir.join(SUMMARY_FILE);
        let json = enriched.to_json().context("Failed to serialize summary")?;
        write_atomic(&path, &json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("   🧾 {}", path.display());
    }

    println!("\n✅ Render complete!");
    Ok(0)
}

/// Merge provenance: command-line values, then the summary's own, then detected.
fn resolve_provenance(
    summary_path: &Path,
    summary: &SummaryModel,
    mut explicit: Provenance,
    dataset: &[PathBuf],
) -> Result<Provenance> {
    if !dataset.is_empty() {
        explicit.dataset_hash = Some(
            provenance::dataset_sha256(dataset).context("Failed to hash dataset files")?,
        );
    }

    let dir = match summary_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let detected = Provenance {
        timestamp: Some(provenance::now_timestamp()),
        dataset_hash: Some(
            provenance::file_sha256(summary_path)
                .with_context(|| format!("Failed to hash {}", summary_path.display()))?,
        ),
        git_commit: provenance::git_commit(&dir),
        ..Default::default()
    };

    Ok(explicit.or(summary.provenance.clone()).or(detected))
}

/// Validate artifacts against a summary. Returns 2 when errors are found.
fn handle_validate(
    config: &Config,
    summary_path: &Path,
    artifact_paths: &[PathBuf],
    base_dir: Option<PathBuf>,
    json: bool,
) -> Result<i32> {
    let summary = SummaryModel::load(summary_path)
        .with_context(|| format!("Failed to load summary from {}", summary_path.display()))?;

    let artifacts = artifact_paths
        .iter()
        .map(|path| {
            Artifact::load(path).with_context(|| format!("Failed to read artifact {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let policy = RoundingPolicy::from(&config.rounding);
    let report = ConsistencyValidator::new(&policy, &config.validation)
        .require_provenance(config.provenance.enabled)
        .with_base_dir(base_dir)
        .validate(&summary, summary_path, &artifacts);

    eprintln!("{}", report.render_text());
    if json {
        println!("{}", report.to_json().context("Failed to serialize findings")?);
    }

    if report.passed() {
        Ok(0)
    } else {
        Ok(2)
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_summary(dir: &Path) -> PathBuf {
        let summary = SummaryModel {
            kpis: [
                ("total_revenue".to_string(), 125430.456),
                ("category_total".to_string(), 300.0),
            ]
            .into_iter()
            .collect(),
            categories: vec![
                models::Category::new("A", 100.0),
                models::Category::new("B", 200.0),
            ],
            charts: Vec::new(),
            provenance: Provenance {
                timestamp: Some("2024-05-01T12:00:00Z".to_string()),
                ..Default::default()
            },
        };
        let path = dir.join("summary.json");
        fs::write(&path, summary.to_json().unwrap()).unwrap();
        path
    }

    #[test]
    fn test_resolve_provenance_precedence() {
        let dir = TempDir::new().unwrap();
        let summary_path = write_summary(dir.path());
        let summary = SummaryModel::load(&summary_path).unwrap();

        let explicit = Provenance {
            model: Some("claude-3-haiku-20240307".to_string()),
            git_commit: Some("abc123".to_string()),
            tokens_in: Some(10),
            tokens_out: Some(20),
            ..Default::default()
        };
        let resolved = resolve_provenance(&summary_path, &summary, explicit, &[]).unwrap();

        assert_eq!(resolved.timestamp.as_deref(), Some("2024-05-01T12:00:00Z"));
        assert_eq!(resolved.git_commit.as_deref(), Some("abc123"));
        assert_eq!(
            resolved.dataset_hash,
            Some(provenance::file_sha256(&summary_path).unwrap())
        );
        assert!(resolved.missing().is_empty());
    }

    #[test]
    fn test_render_then_validate() {
        let dir = TempDir::new().unwrap();
        let summary_path = write_summary(dir.path());
        let out = dir.path().join("reports");
        let config = Config::default();

        let explicit = Provenance {
            model: Some("claude-3-haiku-20240307".to_string()),
            git_commit: Some("abc123".to_string()),
            tokens_in: Some(10),
            tokens_out: Some(20),
            ..Default::default()
        };
        let code = handle_render(&config, &summary_path, &out, TemplateChoice::All, explicit, &[])
            .unwrap();
        assert_eq!(code, 0);
        assert!(out.join("consulting_report.md").exists());
        assert!(out.join("slides_outline.md").exists());

        let enriched = out.join(SUMMARY_FILE);
        let artifacts = vec![out.join("consulting_report.md"), out.join("slides_outline.md")];
        assert_eq!(handle_validate(&config, &enriched, &artifacts, None, true).unwrap(), 0);

        let report = out.join("consulting_report.md");
        let text = fs::read_to_string(&report).unwrap();
        fs::write(&report, text.replace("125430.46", "125430.00")).unwrap();
        assert_eq!(handle_validate(&config, &enriched, &artifacts, None, false).unwrap(), 2);
    }

    #[test]
    fn test_render_fails_without_provenance() {
        let dir = TempDir::new().unwrap();
        let summary_path = write_summary(dir.path());
        let out = dir.path().join("reports");
        let config = Config::default();

        // No model or token counts anywhere.
        let result = handle_render(
            &config,
            &summary_path,
            &out,
            TemplateChoice::Report,
            Provenance::default(),
            &[],
        );
        assert!(result.is_err());
        assert!(!out.join("consulting_report.md").exists());
    }
}
