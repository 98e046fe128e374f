//! Consistency validation of rendered artifacts against their summary.

mod checks;
pub mod findings;

pub use findings::{Check, Finding, FindingKind, Severity, ValidationReport};

use crate::config::ValidationConfig;
use crate::error::Result;
use crate::models::SummaryModel;
use crate::rounding::RoundingPolicy;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A rendered artifact loaded for validation.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub text: String,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::new(path, text))
    }
}

/// Read-only inputs shared by every check.
pub(crate) struct Inputs<'a> {
    summary: &'a SummaryModel,
    summary_path: &'a Path,
    artifacts: &'a [Artifact],
    base_dir: &'a Path,
    config: &'a ValidationConfig,
    policy: &'a RoundingPolicy,
    provenance_required: bool,
}

/// Runs the five checks and collects every finding.
pub struct ConsistencyValidator<'a> {
    policy: &'a RoundingPolicy,
    config: &'a ValidationConfig,
    provenance_required: bool,
    base_dir: Option<PathBuf>,
}

impl<'a> ConsistencyValidator<'a> {
    pub fn new(policy: &'a RoundingPolicy, config: &'a ValidationConfig) -> Self {
        Self {
            policy,
            config,
            provenance_required: true,
            base_dir: None,
        }
    }

    /// Provenance findings are errors when required, warnings otherwise.
    pub fn require_provenance(mut self, required: bool) -> Self {
        self.provenance_required = required;
        self
    }

    /// Directory chart paths are resolved against.
    ///
    /// Defaults to the directory holding the summary.
    pub fn with_base_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.base_dir = dir;
        self
    }

    pub fn validate(
        &self,
        summary: &SummaryModel,
        summary_path: &Path,
        artifacts: &[Artifact],
    ) -> ValidationReport {
        let base_dir = match self.base_dir {
            Some(ref dir) => dir.clone(),
            None => match summary_path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            },
        };
        debug!("Resolving chart paths against {}", base_dir.display());

        let inputs = Inputs {
            summary,
            summary_path,
            artifacts,
            base_dir: &base_dir,
            config: self.config,
            policy: self.policy,
            provenance_required: self.provenance_required,
        };

        let runs: [(Check, fn(&Inputs<'_>) -> Vec<Finding>); 5] = [
            (Check::KpiParity, checks::kpi_parity),
            (Check::CategoryTotals, checks::category_totals),
            (Check::ChartReferences, checks::chart_references),
            (Check::Provenance, checks::provenance),
            (Check::RoundingConsistency, checks::rounding_consistency),
        ];

        let mut findings = Vec::new();
        for (check, run) in runs {
            let found = run(&inputs);
            debug!("{:?}: {} findings", check, found.len());
            findings.extend(found);
        }

        let report = ValidationReport::new(findings);
        info!(
            "Validated {} artifacts: {} errors, {} warnings",
            artifacts.len(),
            report.errors().count(),
            report.warnings().count()
        );
        report
    }
}
