//! Validation findings and the aggregated report.

use crate::error::FactoryError;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Severity of a finding. Only errors fail validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl Severity {
    /// Returns an emoji representation of the severity.
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Warning => "⚠️ ",
            Severity::Error => "❌",
        }
    }
}

/// The check that produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    KpiParity,
    CategoryTotals,
    ChartReferences,
    Provenance,
    RoundingConsistency,
}

/// Machine-readable finding code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FindingKind {
    #[serde(rename = "ParityError")]
    Parity,
    #[serde(rename = "RoundingError")]
    Rounding,
    #[serde(rename = "ToleranceExceededError")]
    ToleranceExceeded,
    #[serde(rename = "NegativeCategory")]
    NegativeCategory,
    #[serde(rename = "ChartReferenceError")]
    ChartReference,
    #[serde(rename = "MissingProvenanceError")]
    MissingProvenance,
    #[serde(rename = "ProvenanceMismatch")]
    ProvenanceMismatch,
    #[serde(rename = "InvalidNumber")]
    InvalidNumber,
    #[serde(rename = "KpiNotMentioned")]
    KpiNotMentioned,
    #[serde(rename = "CategoryNotMentioned")]
    CategoryNotMentioned,
    #[serde(rename = "MissingTotal")]
    MissingTotal,
    #[serde(rename = "ChartNotCited")]
    ChartNotCited,
    #[serde(rename = "DuplicateCategoryError")]
    DuplicateCategory,
}

impl FindingKind {
    pub fn code(&self) -> &'static str {
        match self {
            FindingKind::Parity => "ParityError",
            FindingKind::Rounding => "RoundingError",
            FindingKind::ToleranceExceeded => "ToleranceExceededError",
            FindingKind::NegativeCategory => "NegativeCategory",
            FindingKind::ChartReference => "ChartReferenceError",
            FindingKind::MissingProvenance => "MissingProvenanceError",
            FindingKind::ProvenanceMismatch => "ProvenanceMismatch",
            FindingKind::InvalidNumber => "InvalidNumber",
            FindingKind::KpiNotMentioned => "KpiNotMentioned",
            FindingKind::CategoryNotMentioned => "CategoryNotMentioned",
            FindingKind::MissingTotal => "MissingTotal",
            FindingKind::ChartNotCited => "ChartNotCited",
            FindingKind::DuplicateCategory => "DuplicateCategoryError",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One defect (or notice) discovered by a check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub check: Check,
    pub severity: Severity,
    pub kind: FindingKind,
    /// Artifact the finding refers to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
    /// KPI, category, chart path or provenance field concerned.
    pub subject: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

impl Finding {
    pub fn new(
        check: Check,
        severity: Severity,
        kind: FindingKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            check,
            severity,
            kind,
            artifact: None,
            subject: subject.into(),
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    /// An error finding whose message comes from a typed error.
    pub fn from_error(
        check: Check,
        kind: FindingKind,
        subject: impl Into<String>,
        err: FactoryError,
    ) -> Self {
        let mut finding = Self::new(check, Severity::Error, kind, subject, err.to_string());
        if let FactoryError::Parity {
            expected, actual, ..
        } = err
        {
            finding.expected = Some(expected);
            finding.actual = Some(actual);
        }
        finding
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn in_artifact(mut self, path: &Path) -> Self {
        self.artifact = Some(path.to_path_buf());
        self
    }

    pub fn expected_actual(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] ", self.severity.emoji(), self.kind)?;
        if let Some(ref artifact) = self.artifact {
            write!(f, "{}: ", artifact.display())?;
        }
        write!(f, "{}", self.message)
    }
}

/// Everything a validation run found.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    pub fn new(findings: Vec<Finding>) -> Self {
        Self { findings }
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.is_error())
    }

    /// True when no error-severity finding exists.
    pub fn passed(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn has_kind(&self, kind: FindingKind) -> bool {
        self.findings.iter().any(|f| f.kind == kind)
    }

    /// Human-readable listing, errors first.
    pub fn render_text(&self) -> String {
        let mut lines = Vec::new();

        for finding in self.errors().chain(self.warnings()) {
            lines.push(finding.to_string());
        }

        let errors = self.errors().count();
        let warnings = self.warnings().count();
        if self.passed() {
            lines.push(format!("✅ Validation passed ({} warnings)", warnings));
        } else {
            lines.push(format!(
                "⛔ Validation failed: {} errors, {} warnings",
                errors, warnings
            ));
        }

        lines.join("\n")
    }

    /// Machine-readable listing.
    pub fn to_json(&self) -> serde_json::Result<String> {
        #[derive(Serialize)]
        struct Payload<'a> {
            passed: bool,
            errors: usize,
            warnings: usize,
            findings: &'a [Finding],
        }

        serde_json::to_string_pretty(&Payload {
            passed: self.passed(),
            errors: self.errors().count(),
            warnings: self.warnings().count(),
            findings: &self.findings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_error_keeps_parity_values() {
        let finding = Finding::from_error(
            Check::KpiParity,
            FindingKind::Parity,
            "total_revenue",
            FactoryError::Parity {
                subject: "total_revenue".to_string(),
                expected: "125430.46".to_string(),
                actual: "125430.00".to_string(),
            },
        )
        .in_artifact(Path::new("consulting_report.md"));

        assert_eq!(finding.kind, FindingKind::Parity);
        assert!(finding.is_error());
        assert_eq!(finding.expected.as_deref(), Some("125430.46"));
        assert_eq!(finding.actual.as_deref(), Some("125430.00"));
        assert!(finding.to_string().contains("[ParityError] consulting_report.md:"));
    }

    #[test]
    fn test_codes_match_serialized_kinds() {
        let kinds = [
            FindingKind::Parity,
            FindingKind::Rounding,
            FindingKind::ToleranceExceeded,
            FindingKind::NegativeCategory,
            FindingKind::ChartReference,
            FindingKind::MissingProvenance,
            FindingKind::ProvenanceMismatch,
            FindingKind::InvalidNumber,
            FindingKind::KpiNotMentioned,
            FindingKind::CategoryNotMentioned,
            FindingKind::MissingTotal,
            FindingKind::ChartNotCited,
            FindingKind::DuplicateCategory,
        ];
        for kind in kinds {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.code());
        }
    }

    #[test]
    fn test_report_passes_with_only_warnings() {
        let report = ValidationReport::new(vec![Finding::new(
            Check::KpiParity,
            Severity::Warning,
            FindingKind::KpiNotMentioned,
            "ltv_mean",
            "KPI 'ltv_mean' is not mentioned",
        )]);
        assert!(report.passed());
        assert_eq!(report.warnings().count(), 1);
        assert!(report.render_text().contains("Validation passed (1 warnings)"));
    }

    #[test]
    fn test_report_json() {
        let report = ValidationReport::new(vec![Finding::from_error(
            Check::ChartReferences,
            FindingKind::ChartReference,
            "charts/revenue_trend.png",
            FactoryError::ChartReference {
                path: PathBuf::from("charts/revenue_trend.png"),
            },
        )]);
        assert!(!report.passed());

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["passed"], false);
        assert_eq!(json["errors"], 1);
        assert_eq!(json["findings"][0]["kind"], "ChartReferenceError");
        assert_eq!(json["findings"][0]["check"], "chart_references");
        assert_eq!(json["findings"][0]["severity"], "error");
    }
}
