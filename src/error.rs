//! Error taxonomy for rendering, validation and analysis.
//!
//! Command handlers wrap these in `anyhow` with context; the library
//! functions return them directly so callers can match on the variant.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the report factory.
#[derive(Error, Debug)]
pub enum FactoryError {
    /// A template references a KPI or category absent from the summary.
    #[error("MissingDataError: template references unknown {kind} '{name}'")]
    MissingData { kind: &'static str, name: String },

    /// A mandatory provenance field is unset.
    #[error("MissingProvenanceError: provenance field '{field}' is missing")]
    MissingProvenance { field: String },

    /// A rendered number does not match its source of truth.
    #[error("ParityError: '{subject}' expected {expected}, found {actual}")]
    Parity {
        subject: String,
        expected: String,
        actual: String,
    },

    /// A cited chart does not exist on disk.
    #[error("ChartReferenceError: chart not found: {}", path.display())]
    ChartReference { path: PathBuf },

    /// Category sum drifted from the total KPI.
    #[error("ToleranceExceededError: category sum {sum} differs from {total_kpi} = {total} by more than {tolerance}")]
    ToleranceExceeded {
        total_kpi: String,
        sum: f64,
        total: f64,
        tolerance: f64,
    },

    /// The same category label occurs more than once in a summary.
    #[error("DuplicateCategoryError: category '{label}' appears more than once")]
    DuplicateCategory { label: String },

    /// A value cannot be represented as a finite decimal.
    #[error("Invalid number for '{subject}': {value}")]
    InvalidNumber { subject: String, value: f64 },

    /// Malformed template text.
    #[error("Template error: {0}")]
    Template(String),

    /// No usable input data was found.
    #[error("No CSV files found in {}", .0.display())]
    NoInputData(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, FactoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_in_messages() {
        let err = FactoryError::MissingData {
            kind: "KPI",
            name: "gross_margin".to_string(),
        };
        assert!(err.to_string().starts_with("MissingDataError"));
        assert!(err.to_string().contains("gross_margin"));

        let err = FactoryError::ChartReference {
            path: PathBuf::from("charts/revenue_trend.png"),
        };
        assert!(err.to_string().contains("charts/revenue_trend.png"));
    }
}
