//! Data models for the report factory.
//!
//! This module contains the summary model produced by the analysis step
//! and consumed read-only by the renderer and the validator.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

/// A labelled aggregate (e.g. revenue per product category).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Display label of the category.
    pub label: String,
    /// Aggregate value for the category.
    pub value: f64,
}

impl Category {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Mandatory provenance fields, in footer order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceField {
    Timestamp,
    DatasetHash,
    GitCommit,
    Model,
    TokensIn,
    TokensOut,
}

impl ProvenanceField {
    /// All fields in the fixed footer order.
    pub const ALL: [ProvenanceField; 6] = [
        ProvenanceField::Timestamp,
        ProvenanceField::DatasetHash,
        ProvenanceField::GitCommit,
        ProvenanceField::Model,
        ProvenanceField::TokensIn,
        ProvenanceField::TokensOut,
    ];

    /// Key used in the JSON summary and in the artifact footer.
    pub fn key(&self) -> &'static str {
        match self {
            ProvenanceField::Timestamp => "timestamp",
            ProvenanceField::DatasetHash => "dataset_hash",
            ProvenanceField::GitCommit => "git_commit",
            ProvenanceField::Model => "model",
            ProvenanceField::TokensIn => "tokens_in",
            ProvenanceField::TokensOut => "tokens_out",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }
}

impl fmt::Display for ProvenanceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Reproducibility metadata for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// RFC 3339 timestamp of the run.
    #[serde(default, alias = "run_timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// SHA-256 digest of the input dataset.
    #[serde(default, alias = "dataset_sha256", skip_serializing_if = "Option::is_none")]
    pub dataset_hash: Option<String>,
    /// Source-control revision of the pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    /// LLM model name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Input token count reported by the LLM layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_in: Option<u64>,
    /// Output token count reported by the LLM layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_out: Option<u64>,
}

impl Provenance {
    /// Returns the value of a field as it appears in artifacts.
    ///
    /// Empty and whitespace-only strings count as unset.
    pub fn get(&self, field: ProvenanceField) -> Option<String> {
        let value = match field {
            ProvenanceField::Timestamp => self.timestamp.clone(),
            ProvenanceField::DatasetHash => self.dataset_hash.clone(),
            ProvenanceField::GitCommit => self.git_commit.clone(),
            ProvenanceField::Model => self.model.clone(),
            ProvenanceField::TokensIn => self.tokens_in.map(|n| n.to_string()),
            ProvenanceField::TokensOut => self.tokens_out.map(|n| n.to_string()),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    /// Fields that are unset, in footer order.
    pub fn missing(&self) -> Vec<ProvenanceField> {
        ProvenanceField::ALL
            .into_iter()
            .filter(|f| self.get(*f).is_none())
            .collect()
    }

    /// Fills unset fields from `other`, keeping values already present.
    ///
    /// Blank strings count as unset on both sides.
    pub fn or(self, other: Provenance) -> Provenance {
        Provenance {
            timestamp: present(self.timestamp).or(present(other.timestamp)),
            dataset_hash: present(self.dataset_hash).or(present(other.dataset_hash)),
            git_commit: present(self.git_commit).or(present(other.git_commit)),
            model: present(self.model).or(present(other.model)),
            tokens_in: self.tokens_in.or(other.tokens_in),
            tokens_out: self.tokens_out.or(other.tokens_out),
        }
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// The analysis result that every artifact is derived from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryModel {
    /// Named scalar metrics.
    #[serde(default)]
    pub kpis: BTreeMap<String, f64>,
    /// Ordered category aggregates.
    #[serde(default)]
    pub categories: Vec<Category>,
    /// Chart files (relative paths) artifacts may cite.
    #[serde(default)]
    pub charts: Vec<String>,
    /// Run metadata.
    #[serde(default)]
    pub provenance: Provenance,
}

impl SummaryModel {
    /// Load a summary from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Serialize as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Returns a copy carrying the given provenance.
    pub fn with_provenance(&self, provenance: Provenance) -> Self {
        Self {
            provenance,
            ..self.clone()
        }
    }

    pub fn kpi(&self, name: &str) -> Option<f64> {
        self.kpis.get(name).copied()
    }

    pub fn category(&self, label: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.label == label)
    }

    /// Labels that occur more than once, in first-occurrence order.
    pub fn duplicate_categories(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        let mut duplicates = Vec::new();
        for category in &self.categories {
            let label = category.label.as_str();
            if !seen.insert(label) && !duplicates.contains(&label) {
                duplicates.push(label);
            }
        }
        duplicates
    }

    /// Sum over all category values.
    pub fn category_sum(&self) -> f64 {
        self.categories.iter().map(|c| c.value).sum()
    }
}

/// Turns a metric key into a display label (`total_revenue` -> `Total Revenue`).
pub fn humanize(key: &str) -> String {
    key.split(['_', '-'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_summary_json() {
        let json = r#"{
            "kpis": {"total_revenue": 125430.456, "churn_rate": 0.2},
            "categories": [{"label": "A", "value": 100.0}, {"label": "B", "value": 200.0}],
            "charts": ["charts/revenue_trend.png"],
            "provenance": {"run_timestamp": "2024-05-01T00:00:00Z", "git_commit": "abc123", "tokens_in": 10}
        }"#;

        let summary: SummaryModel = serde_json::from_str(json).unwrap();
        assert_eq!(summary.kpi("total_revenue"), Some(125430.456));
        assert_eq!(summary.category("B").map(|c| c.value), Some(200.0));
        assert_eq!(summary.category_sum(), 300.0);
        assert_eq!(
            summary.provenance.timestamp.as_deref(),
            Some("2024-05-01T00:00:00Z")
        );
        assert_eq!(
            summary.provenance.missing(),
            vec![
                ProvenanceField::DatasetHash,
                ProvenanceField::Model,
                ProvenanceField::TokensOut
            ]
        );
    }

    #[test]
    fn test_empty_strings_count_as_missing() {
        let provenance = Provenance {
            model: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(provenance.get(ProvenanceField::Model), None);
    }

    #[test]
    fn test_provenance_or_keeps_existing_values() {
        let base = Provenance {
            model: Some("claude-3-haiku".to_string()),
            ..Default::default()
        };
        let merged = base.or(Provenance {
            model: Some("other".to_string()),
            tokens_in: Some(5),
            ..Default::default()
        });
        assert_eq!(merged.model.as_deref(), Some("claude-3-haiku"));
        assert_eq!(merged.tokens_in, Some(5));
    }

    #[test]
    fn test_provenance_or_fills_blank_values() {
        let flags = Provenance {
            git_commit: Some(String::new()),
            model: Some("  ".to_string()),
            ..Default::default()
        };
        let merged = flags.or(Provenance {
            git_commit: Some("abc123".to_string()),
            ..Default::default()
        });
        assert_eq!(merged.git_commit.as_deref(), Some("abc123"));
        assert_eq!(merged.model, None);
        assert_eq!(
            merged.missing(),
            vec![
                ProvenanceField::Timestamp,
                ProvenanceField::DatasetHash,
                ProvenanceField::Model,
                ProvenanceField::TokensIn,
                ProvenanceField::TokensOut
            ]
        );
    }

    #[test]
    fn test_duplicate_categories() {
        let summary = SummaryModel {
            categories: vec![
                Category::new("A", 100.0),
                Category::new("B", 50.0),
                Category::new("A", 50.0),
                Category::new("A", 1.0),
            ],
            ..Default::default()
        };
        assert_eq!(summary.duplicate_categories(), vec!["A"]);
        assert!(SummaryModel::default().duplicate_categories().is_empty());
    }

    #[test]
    fn test_field_keys_round_trip() {
        for field in ProvenanceField::ALL {
            assert_eq!(ProvenanceField::from_key(field.key()), Some(field));
        }
        assert_eq!(ProvenanceField::from_key("commit"), None);
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize("total_revenue"), "Total Revenue");
        assert_eq!(humanize("ltv_mean"), "Ltv Mean");
        assert_eq!(humanize("churn"), "Churn");
    }
}
