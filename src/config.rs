//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.autofactory.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = ".autofactory.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Number formatting policy.
    #[serde(default)]
    pub rounding: RoundingConfig,

    /// Validation tolerances.
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Provenance requirements.
    #[serde(default)]
    pub provenance: ProvenanceConfig,

    /// Report rendering settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// CSV analysis settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output directory for rendered artifacts.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("reports")
}

/// Rounding and display rules, one per metric kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundingConfig {
    /// Decimal places for currency values.
    #[serde(default = "default_two")]
    pub currency_places: u32,

    /// Decimal places for percentages.
    #[serde(default = "default_one")]
    pub percent_places: u32,

    /// Decimal places for ratios.
    #[serde(default = "default_two")]
    pub ratio_places: u32,

    /// Symbol prefixed to currency values (empty for none).
    #[serde(default)]
    pub currency_symbol: String,

    /// Group integer digits with commas.
    #[serde(default)]
    pub thousands_separator: bool,

    /// Percentages are stored as fractions and multiplied by 100 for display.
    #[serde(default = "default_true")]
    pub percent_from_fraction: bool,

    /// Kind used for category values.
    #[serde(default = "default_category_kind")]
    pub category_kind: String,

    /// Explicit metric-name to kind mapping (`currency`, `percentage`, `count`, `ratio`).
    #[serde(default = "default_kinds")]
    pub kinds: BTreeMap<String, String>,
}

impl Default for RoundingConfig {
    fn default() -> Self {
        Self {
            currency_places: default_two(),
            percent_places: default_one(),
            ratio_places: default_two(),
            currency_symbol: String::new(),
            thousands_separator: false,
            percent_from_fraction: true,
            category_kind: default_category_kind(),
            kinds: default_kinds(),
        }
    }
}

fn default_one() -> u32 {
    1
}

fn default_two() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

fn default_category_kind() -> String {
    "currency".to_string()
}

fn default_kinds() -> BTreeMap<String, String> {
    [
        ("total_revenue", "currency"),
        ("average_order_value", "currency"),
        ("median_order_value", "currency"),
        ("category_total", "currency"),
        ("ltv_mean", "currency"),
        ("churn_rate", "percentage"),
        ("order_count", "count"),
        ("customer_count", "count"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Validation tolerances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Absolute tolerance for the category-sum check.
    #[serde(default = "default_abs_tolerance")]
    pub abs_tolerance: f64,

    /// Relative tolerance for the category-sum check.
    #[serde(default = "default_rel_tolerance")]
    pub rel_tolerance: f64,

    /// KPI the category sum is checked against.
    #[serde(default = "default_total_kpi")]
    pub total_kpi: String,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            abs_tolerance: default_abs_tolerance(),
            rel_tolerance: default_rel_tolerance(),
            total_kpi: default_total_kpi(),
        }
    }
}

fn default_abs_tolerance() -> f64 {
    0.01
}

fn default_rel_tolerance() -> f64 {
    0.001
}

fn default_total_kpi() -> String {
    "category_total".to_string()
}

impl ValidationConfig {
    /// Allowed drift for a given total: the larger of the absolute and relative bounds.
    pub fn tolerance_for(&self, total: f64) -> f64 {
        self.abs_tolerance.max(self.rel_tolerance * total.abs())
    }
}

/// Provenance requirements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceConfig {
    /// Require every provenance field in every artifact.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ProvenanceConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Report rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Document title.
    #[serde(default = "default_title")]
    pub title: String,

    /// Directory with template overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<PathBuf>,

    /// Write the provenance-enriched summary next to the artifacts.
    #[serde(default = "default_true")]
    pub write_json: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            template_dir: None,
            write_json: true,
        }
    }
}

fn default_title() -> String {
    "Consulting Report".to_string()
}

/// CSV analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// File holding one row per order.
    #[serde(default = "default_orders_file")]
    pub orders_file: String,

    /// Order amount column.
    #[serde(default = "default_amount_column")]
    pub amount_column: String,

    /// Order category column.
    #[serde(default = "default_category_column")]
    pub category_column: String,

    /// File holding one row per customer.
    #[serde(default = "default_customers_file")]
    pub customers_file: String,

    /// Churn flag column.
    #[serde(default = "default_churn_column")]
    pub churn_column: String,

    /// Lifetime value column.
    #[serde(default = "default_ltv_column")]
    pub ltv_column: String,

    /// Keep only the N largest categories (0 keeps all).
    #[serde(default)]
    pub top_categories: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            orders_file: default_orders_file(),
            amount_column: default_amount_column(),
            category_column: default_category_column(),
            customers_file: default_customers_file(),
            churn_column: default_churn_column(),
            ltv_column: default_ltv_column(),
            top_categories: 0,
        }
    }
}

fn default_orders_file() -> String {
    "orders.csv".to_string()
}

fn default_amount_column() -> String {
    "total_amount".to_string()
}

fn default_category_column() -> String {
    "product_category".to_string()
}

fn default_customers_file() -> String {
    "customers.csv".to_string()
}

fn default_churn_column() -> String {
    "is_churned".to_string()
}

fn default_ltv_column() -> String {
    "lifetime_value".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if args.no_provenance {
            self.provenance.enabled = false;
        }
        if let Some(ref dir) = args.template_dir {
            self.report.template_dir = Some(dir.clone());
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.rounding.currency_places, 2);
        assert_eq!(config.rounding.percent_places, 1);
        assert_eq!(config.validation.total_kpi, "category_total");
        assert!(config.provenance.enabled);
        assert_eq!(
            config.rounding.kinds.get("churn_rate").map(String::as_str),
            Some("percentage")
        );
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output_dir = "out"

[rounding]
currency_symbol = "$"
thousands_separator = true

[rounding.kinds]
gross_margin = "ratio"

[validation]
abs_tolerance = 0.5
total_kpi = "total_revenue"

[provenance]
enabled = false
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output_dir, PathBuf::from("out"));
        assert_eq!(config.rounding.currency_symbol, "$");
        assert!(config.rounding.thousands_separator);
        assert_eq!(config.rounding.currency_places, 2);
        assert_eq!(
            config.rounding.kinds.get("gross_margin").map(String::as_str),
            Some("ratio")
        );
        assert_eq!(config.validation.abs_tolerance, 0.5);
        assert_eq!(config.validation.rel_tolerance, 0.001);
        assert_eq!(config.validation.total_kpi, "total_revenue");
        assert!(!config.provenance.enabled);
    }

    #[test]
    fn test_tolerance_for() {
        let validation = ValidationConfig::default();
        assert_eq!(validation.tolerance_for(1.0), 0.01);
        assert!((validation.tolerance_for(300.0) - 0.3).abs() < 1e-12);
        assert!((validation.tolerance_for(-300.0) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[rounding]"));
        assert!(toml_str.contains("[validation]"));
        assert!(!toml_str.contains("verbose"));
        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.analysis.amount_column, "total_amount");
    }
}
