//! CSV analysis producing a [`SummaryModel`].
//!
//! Reads the orders and customers tables from an input directory and
//! computes the headline KPIs and the per-category breakdown.

pub mod aggregator;

use crate::config::AnalysisConfig;
use crate::error::{FactoryError, Result};
use crate::models::{Provenance, SummaryModel};
use crate::provenance::{dataset_sha256, git_commit, now_timestamp};
use crate::scanner::{DatasetScanner, ScanConfig, ScannedFile};
use aggregator::{column_stats, group_totals, parse_flag, parse_number, rate};
use csv::StringRecord;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A loaded CSV table.
struct Table {
    name: String,
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

impl Table {
    fn load(file: &ScannedFile) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_path(&file.path)?;
        let headers = reader.headers()?.clone();
        let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
        debug!("Loaded {} rows from {}", rows.len(), file.name);
        Ok(Self {
            name: file.name.clone(),
            headers,
            rows,
        })
    }

    fn column(&self, name: &str) -> Option<usize> {
        let index = self.headers.iter().position(|h| h == name);
        if index.is_none() {
            warn!("Column '{}' not found in {}", name, self.name);
        }
        index
    }

    fn cells(&self, index: usize) -> impl Iterator<Item = &str> {
        self.rows.iter().map(move |row| row.get(index).unwrap_or(""))
    }
}

/// Computes summaries from a directory of CSV files.
pub struct Analyzer<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> Analyzer<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Analyze every CSV in `input_dir`.
    ///
    /// `charts` are recorded as-is; chart rendering happens elsewhere.
    pub fn summarize(&self, input_dir: &Path, charts: &[String]) -> Result<SummaryModel> {
        let files = DatasetScanner::new(input_dir.to_path_buf(), ScanConfig::default()).scan();
        if files.is_empty() {
            return Err(FactoryError::NoInputData(input_dir.to_path_buf()));
        }
        let bytes: u64 = files.iter().map(|f| f.size).sum();
        info!(
            "Analyzing {} CSV files ({} bytes) in {}",
            files.len(),
            bytes,
            input_dir.display()
        );

        let mut summary = SummaryModel {
            charts: charts.to_vec(),
            ..Default::default()
        };

        match find(&files, &self.config.orders_file) {
            Some(file) => self.orders(&Table::load(file)?, &mut summary),
            None => warn!("No {} in {}", self.config.orders_file, input_dir.display()),
        }
        match find(&files, &self.config.customers_file) {
            Some(file) => self.customers(&Table::load(file)?, &mut summary.kpis),
            None => warn!("No {} in {}", self.config.customers_file, input_dir.display()),
        }

        let paths: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();
        summary.provenance = Provenance {
            timestamp: Some(now_timestamp()),
            dataset_hash: Some(dataset_sha256(&paths)?),
            git_commit: git_commit(input_dir),
            ..Default::default()
        };

        info!(
            "Computed {} KPIs and {} categories",
            summary.kpis.len(),
            summary.categories.len()
        );
        Ok(summary)
    }

    fn orders(&self, table: &Table, summary: &mut SummaryModel) {
        let Some(amount) = table.column(&self.config.amount_column) else {
            return;
        };

        let amounts: Vec<f64> = table.cells(amount).filter_map(parse_number).collect();
        if let Some(stats) = column_stats(&amounts) {
            summary.kpis.insert("total_revenue".to_string(), stats.total);
            summary.kpis.insert("average_order_value".to_string(), stats.mean);
            summary.kpis.insert("median_order_value".to_string(), stats.median);
        }
        summary
            .kpis
            .insert("order_count".to_string(), table.rows.len() as f64);

        let Some(category) = table.column(&self.config.category_column) else {
            return;
        };
        let rows: Vec<(String, f64)> = table
            .rows
            .iter()
            .filter_map(|row| {
                let label = row.get(category)?.trim();
                if label.is_empty() {
                    return None;
                }
                let value = parse_number(row.get(amount)?)?;
                Some((label.to_string(), value))
            })
            .collect();

        summary.categories = group_totals(&rows, self.config.top_categories);
        summary
            .kpis
            .insert("category_total".to_string(), summary.category_sum());
    }

    fn customers(&self, table: &Table, kpis: &mut BTreeMap<String, f64>) {
        kpis.insert("customer_count".to_string(), table.rows.len() as f64);

        if let Some(churn) = table.column(&self.config.churn_column) {
            let flags: Vec<bool> = table.cells(churn).filter_map(parse_flag).collect();
            if let Some(churn_rate) = rate(&flags) {
                kpis.insert("churn_rate".to_string(), churn_rate);
            }
        }

        if let Some(ltv) = table.column(&self.config.ltv_column) {
            let values: Vec<f64> = table.cells(ltv).filter_map(parse_number).collect();
            if let Some(stats) = column_stats(&values) {
                kpis.insert("ltv_mean".to_string(), stats.mean);
            }
        }
    }
}

fn find<'f>(files: &'f [ScannedFile], name: &str) -> Option<&'f ScannedFile> {
    files.iter().find(|f| f.name.eq_ignore_ascii_case(name))
}
