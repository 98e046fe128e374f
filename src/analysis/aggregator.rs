//! Descriptive statistics over parsed columns.
//!
//! Pure functions over already-cleaned values; CSV reading lives in the
//! parent module.

use crate::models::Category;
use std::collections::HashMap;

/// Sum, mean and median of a numeric column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub count: usize,
    pub total: f64,
    pub mean: f64,
    pub median: f64,
}

/// Compute statistics for a column. Returns `None` for an empty column.
pub fn column_stats(values: &[f64]) -> Option<ColumnStats> {
    if values.is_empty() {
        return None;
    }

    let total: f64 = values.iter().sum();
    Some(ColumnStats {
        count: values.len(),
        total,
        mean: total / values.len() as f64,
        median: median(values),
    })
}

/// Median, averaging the two middle values for an even count.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Sum values per label, largest first, ties broken by label.
///
/// `top_n` of 0 keeps every category.
pub fn group_totals(rows: &[(String, f64)], top_n: usize) -> Vec<Category> {
    let mut grouped: HashMap<&str, f64> = HashMap::new();
    for (label, value) in rows {
        *grouped.entry(label.as_str()).or_default() += value;
    }

    let mut categories: Vec<Category> = grouped
        .into_iter()
        .map(|(label, value)| Category::new(label, value))
        .collect();
    categories.sort_by(|a, b| {
        b.value
            .total_cmp(&a.value)
            .then_with(|| a.label.cmp(&b.label))
    });

    if top_n > 0 {
        categories.truncate(top_n);
    }
    categories
}

/// Interpret a churn flag cell.
pub fn parse_flag(cell: &str) -> Option<bool> {
    match cell.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "t" => Some(true),
        "false" | "0" | "no" | "n" | "f" => Some(false),
        _ => None,
    }
}

/// Interpret a numeric cell; blanks and non-numbers are skipped.
pub fn parse_number(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Share of `true` flags, as a fraction.
pub fn rate(flags: &[bool]) -> Option<f64> {
    if flags.is_empty() {
        return None;
    }
    let hits = flags.iter().filter(|f| **f).count();
    Some(hits as f64 / flags.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_stats() {
        let stats = column_stats(&[10.0, 30.0, 20.0, 40.0]).unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.total, 100.0);
        assert_eq!(stats.mean, 25.0);
        assert_eq!(stats.median, 25.0);
        assert!(column_stats(&[]).is_none());
    }

    #[test]
    fn test_median_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
    }

    #[test]
    fn test_group_totals() {
        let rows = vec![
            ("Home".to_string(), 50.0),
            ("Toys".to_string(), 20.0),
            ("Home".to_string(), 25.0),
            ("Books".to_string(), 20.0),
        ];
        let categories = group_totals(&rows, 0);
        assert_eq!(
            categories,
            vec![
                Category::new("Home", 75.0),
                Category::new("Books", 20.0),
                Category::new("Toys", 20.0),
            ]
        );

        let top = group_totals(&rows, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[1].label, "Books");
    }

    #[test]
    fn test_parse_cells() {
        assert_eq!(parse_flag("True"), Some(true));
        assert_eq!(parse_flag(" 0 "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
        assert_eq!(parse_number(" 12.5 "), Some(12.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn test_rate() {
        assert_eq!(rate(&[true, false, false, true]), Some(0.5));
        assert_eq!(rate(&[]), None);
    }
}
