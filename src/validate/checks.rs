//! The five consistency checks.
//!
//! Each check is a pure function over the shared, read-only inputs and
//! returns its own findings; none depends on another's outcome.

use super::findings::{Check, Finding, FindingKind, Severity};
use super::{Artifact, Inputs};
use crate::error::FactoryError;
use crate::models::{humanize, ProvenanceField};
use crate::provenance::{parse_block, strip_block};
use crate::rounding::{MetricKind, TokenMatch};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

lazy_static! {
    /// Markdown image or link target: `![alt](target)` / `[text](target "title")`.
    static ref LINK_TARGET: Regex =
        Regex::new(r#"!?\[[^\]]*\]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#).expect("valid link regex");
}

/// Up to three words, then a linking verb, all within one sentence.
const LINKED_BY_VERB: &str = r"(?:[^\w\n.!?]+[a-z][\w'-]*){0,3}?[^\w\n.!?]+(?:amounted\s+to|came\s+(?:in\s+at|to)|stood\s+at|totall?ed|totals|equall?ed|equals|reached|were|was|are|is)\b";
/// "... rate of 23.5%".
const LINKED_BY_OF: &str = r"[^\w\n.!?]+of\b";

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "svg", "gif", "webp"];

/// A numeric token found after a metric label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    /// 1-based line number.
    pub line: usize,
    pub token: String,
}

/// Artifact text with the provenance block, images and link targets
/// blanked out, so neither footer values nor chart names read as metric values.
fn scannable(text: &str) -> String {
    let stripped = strip_block(text);
    LINK_TARGET
        .replace_all(&stripped, |caps: &regex::Captures| {
            match (caps.get(0), caps.get(1)) {
                (Some(whole), _) if whole.as_str().starts_with('!') => " ".to_string(),
                (Some(whole), Some(target)) => {
                    let text = whole.as_str();
                    let start = target.start() - whole.start();
                    let end = target.end() - whole.start();
                    format!("{}{}", &text[..start], &text[end..])
                }
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Every place `key` (or its humanized label) is followed by a number on the same line.
///
/// Between label and number there may be markup, or up to three words
/// ending in a linking verb within the same sentence ("Total revenue for
/// the quarter was 125430.46", "churn rate of 23.5%"). A label that ends a
/// longer phrase ("Total Revenue" for the key `revenue`) does not count.
pub fn find_mentions(text: &str, key: &str) -> Vec<Mention> {
    let mut labels = vec![regex::escape(key)];
    let human = humanize(key);
    if !human.eq_ignore_ascii_case(key) && !human.is_empty() {
        labels.push(regex::escape(&human));
    }

    let pattern = format!(
        r"(?i)(?:{})(?:{}|{})?[^\w\n]*?(-?\d(?:[\d,]*\d)?(?:\.\d+)?%?)",
        labels.join("|"),
        LINKED_BY_VERB,
        LINKED_BY_OF
    );
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            debug!("Cannot build mention pattern for '{}': {}", key, e);
            return Vec::new();
        }
    };

    let mut mentions = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        for caps in re.captures_iter(line) {
            let Some(whole) = caps.get(0) else { continue };
            let before = line[..whole.start()].trim_end();
            let glued = line[..whole.start()]
                .chars()
                .next_back()
                .map_or(false, |c| c.is_alphanumeric() || c == '_');
            let tail_of_phrase = before
                .chars()
                .next_back()
                .map_or(false, |c| c.is_alphanumeric());
            if glued || tail_of_phrase {
                continue;
            }
            mentions.push(Mention {
                line: idx + 1,
                token: caps[1].to_string(),
            });
        }
    }
    mentions
}

/// A number the artifacts are expected to reproduce.
struct Tracked<'a> {
    subject: &'a str,
    what: &'static str,
    kind: MetricKind,
    raw: f64,
}

fn tracked<'a>(inputs: &'a Inputs<'a>) -> Vec<Tracked<'a>> {
    let policy = inputs.policy;
    let kpis = inputs.summary.kpis.iter().map(|(name, value)| Tracked {
        subject: name.as_str(),
        what: "KPI",
        kind: policy.kind_of(name),
        raw: *value,
    });
    let categories = inputs.summary.categories.iter().map(|c| Tracked {
        subject: c.label.as_str(),
        what: "category",
        kind: policy.category_kind(),
        raw: c.value,
    });
    kpis.chain(categories).collect()
}

/// Check 1: every mentioned KPI or category equals its canonical string's value.
pub(super) fn kpi_parity(inputs: &Inputs<'_>) -> Vec<Finding> {
    let mut findings = Vec::new();

    for item in tracked(inputs) {
        let canonical = match inputs.policy.format(item.kind, item.raw) {
            Ok(canonical) => canonical,
            Err(_) => {
                findings.push(Finding::from_error(
                    Check::KpiParity,
                    FindingKind::InvalidNumber,
                    item.subject,
                    FactoryError::InvalidNumber {
                        subject: item.subject.to_string(),
                        value: item.raw,
                    },
                ));
                continue;
            }
        };

        for artifact in inputs.artifacts {
            let mentions = find_mentions(&scannable(&artifact.text), item.subject);
            if mentions.is_empty() {
                let kind = if item.what == "KPI" {
                    FindingKind::KpiNotMentioned
                } else {
                    FindingKind::CategoryNotMentioned
                };
                findings.push(
                    Finding::new(
                        Check::KpiParity,
                        Severity::Warning,
                        kind,
                        item.subject,
                        format!("{} '{}' is not mentioned", item.what, item.subject),
                    )
                    .in_artifact(&artifact.path),
                );
                continue;
            }

            for mention in mentions {
                let verdict = inputs.policy.classify(item.kind, item.raw, &mention.token);
                if let Ok(TokenMatch::DifferentValue) = verdict {
                    findings.push(
                        Finding::from_error(
                            Check::KpiParity,
                            FindingKind::Parity,
                            item.subject,
                            FactoryError::Parity {
                                subject: format!("{} (line {})", item.subject, mention.line),
                                expected: canonical.token.clone(),
                                actual: mention.token.clone(),
                            },
                        )
                        .in_artifact(&artifact.path),
                    );
                }
            }
        }
    }

    findings
}

/// Check 5: no mentioned value was rounded or formatted by another rule.
pub(super) fn rounding_consistency(inputs: &Inputs<'_>) -> Vec<Finding> {
    let mut findings = Vec::new();

    for item in tracked(inputs) {
        let Ok(canonical) = inputs.policy.format(item.kind, item.raw) else {
            continue;
        };

        for artifact in inputs.artifacts {
            for mention in find_mentions(&scannable(&artifact.text), item.subject) {
                let verdict = inputs.policy.classify(item.kind, item.raw, &mention.token);
                if let Ok(TokenMatch::DifferentRule) = verdict {
                    findings.push(
                        Finding::new(
                            Check::RoundingConsistency,
                            Severity::Error,
                            FindingKind::Rounding,
                            item.subject,
                            format!(
                                "{} '{}' (line {}) is formatted as '{}' but the {} rule gives '{}'",
                                item.what,
                                item.subject,
                                mention.line,
                                mention.token,
                                item.kind,
                                canonical.token
                            ),
                        )
                        .in_artifact(&artifact.path)
                        .expected_actual(canonical.token.clone(), mention.token),
                    );
                }
            }
        }
    }

    findings
}

/// Check 2: categories are unique, non-negative and sum to the total KPI.
pub(super) fn category_totals(inputs: &Inputs<'_>) -> Vec<Finding> {
    let summary = inputs.summary;
    let config = inputs.config;
    let mut findings = Vec::new();

    if summary.categories.is_empty() {
        return findings;
    }

    for category in summary.categories.iter().filter(|c| c.value < 0.0) {
        findings.push(Finding::new(
            Check::CategoryTotals,
            Severity::Error,
            FindingKind::NegativeCategory,
            category.label.as_str(),
            format!(
                "category '{}' has negative value {}",
                category.label, category.value
            ),
        ));
    }

    for label in summary.duplicate_categories() {
        findings.push(Finding::from_error(
            Check::CategoryTotals,
            FindingKind::DuplicateCategory,
            label,
            FactoryError::DuplicateCategory {
                label: label.to_string(),
            },
        ));
    }

    let Some(total) = summary.kpi(&config.total_kpi) else {
        findings.push(Finding::new(
            Check::CategoryTotals,
            Severity::Warning,
            FindingKind::MissingTotal,
            config.total_kpi.as_str(),
            format!(
                "KPI '{}' is absent; category sum cannot be checked",
                config.total_kpi
            ),
        ));
        return findings;
    };

    let sum = summary.category_sum();
    let tolerance = config.tolerance_for(total);
    let drift = (sum - total).abs();
    if drift.is_nan() || drift > tolerance {
        findings.push(Finding::from_error(
            Check::CategoryTotals,
            FindingKind::ToleranceExceeded,
            config.total_kpi.as_str(),
            FactoryError::ToleranceExceeded {
                total_kpi: config.total_kpi.clone(),
                sum,
                total,
                tolerance,
            },
        ));
    }

    findings
}

/// Chart paths cited by an artifact.
pub fn cited_charts(text: &str) -> Vec<String> {
    let body = strip_block(text);
    LINK_TARGET
        .captures_iter(&body)
        .map(|caps| caps[1].to_string())
        .filter(|target| !target.contains("://") && !target.starts_with("data:"))
        .filter(|target| {
            Path::new(target)
                .extension()
                .and_then(|e| e.to_str())
                .map_or(false, |e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        })
        .collect()
}

fn resolve(base_dir: &Path, reference: &str) -> PathBuf {
    let path = Path::new(reference);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Check 3: every cited chart exists on disk.
pub(super) fn chart_references(inputs: &Inputs<'_>) -> Vec<Finding> {
    let mut findings = Vec::new();

    // path -> who cites it
    let mut citations: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for chart in &inputs.summary.charts {
        citations
            .entry(chart.clone())
            .or_default()
            .push(inputs.summary_path.to_path_buf());
    }

    let mut cited_by_artifacts = BTreeSet::new();
    for artifact in inputs.artifacts {
        for chart in cited_charts(&artifact.text) {
            cited_by_artifacts.insert(chart.clone());
            citations.entry(chart).or_default().push(artifact.path.clone());
        }
    }

    for (chart, sources) in &citations {
        let resolved = resolve(inputs.base_dir, chart);
        if !resolved.is_file() {
            let mut finding = Finding::from_error(
                Check::ChartReferences,
                FindingKind::ChartReference,
                chart.as_str(),
                FactoryError::ChartReference {
                    path: resolved.clone(),
                },
            );
            if let Some(first) = sources.first() {
                finding = finding.in_artifact(first);
            }
            findings.push(finding);
        }
    }

    if !inputs.artifacts.is_empty() {
        for chart in &inputs.summary.charts {
            if !cited_by_artifacts.contains(chart) {
                findings.push(Finding::new(
                    Check::ChartReferences,
                    Severity::Warning,
                    FindingKind::ChartNotCited,
                    chart.as_str(),
                    format!("chart '{}' is not cited by any artifact", chart),
                ));
            }
        }
    }

    findings
}

/// Check 4: provenance is complete everywhere and identical across artifacts.
pub(super) fn provenance(inputs: &Inputs<'_>) -> Vec<Finding> {
    let severity = if inputs.provenance_required {
        Severity::Error
    } else {
        Severity::Warning
    };
    let missing = |field: ProvenanceField, path: &Path| {
        Finding::from_error(
            Check::Provenance,
            FindingKind::MissingProvenance,
            field.key(),
            FactoryError::MissingProvenance {
                field: field.key().to_string(),
            },
        )
        .with_severity(severity)
        .in_artifact(path)
    };

    let mut findings = Vec::new();
    let json = &inputs.summary.provenance;

    for field in json.missing() {
        findings.push(missing(field, inputs.summary_path));
    }

    let blocks: Vec<(&Artifact, Option<BTreeMap<ProvenanceField, String>>)> = inputs
        .artifacts
        .iter()
        .map(|a| (a, parse_block(&a.text)))
        .collect();

    for field in ProvenanceField::ALL {
        // The JSON is the reference; without it, the first artifact that has the field.
        let mut reference: Option<(String, PathBuf)> = json
            .get(field)
            .map(|v| (v, inputs.summary_path.to_path_buf()));

        for (artifact, block) in &blocks {
            let Some(block) = block else { continue };
            let value = block.get(&field).map(|v| v.trim()).filter(|v| !v.is_empty());
            let Some(value) = value else {
                findings.push(missing(field, &artifact.path));
                continue;
            };

            if reference.is_none() {
                reference = Some((value.to_string(), artifact.path.clone()));
                continue;
            }
            if let Some((expected, source)) = &reference {
                if expected.as_str() != value {
                    findings.push(
                        Finding::new(
                            Check::Provenance,
                            severity,
                            FindingKind::ProvenanceMismatch,
                            field.key(),
                            format!(
                                "provenance field '{}' is '{}' but {} has '{}'",
                                field,
                                value,
                                source.display(),
                                expected
                            ),
                        )
                        .in_artifact(&artifact.path)
                        .expected_actual(expected.clone(), value),
                    );
                }
            }
        }
    }

    for (artifact, block) in &blocks {
        if block.is_none() {
            findings.push(
                Finding::new(
                    Check::Provenance,
                    severity,
                    FindingKind::MissingProvenance,
                    "provenance",
                    "MissingProvenanceError: artifact has no provenance block",
                )
                .in_artifact(&artifact.path),
            );
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_mentions_table_and_bullets() {
        let text = "| Total Revenue | 125430.46 |\n- **total_revenue:** 125,430.46\nTotal revenue grew strongly";
        let mentions = find_mentions(text, "total_revenue");
        assert_eq!(
            mentions,
            vec![
                Mention {
                    line: 1,
                    token: "125430.46".to_string()
                },
                Mention {
                    line: 2,
                    token: "125,430.46".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_find_mentions_ignores_longer_phrases() {
        let text = "| Total Revenue | 125430.46 |\n| Revenue | 99.00 |";
        let mentions = find_mentions(text, "revenue");
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].token, "99.00");
        assert_eq!(mentions[0].line, 2);
    }

    #[test]
    fn test_find_mentions_percent_and_negative() {
        let mentions = find_mentions("Churn rate: 23.5%", "churn_rate");
        assert_eq!(mentions[0].token, "23.5%");

        let mentions = find_mentions("- Net Income: -5.00, down", "net_income");
        assert_eq!(mentions[0].token, "-5.00");
    }

    #[test]
    fn test_trailing_comma_is_not_part_of_token() {
        let mentions = find_mentions("Order count 1,234, up from last year", "order_count");
        assert_eq!(mentions[0].token, "1,234");
    }

    #[test]
    fn test_find_mentions_in_prose() {
        let mentions = find_mentions("Total revenue was 125430.00 this quarter.", "total_revenue");
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].token, "125430.00");

        let mentions = find_mentions(
            "Total revenue for the quarter came in at 125,430.46.",
            "total_revenue",
        );
        assert_eq!(mentions[0].token, "125,430.46");

        let mentions = find_mentions("Churn rate stood at 23.5% in May.", "churn_rate");
        assert_eq!(mentions[0].token, "23.5%");

        let mentions = find_mentions("- Churn rate of 21% across regions.", "churn_rate");
        assert_eq!(mentions[0].token, "21%");
    }

    #[test]
    fn test_find_mentions_prose_stays_in_sentence() {
        assert!(find_mentions("Churn rate grew 5% year over year.", "churn_rate").is_empty());
        assert!(find_mentions("Churn rate is up 3 points.", "churn_rate").is_empty());
        assert!(find_mentions(
            "Churn rate matters. Our target was 10%.",
            "churn_rate"
        )
        .is_empty());
        assert!(find_mentions(
            "Churn rate in the largest two regions last year was 30%.",
            "churn_rate"
        )
        .is_empty());
    }

    #[test]
    fn test_scannable_blanks_link_targets() {
        let text = "![Churn Rate](charts/churn_rate-2024.png)\n";
        assert!(find_mentions(&scannable(text), "churn_rate").is_empty());
    }

    #[test]
    fn test_scannable_blanks_image_alt_text() {
        let text = "![Churn Rate 2024](charts/churn_rate_2024.png)\n\n[Order Count 12](notes.md)\n";
        let body = scannable(text);
        assert!(find_mentions(&body, "churn_rate").is_empty());
        assert_eq!(find_mentions(&body, "order_count")[0].token, "12");
    }

    #[test]
    fn test_cited_charts() {
        let text = "![Trend](charts/revenue_trend.png)\n[doc](https://example.com/a.png)\n[notes](notes.md)\n![Mix](<charts/mix.SVG> \"Mix\")";
        assert_eq!(
            cited_charts(text),
            vec!["charts/revenue_trend.png".to_string(), "charts/mix.SVG".to_string()]
        );
    }
}
