//! Canonical number formatting.
//!
//! Every number that reaches a human-facing artifact is produced by
//! [`RoundingPolicy::format`]. The validator calls the same policy to
//! recompute the expected strings, so the two can never drift apart.

use crate::config::RoundingConfig;
use crate::error::{FactoryError, Result};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Semantic category of a metric, which decides its rounding rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Currency,
    Percentage,
    Count,
    Ratio,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Currency => write!(f, "currency"),
            MetricKind::Percentage => write!(f, "percentage"),
            MetricKind::Count => write!(f, "count"),
            MetricKind::Ratio => write!(f, "ratio"),
        }
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "currency" | "money" => Ok(MetricKind::Currency),
            "percentage" | "percent" | "pct" => Ok(MetricKind::Percentage),
            "count" | "integer" | "int" => Ok(MetricKind::Count),
            "ratio" => Ok(MetricKind::Ratio),
            other => Err(format!("unknown metric kind '{}'", other)),
        }
    }
}

/// A canonically formatted number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formatted {
    pub kind: MetricKind,
    /// Rounded value (percentages already scaled).
    pub value: Decimal,
    /// Numeric token as it appears in text, without currency symbol.
    pub token: String,
    /// Full display string.
    pub display: String,
}

/// Outcome of comparing a rendered token with its canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenMatch {
    /// Token is exactly the canonical string.
    Exact,
    /// Same underlying value, formatted or rounded by another rule.
    DifferentRule,
    /// Token represents a different value.
    DifferentValue,
}

/// Strategies a foreign formatter might have used instead of half-up.
const ALTERNATE_STRATEGIES: [RoundingStrategy; 5] = [
    RoundingStrategy::MidpointAwayFromZero,
    RoundingStrategy::MidpointNearestEven,
    RoundingStrategy::MidpointTowardZero,
    RoundingStrategy::ToZero,
    RoundingStrategy::AwayFromZero,
];

/// Rounding rules per metric kind plus the metric-name mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundingPolicy {
    currency_places: u32,
    percent_places: u32,
    ratio_places: u32,
    currency_symbol: String,
    thousands_separator: bool,
    percent_from_fraction: bool,
    category_kind: MetricKind,
    kinds: BTreeMap<String, MetricKind>,
}

impl Default for RoundingPolicy {
    fn default() -> Self {
        Self::from(&RoundingConfig::default())
    }
}

impl From<&RoundingConfig> for RoundingPolicy {
    fn from(config: &RoundingConfig) -> Self {
        let mut kinds = BTreeMap::new();
        for (metric, kind) in &config.kinds {
            match kind.parse::<MetricKind>() {
                Ok(kind) => {
                    kinds.insert(metric.clone(), kind);
                }
                Err(e) => warn!("Ignoring rounding rule for '{}': {}", metric, e),
            }
        }

        let category_kind = config.category_kind.parse().unwrap_or_else(|e| {
            warn!("Invalid category_kind, falling back to currency: {}", e);
            MetricKind::Currency
        });

        Self {
            currency_places: config.currency_places,
            percent_places: config.percent_places,
            ratio_places: config.ratio_places,
            currency_symbol: config.currency_symbol.clone(),
            thousands_separator: config.thousands_separator,
            percent_from_fraction: config.percent_from_fraction,
            category_kind,
            kinds,
        }
    }
}

impl RoundingPolicy {
    /// Decimal places for a kind.
    pub fn places(&self, kind: MetricKind) -> u32 {
        match kind {
            MetricKind::Currency => self.currency_places,
            MetricKind::Percentage => self.percent_places,
            MetricKind::Count => 0,
            MetricKind::Ratio => self.ratio_places,
        }
    }

    /// Kind used for category values.
    pub fn category_kind(&self) -> MetricKind {
        self.category_kind
    }

    /// Kind of a named metric: configured mapping first, then name heuristics.
    pub fn kind_of(&self, metric: &str) -> MetricKind {
        if let Some(kind) = self.kinds.get(metric) {
            return *kind;
        }

        let name = metric.to_lowercase();
        if ["rate", "pct", "percent", "share"]
            .iter()
            .any(|marker| name.contains(marker))
        {
            MetricKind::Percentage
        } else if name.contains("ratio") {
            MetricKind::Ratio
        } else if name.contains("count")
            || name.starts_with("num_")
            || name.ends_with("orders")
            || name.ends_with("customers")
        {
            MetricKind::Count
        } else {
            MetricKind::Currency
        }
    }

    /// Format a named metric using its kind.
    pub fn format_metric(&self, metric: &str, value: f64) -> Result<Formatted> {
        self.format_as(metric, self.kind_of(metric), value)
    }

    /// Format a value of the given kind.
    pub fn format(&self, kind: MetricKind, value: f64) -> Result<Formatted> {
        self.format_as(&kind.to_string(), kind, value)
    }

    fn format_as(&self, subject: &str, kind: MetricKind, value: f64) -> Result<Formatted> {
        let scaled = self.scaled(subject, kind, value)?;
        let places = self.places(kind);

        let mut rounded = scaled.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
        if rounded.is_zero() {
            rounded.set_sign_positive(true);
        }
        rounded.rescale(places);

        let digits = self.group(&rounded.abs().to_string());
        let sign = if rounded.is_sign_negative() { "-" } else { "" };
        let suffix = if kind == MetricKind::Percentage { "%" } else { "" };
        let symbol = if kind == MetricKind::Currency {
            self.currency_symbol.as_str()
        } else {
            ""
        };

        Ok(Formatted {
            kind,
            value: rounded,
            token: format!("{}{}{}", sign, digits, suffix),
            display: format!("{}{}{}{}", sign, symbol, digits, suffix),
        })
    }

    /// Compare a token found in an artifact with the canonical rendering of `raw`.
    pub fn classify(&self, kind: MetricKind, raw: f64, token: &str) -> Result<TokenMatch> {
        let canonical = self.format(kind, raw)?;
        if token == canonical.token {
            return Ok(TokenMatch::Exact);
        }

        let cleaned: String = token
            .trim()
            .trim_end_matches('%')
            .chars()
            .filter(|c| *c != ',')
            .collect();
        let parsed = match Decimal::from_str(&cleaned) {
            Ok(parsed) => parsed,
            Err(_) => return Ok(TokenMatch::DifferentValue),
        };

        if parsed == canonical.value {
            return Ok(TokenMatch::DifferentRule);
        }

        let token_places = cleaned
            .split_once('.')
            .map(|(_, frac)| frac.len() as u32)
            .unwrap_or(0);
        let scaled = self.scaled(&kind.to_string(), kind, raw)?;
        let same_value_other_rule = ALTERNATE_STRATEGIES
            .iter()
            .any(|strategy| scaled.round_dp_with_strategy(token_places, *strategy) == parsed);

        Ok(if same_value_other_rule {
            TokenMatch::DifferentRule
        } else {
            TokenMatch::DifferentValue
        })
    }

    /// Exact decimal for `value`, scaled to percent when configured.
    fn scaled(&self, subject: &str, kind: MetricKind, value: f64) -> Result<Decimal> {
        let invalid = || FactoryError::InvalidNumber {
            subject: subject.to_string(),
            value,
        };

        let decimal = to_decimal(value).ok_or_else(invalid)?;
        if kind == MetricKind::Percentage && self.percent_from_fraction {
            decimal.checked_mul(Decimal::ONE_HUNDRED).ok_or_else(invalid)
        } else {
            Ok(decimal)
        }
    }

    /// Insert thousands separators into an unsigned decimal string.
    fn group(&self, digits: &str) -> String {
        if !self.thousands_separator {
            return digits.to_string();
        }

        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (digits, None),
        };

        let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
        for (i, ch) in int_part.chars().enumerate() {
            if i > 0 && (int_part.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        match frac_part {
            Some(frac) => format!("{}.{}", grouped, frac),
            None => grouped,
        }
    }
}

/// Shortest decimal representation of a finite f64.
///
/// Going through the display string keeps `0.125` as exactly `0.125`,
/// which is what half-up rounding must see.
fn to_decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&value.to_string())
        .ok()
        .or_else(|| Decimal::from_f64(value))
}
