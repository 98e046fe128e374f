//! Placeholder substitution for artifact templates.
//!
//! Templates are plain Markdown with `{{name}}` or `{{name:argument}}`
//! placeholders. The engine only parses; resolving a placeholder to text
//! is left to the caller so every number goes through the rounding policy.

use crate::error::{FactoryError, Result};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{\{\s*([a-z_]+)\s*(?::\s*([^}]*?))?\s*\}\}").expect("valid placeholder regex");
}

/// A placeholder recognised in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    Title,
    /// A single KPI value by name.
    Kpi(String),
    /// A single category value by label.
    Category(String),
    KpiTable,
    KpiBullets,
    CategoryTable,
    CategoryBullets,
    Charts,
    Provenance,
}

impl Placeholder {
    fn parse(name: &str, argument: Option<&str>) -> Result<Self> {
        let needs_arg = |arg: Option<&str>| {
            arg.filter(|a| !a.is_empty())
                .map(str::to_string)
                .ok_or_else(|| FactoryError::Template(format!("'{{{{{}}}}}' needs an argument", name)))
        };

        match name {
            "title" => Ok(Placeholder::Title),
            "kpi" => Ok(Placeholder::Kpi(needs_arg(argument)?)),
            "category" => Ok(Placeholder::Category(needs_arg(argument)?)),
            "kpi_table" => Ok(Placeholder::KpiTable),
            "kpi_bullets" => Ok(Placeholder::KpiBullets),
            "category_table" => Ok(Placeholder::CategoryTable),
            "category_bullets" => Ok(Placeholder::CategoryBullets),
            "charts" => Ok(Placeholder::Charts),
            "provenance" => Ok(Placeholder::Provenance),
            other => Err(FactoryError::Template(format!(
                "unknown placeholder '{}'",
                other
            ))),
        }
    }
}

/// All placeholders of a template, in order of appearance.
pub fn placeholders(source: &str) -> Result<Vec<Placeholder>> {
    PLACEHOLDER
        .captures_iter(source)
        .map(|caps| Placeholder::parse(&caps[1], caps.get(2).map(|m| m.as_str())))
        .collect()
}

/// Replace every placeholder with the text produced by `resolve`.
///
/// Stops at the first placeholder that fails to resolve.
pub fn substitute<F>(source: &str, mut resolve: F) -> Result<String>
where
    F: FnMut(&Placeholder) -> Result<String>,
{
    let mut output = String::with_capacity(source.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(source) {
        let Some(whole) = caps.get(0) else { continue };
        let placeholder = Placeholder::parse(&caps[1], caps.get(2).map(|m| m.as_str()))?;

        output.push_str(&source[last..whole.start()]);
        output.push_str(&resolve(&placeholder)?);
        last = whole.end();
    }
    output.push_str(&source[last..]);

    Ok(output)
}
