//! Markdown artifact generation.
//!
//! The consulting report and the slide outline are two thin renderers over
//! one [`RenderContext`]: every KPI and category value reaches the page
//! through [`RenderContext::kpi`] or [`RenderContext::category`], which in
//! turn call the shared [`RoundingPolicy`].

use super::template::{self, Placeholder};
use crate::error::{FactoryError, Result};
use crate::models::{humanize, Provenance, SummaryModel};
use crate::provenance::render_block;
use crate::rounding::{Formatted, RoundingPolicy};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

const REPORT_TEMPLATE: &str = "# {{title}}

## Executive Summary

This report summarizes the key performance indicators computed from the
input dataset. Every figure below is produced by the shared rounding policy
and can be traced back to the analysis summary.

## Key Metrics

{{kpi_table}}
## Category Breakdown

{{category_table}}
## Charts

{{charts}}
---

{{provenance}}";

const SLIDES_TEMPLATE: &str = "# {{title}}: Slide Outline

## Slide: Headline Metrics

{{kpi_bullets}}
## Slide: Category Performance

{{category_bullets}}
## Slide: Visuals

{{charts}}
## Slide: Next Steps

- Validate the headline metrics with stakeholders.
- Prioritize initiatives for the leading categories.

{{provenance}}";

/// Artifact kinds the renderer can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Template {
    /// Consulting report.
    Report,
    /// Slide deck outline.
    Slides,
}

impl Template {
    pub const ALL: [Template; 2] = [Template::Report, Template::Slides];

    /// File name of the rendered artifact.
    pub fn file_name(&self) -> &'static str {
        match self {
            Template::Report => "consulting_report.md",
            Template::Slides => "slides_outline.md",
        }
    }

    /// File name of an override in a template directory.
    pub fn template_file(&self) -> &'static str {
        match self {
            Template::Report => "consulting_report.md.tmpl",
            Template::Slides => "slides_outline.md.tmpl",
        }
    }

    fn builtin(&self) -> &'static str {
        match self {
            Template::Report => REPORT_TEMPLATE,
            Template::Slides => SLIDES_TEMPLATE,
        }
    }
}

/// Read-only view over the summary shared by both renderers.
pub struct RenderContext<'a> {
    summary: &'a SummaryModel,
    provenance: &'a Provenance,
    policy: &'a RoundingPolicy,
    title: &'a str,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        summary: &'a SummaryModel,
        provenance: &'a Provenance,
        policy: &'a RoundingPolicy,
        title: &'a str,
    ) -> Self {
        Self {
            summary,
            provenance,
            policy,
            title,
        }
    }

    /// Canonical rendering of a KPI.
    pub fn kpi(&self, name: &str) -> Result<Formatted> {
        let value = self.summary.kpi(name).ok_or_else(|| FactoryError::MissingData {
            kind: "KPI",
            name: name.to_string(),
        })?;
        self.policy.format_metric(name, value)
    }

    /// Canonical rendering of a category value.
    pub fn category(&self, label: &str) -> Result<Formatted> {
        let category = self
            .summary
            .category(label)
            .ok_or_else(|| FactoryError::MissingData {
                kind: "category",
                name: label.to_string(),
            })?;
        self.category_value(category.value)
    }

    fn category_value(&self, value: f64) -> Result<Formatted> {
        self.policy.format(self.policy.category_kind(), value)
    }

    fn resolve(&self, placeholder: &Placeholder) -> Result<String> {
        match placeholder {
            Placeholder::Title => Ok(self.title.to_string()),
            Placeholder::Kpi(name) => Ok(self.kpi(name)?.display),
            Placeholder::Category(label) => Ok(self.category(label)?.display),
            Placeholder::KpiTable => self.kpi_table(),
            Placeholder::KpiBullets => self.kpi_bullets(),
            Placeholder::CategoryTable => self.category_table(),
            Placeholder::CategoryBullets => self.category_bullets(),
            Placeholder::Charts => Ok(self.charts_section()),
            Placeholder::Provenance => Ok(self.provenance_section()),
        }
    }

    fn kpi_table(&self) -> Result<String> {
        if self.summary.kpis.is_empty() {
            return Ok("_No KPIs were computed for this run._\n".to_string());
        }

        let mut table = String::new();
        table.push_str("| Metric | Value |\n");
        table.push_str("|:---|---:|\n");
        for name in self.summary.kpis.keys() {
            table.push_str(&format!("| {} | {} |\n", humanize(name), self.kpi(name)?.display));
        }
        Ok(table)
    }

    fn kpi_bullets(&self) -> Result<String> {
        if self.summary.kpis.is_empty() {
            return Ok("- No KPIs were computed for this run.\n".to_string());
        }

        let mut bullets = String::new();
        for name in self.summary.kpis.keys() {
            bullets.push_str(&format!(
                "- **{}:** {}\n",
                humanize(name),
                self.kpi(name)?.display
            ));
        }
        Ok(bullets)
    }

    fn category_table(&self) -> Result<String> {
        if self.summary.categories.is_empty() {
            return Ok("_No category breakdown is available._\n".to_string());
        }

        let mut table = String::new();
        table.push_str("| Category | Value |\n");
        table.push_str("|:---|---:|\n");
        for category in &self.summary.categories {
            table.push_str(&format!(
                "| {} | {} |\n",
                category.label,
                self.category_value(category.value)?.display
            ));
        }
        Ok(table)
    }

    fn category_bullets(&self) -> Result<String> {
        if self.summary.categories.is_empty() {
            return Ok("- No category breakdown is available.\n".to_string());
        }

        let mut bullets = String::new();
        for category in &self.summary.categories {
            bullets.push_str(&format!(
                "- {}: {}\n",
                category.label,
                self.category_value(category.value)?.display
            ));
        }
        Ok(bullets)
    }

    fn charts_section(&self) -> String {
        if self.summary.charts.is_empty() {
            return "_No charts were produced for this run._\n".to_string();
        }

        let mut section = String::new();
        for chart in &self.summary.charts {
            let title = Path::new(chart)
                .file_stem()
                .map(|s| humanize(&s.to_string_lossy()))
                .unwrap_or_else(|| chart.clone());
            section.push_str(&format!("![{}]({})\n\n", title, chart));
        }
        section
    }

    fn provenance_section(&self) -> String {
        format!("## Provenance\n\n{}", render_block(self.provenance))
    }
}

/// Renders summaries into Markdown artifacts.
pub struct ArtifactRenderer<'a> {
    policy: &'a RoundingPolicy,
    title: String,
    template_dir: Option<PathBuf>,
    require_provenance: bool,
}

impl<'a> ArtifactRenderer<'a> {
    pub fn new(policy: &'a RoundingPolicy, title: impl Into<String>) -> Self {
        Self {
            policy,
            title: title.into(),
            template_dir: None,
            require_provenance: true,
        }
    }

    /// Look for template overrides in `dir`.
    pub fn with_template_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.template_dir = dir;
        self
    }

    /// Whether every provenance field must be set before rendering.
    pub fn require_provenance(mut self, required: bool) -> Self {
        self.require_provenance = required;
        self
    }

    /// Template text for a kind: the override if present, else the built-in.
    pub fn template_source(&self, template: Template) -> Result<String> {
        if let Some(ref dir) = self.template_dir {
            let path = dir.join(template.template_file());
            if path.exists() {
                debug!("Using template override: {}", path.display());
                return Ok(std::fs::read_to_string(&path)?);
            }
        }
        Ok(template.builtin().to_string())
    }

    /// Render one artifact to a string.
    pub fn render(
        &self,
        summary: &SummaryModel,
        provenance: &Provenance,
        template: Template,
    ) -> Result<String> {
        let source = self.template_source(template)?;
        self.render_source(&source, summary, provenance)
    }

    /// Render arbitrary template text.
    ///
    /// The provenance block is appended when the template does not place it.
    pub fn render_source(
        &self,
        source: &str,
        summary: &SummaryModel,
        provenance: &Provenance,
    ) -> Result<String> {
        if self.require_provenance {
            let missing = provenance.missing();
            if !missing.is_empty() {
                return Err(FactoryError::MissingProvenance {
                    field: missing
                        .iter()
                        .map(|f| f.key())
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
        }

        if let Some(label) = summary.duplicate_categories().first() {
            return Err(FactoryError::DuplicateCategory {
                label: label.to_string(),
            });
        }

        let context = RenderContext::new(summary, provenance, self.policy, &self.title);
        let mut output = template::substitute(source, |p| context.resolve(p))?;

        let places_provenance = template::placeholders(source)?
            .contains(&Placeholder::Provenance);
        if !places_provenance {
            if !output.ends_with('\n') {
                output.push('\n');
            }
            output.push('\n');
            output.push_str(&context.provenance_section());
        }

        Ok(output)
    }

    /// Render an artifact and publish it into `output_dir`.
    ///
    /// Nothing is written unless rendering succeeds.
    pub fn publish(
        &self,
        summary: &SummaryModel,
        provenance: &Provenance,
        template: Template,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        let content = self.render(summary, provenance, template)?;
        let path = output_dir.join(template.file_name());
        write_atomic(&path, &content)?;
        info!("Wrote {}", path.display());
        Ok(path)
    }
}

/// Write `content` to `path` through a temporary file in the same directory.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut file = NamedTempFile::new_in(&dir)?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    file.persist(path).map_err(|e| e.error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use tempfile::TempDir;

    fn create_test_summary() -> SummaryModel {
        SummaryModel {
            kpis: [
                ("total_revenue".to_string(), 125430.456),
                ("churn_rate".to_string(), 0.2345),
                ("order_count".to_string(), 200.0),
                ("category_total".to_string(), 300.0),
            ]
            .into_iter()
            .collect(),
            categories: vec![Category::new("Electronics", 100.0), Category::new("Home", 200.0)],
            charts: vec!["charts/revenue_trend.png".to_string()],
            provenance: Provenance::default(),
        }
    }

    fn create_test_provenance() -> Provenance {
        Provenance {
            timestamp: Some("2024-05-01T12:00:00Z".to_string()),
            dataset_hash: Some("0f3a".to_string()),
            git_commit: Some("deadbeef".to_string()),
            model: Some("claude-3-haiku-20240307".to_string()),
            tokens_in: Some(1200),
            tokens_out: Some(340),
        }
    }

    #[test]
    fn test_render_report() {
        let policy = RoundingPolicy::default();
        let renderer = ArtifactRenderer::new(&policy, "Q2 Review");
        let report = renderer
            .render(&create_test_summary(), &create_test_provenance(), Template::Report)
            .unwrap();

        assert!(report.starts_with("# Q2 Review\n"));
        assert!(report.contains("| Total Revenue | 125430.46 |"));
        assert!(report.contains("| Churn Rate | 23.5% |"));
        assert!(report.contains("| Order Count | 200 |"));
        assert!(report.contains("| Electronics | 100.00 |"));
        assert!(report.contains("![Revenue Trend](charts/revenue_trend.png)"));
        assert!(report.contains("- git_commit: deadbeef"));
    }

    #[test]
    fn test_render_slides() {
        let policy = RoundingPolicy::default();
        let renderer = ArtifactRenderer::new(&policy, "Q2 Review");
        let slides = renderer
            .render(&create_test_summary(), &create_test_provenance(), Template::Slides)
            .unwrap();

        assert!(slides.contains("- **Total Revenue:** 125430.46"));
        assert!(slides.contains("- Home: 200.00"));
        assert!(slides.contains("<!-- provenance:end -->"));
    }

    #[test]
    fn test_render_is_idempotent() {
        let policy = RoundingPolicy::default();
        let renderer = ArtifactRenderer::new(&policy, "Report");
        let summary = create_test_summary();
        let provenance = create_test_provenance();
        for template in Template::ALL {
            let first = renderer.render(&summary, &provenance, template).unwrap();
            let second = renderer.render(&summary, &provenance, template).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_missing_kpi_is_missing_data() {
        let policy = RoundingPolicy::default();
        let renderer = ArtifactRenderer::new(&policy, "Report");
        let err = renderer
            .render_source(
                "Margin: {{kpi:gross_margin}}",
                &create_test_summary(),
                &create_test_provenance(),
            )
            .unwrap_err();
        assert!(matches!(err, FactoryError::MissingData { kind: "KPI", .. }));

        let err = renderer
            .render_source(
                "{{category:Garden}}",
                &create_test_summary(),
                &create_test_provenance(),
            )
            .unwrap_err();
        assert!(matches!(err, FactoryError::MissingData { kind: "category", .. }));
    }

    #[test]
    fn test_duplicate_category_labels_are_rejected() {
        let policy = RoundingPolicy::default();
        let renderer = ArtifactRenderer::new(&policy, "Report");
        let mut summary = create_test_summary();
        summary.categories = vec![Category::new("A", 100.0), Category::new("A", 50.0)];

        let err = renderer
            .render(&summary, &create_test_provenance(), Template::Report)
            .unwrap_err();
        assert!(matches!(err, FactoryError::DuplicateCategory { ref label } if label == "A"));
        assert!(err.to_string().starts_with("DuplicateCategoryError"));
    }

    #[test]
    fn test_category_rows_use_their_own_values() {
        let policy = RoundingPolicy::default();
        let renderer = ArtifactRenderer::new(&policy, "Report");
        let mut summary = create_test_summary();
        summary.categories = vec![Category::new("Home", 200.0), Category::new("Home Office", 50.0)];

        let slides = renderer
            .render_source("{{category_bullets}}", &summary, &create_test_provenance())
            .unwrap();
        assert!(slides.contains("- Home: 200.00\n"));
        assert!(slides.contains("- Home Office: 50.00\n"));
    }

    #[test]
    fn test_missing_provenance_field() {
        let policy = RoundingPolicy::default();
        let renderer = ArtifactRenderer::new(&policy, "Report");
        let provenance = Provenance {
            git_commit: None,
            ..create_test_provenance()
        };
        let err = renderer
            .render(&create_test_summary(), &provenance, Template::Report)
            .unwrap_err();
        match err {
            FactoryError::MissingProvenance { field } => assert_eq!(field, "git_commit"),
            other => panic!("unexpected error: {other}"),
        }

        let lenient = ArtifactRenderer::new(&policy, "Report").require_provenance(false);
        let report = lenient
            .render(&create_test_summary(), &provenance, Template::Report)
            .unwrap();
        assert!(!report.contains("git_commit"));
    }

    #[test]
    fn test_provenance_appended_when_template_omits_it() {
        let policy = RoundingPolicy::default();
        let renderer = ArtifactRenderer::new(&policy, "Report");
        let out = renderer
            .render_source(
                "Revenue {{kpi:total_revenue}}",
                &create_test_summary(),
                &create_test_provenance(),
            )
            .unwrap();
        assert!(out.starts_with("Revenue 125430.46\n\n## Provenance"));
        assert!(out.trim_end().ends_with("<!-- provenance:end -->"));
    }

    #[test]
    fn test_template_override() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("slides_outline.md.tmpl"),
            "Only {{kpi:order_count}} orders\n{{provenance}}",
        )
        .unwrap();

        let policy = RoundingPolicy::default();
        let renderer =
            ArtifactRenderer::new(&policy, "Report").with_template_dir(Some(dir.path().to_path_buf()));
        let slides = renderer
            .render(&create_test_summary(), &create_test_provenance(), Template::Slides)
            .unwrap();
        assert!(slides.starts_with("Only 200 orders\n## Provenance"));

        let report = renderer
            .render(&create_test_summary(), &create_test_provenance(), Template::Report)
            .unwrap();
        assert!(report.contains("## Key Metrics"));
    }

    #[test]
    fn test_publish_failure_leaves_previous_artifact() {
        let dir = TempDir::new().unwrap();
        let policy = RoundingPolicy::default();
        let renderer = ArtifactRenderer::new(&policy, "Report");
        let summary = create_test_summary();

        let path = renderer
            .publish(&summary, &create_test_provenance(), Template::Report, dir.path())
            .unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let result = renderer.publish(&summary, &Provenance::default(), Template::Report, dir.path());
        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }
}
