//! Read-only view handed to a renderer for one report run: coverage rates,
//! per-line facts and complexity scores, plus plain-text and Markdown
//! summaries built on top of them.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::complexity::{ComplexityData, MethodData};
use crate::coverage::{ClassData, LineSnapshot, PackageData, ProjectData, SourceFileData};
use crate::model::{CoverageContainer, CoverageCounts};

/// Shown instead of a percentage when there is nothing to measure.
pub const NOT_APPLICABLE: &str = "N/A";

/// Round a 0.0–1.0 rate to a whole percentage, e.g. `"50%"`.
#[must_use]
pub fn percent(rate: f64) -> String {
    format!("{}%", (rate * 100.0).round() as u64)
}

/// Format a complexity score with at most three decimals and no trailing
/// zeros (`2`, `2.5`, `1.333`).
#[must_use]
pub fn format_ccn(value: f64) -> String {
    let formatted = format!("{:.3}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// One line of a source file as the renderer sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub number: u32,
    /// Whether instrumentation tracks this line.
    pub valid: bool,
    /// Hit data, or `None` when the line was never instrumented.
    pub data: Option<LineSnapshot>,
    pub code: String,
    /// ` [each condition: 50%, 100%]` for lines with branches.
    pub condition_details: Option<String>,
}

/// Coverage and complexity of one project, indexed like the hierarchy.
pub struct Report<'a> {
    project: &'a ProjectData,
    complexity: &'a ComplexityData,
    generated_at: DateTime<Utc>,
}

impl<'a> Report<'a> {
    pub fn new(project: &'a ProjectData, complexity: &'a ComplexityData) -> Self {
        Self {
            project,
            complexity,
            generated_at: Utc::now(),
        }
    }

    pub fn project(&self) -> &ProjectData {
        self.project
    }

    pub fn complexity(&self) -> &ComplexityData {
        self.complexity
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn line_coverage_percent(&self, container: &dyn CoverageContainer) -> String {
        let counts = container.counts();
        if counts.valid_lines > 0 {
            percent(counts.line_rate())
        } else {
            NOT_APPLICABLE.to_string()
        }
    }

    pub fn branch_coverage_percent(&self, container: &dyn CoverageContainer) -> String {
        let counts = container.counts();
        if counts.valid_branches > 0 {
            percent(counts.branch_rate())
        } else {
            NOT_APPLICABLE.to_string()
        }
    }

    /// Width in pixels (0–100) of a line coverage bar.
    pub fn line_coverage_graph_width(&self, container: &dyn CoverageContainer) -> u64 {
        let counts = container.counts();
        (counts.covered_lines * 100).checked_div(counts.valid_lines).unwrap_or(0)
    }

    /// Width in pixels (0–100) of a branch coverage bar.
    pub fn branch_coverage_graph_width(&self, container: &dyn CoverageContainer) -> u64 {
        let counts = container.counts();
        (counts.covered_branches * 100)
            .checked_div(counts.valid_branches)
            .unwrap_or(0)
    }

    /// `"All Packages"` for the project overview, `"(default)"` for the
    /// unnamed package.
    pub fn package_display_name(&self, package: Option<&PackageData>) -> String {
        match package {
            None => "All Packages".to_string(),
            Some(p) if p.name().is_empty() => "(default)".to_string(),
            Some(p) => p.name().to_string(),
        }
    }

    pub fn packages(&self) -> Vec<PackageData> {
        self.project.packages()
    }

    /// Source files of a package, or of the whole project for `None`,
    /// ordered by file name without directories.
    pub fn source_files(&self, package: Option<&PackageData>) -> Vec<SourceFileData> {
        let mut files = match package {
            Some(p) => p.source_files(),
            None => self.project.source_files(),
        };
        files.sort_by(|a, b| {
            a.base_name()
                .cmp(b.base_name())
                .then_with(|| a.name().cmp(b.name()))
        });
        files
    }

    pub fn ccn_for_project(&self) -> f64 {
        self.complexity.ccn_for_project()
    }

    pub fn ccn_for_package(&self, package: &PackageData) -> f64 {
        self.complexity.ccn_for_package(package)
    }

    pub fn ccn_for_source_file(&self, source_file: &SourceFileData) -> f64 {
        self.complexity.ccn_for_source_file(source_file)
    }

    pub fn ccn_for_class(&self, class: &ClassData) -> f64 {
        self.complexity.ccn_for_class(class)
    }

    pub fn ccn_for_method(&self, class: &ClassData, name: &str, descriptor: &str) -> u32 {
        self.complexity
            .ccn_for_method(&MethodData::new(class, name, descriptor))
    }

    /// Pair every line of `source` with what the coverage data knows about
    /// it. Line numbers start at 1.
    pub fn source_lines(&self, source_file: &SourceFileData, source: &str) -> Vec<SourceLine> {
        source
            .lines()
            .zip(1u32..)
            .map(|(code, number)| {
                let data = source_file.line_coverage(number).map(|l| l.snapshot());
                let condition_details = data
                    .as_ref()
                    .filter(|d| d.has_branch())
                    .map(condition_details);
                SourceLine {
                    number,
                    valid: source_file.is_valid_source_line_number(number),
                    data,
                    code: code.to_string(),
                    condition_details,
                }
            })
            .collect()
    }
}

/// Coverage of every condition of a line, in declaration order.
pub fn condition_details(line: &LineSnapshot) -> String {
    let each: Vec<String> = line
        .conditions
        .iter()
        .map(|c| percent(c.coverage_rate()))
        .collect();
    format!(" [each condition: {}]", each.join(", "))
}

/// Trait for formatting a project summary.
pub trait ReportFormatter {
    fn format(&self, report: &Report<'_>) -> String;
}

/// Plain text formatter.
pub struct TextFormatter;

impl ReportFormatter for TextFormatter {
    fn format(&self, report: &Report<'_>) -> String {
        let mut out = String::new();
        let project = report.project();

        writeln!(
            out,
            "{:<40} {:>8} {:>8} {:>8} {:>10}",
            "PACKAGE", "CLASSES", "LINES", "BRANCHES", "COMPLEXITY"
        )
        .unwrap();
        writeln!(out, "{}", "-".repeat(78)).unwrap();
        writeln!(
            out,
            "{:<40} {:>8} {:>8} {:>8} {:>10}",
            report.package_display_name(None),
            project.number_of_classes(),
            report.line_coverage_percent(project),
            report.branch_coverage_percent(project),
            format_ccn(report.ccn_for_project()),
        )
        .unwrap();
        for package in report.packages() {
            writeln!(
                out,
                "{:<40} {:>8} {:>8} {:>8} {:>10}",
                report.package_display_name(Some(&package)),
                package.classes().len(),
                report.line_coverage_percent(&package),
                report.branch_coverage_percent(&package),
                format_ccn(report.ccn_for_package(&package)),
            )
            .unwrap();
        }
        out
    }
}

/// Markdown formatter.
pub struct MarkdownFormatter;

impl ReportFormatter for MarkdownFormatter {
    fn format(&self, report: &Report<'_>) -> String {
        let mut md = String::new();
        let project = report.project();

        writeln!(md, "## Coverage Report").unwrap();
        md.push('\n');
        writeln!(md, "| Package | # Classes | Line Coverage | Branch Coverage | Complexity |").unwrap();
        writeln!(md, "|:--------|----------:|--------------:|----------------:|-----------:|").unwrap();
        writeln!(
            md,
            "| **{}** | {} | {} | {} | {} |",
            report.package_display_name(None),
            project.number_of_classes(),
            report.line_coverage_percent(project),
            report.branch_coverage_percent(project),
            format_ccn(report.ccn_for_project()),
        )
        .unwrap();
        for package in report.packages() {
            writeln!(
                md,
                "| `{}` | {} | {} | {} | {} |",
                report.package_display_name(Some(&package)),
                package.classes().len(),
                report.line_coverage_percent(&package),
                report.branch_coverage_percent(&package),
                format_ccn(report.ccn_for_package(&package)),
            )
            .unwrap();
        }
        md.push('\n');
        writeln!(
            md,
            "<sub>Generated {}</sub>",
            report.generated_at().format("%Y-%m-%d %H:%M UTC")
        )
        .unwrap();
        md
    }
}

#[derive(Serialize)]
struct PackageSummary {
    name: String,
    classes: usize,
    coverage: CoverageCounts,
    complexity: f64,
}

#[derive(Serialize)]
struct ProjectSummary {
    generated_at: String,
    classes: usize,
    coverage: CoverageCounts,
    complexity: f64,
    packages: Vec<PackageSummary>,
}

/// JSON formatter, raw counts instead of percentages.
pub struct JsonFormatter;

impl ReportFormatter for JsonFormatter {
    fn format(&self, report: &Report<'_>) -> String {
        let project = report.project();
        let summary = ProjectSummary {
            generated_at: report.generated_at().to_rfc3339(),
            classes: project.number_of_classes(),
            coverage: project.counts(),
            complexity: report.ccn_for_project(),
            packages: report
                .packages()
                .iter()
                .map(|p| PackageSummary {
                    name: p.name().to_string(),
                    classes: p.classes().len(),
                    coverage: p.counts(),
                    complexity: report.ccn_for_package(p),
                })
                .collect(),
        };
        let mut json = serde_json::to_string_pretty(&summary).unwrap_or_default();
        json.push('\n');
        json
    }
}
