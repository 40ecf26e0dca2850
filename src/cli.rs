//! Command handler functions for the covtrack CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::fmt::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;

use crate::complexity::{ComplexityData, ComplexityTask, MethodData, ScoreFileAnalyzer};
use crate::config::Config;
use crate::coverage::ProjectData;
use crate::model::CoverageContainer;
use crate::report::{self, JsonFormatter, MarkdownFormatter, Report, ReportFormatter, TextFormatter};
use crate::session::Session;
use crate::{db, ingest};

/// Output style for the `summary` command.
#[derive(Clone, ValueEnum)]
pub enum Style {
    Text,
    Markdown,
    Json,
}

/// Load the project stored in the configured data file.
pub fn load(config: &Config) -> Result<ProjectData> {
    db::load_project(&config.data_file)
        .with_context(|| format!("Failed to read {}", config.data_file.display()))?
        .ok_or_else(|| anyhow::anyhow!("No coverage data at {}", config.data_file.display()))
}

/// Run the complexity pass, or return an empty table when there is no
/// score file.
pub fn complexity(
    project: &ProjectData,
    scores: Option<&Path>,
    config: &Config,
) -> Result<ComplexityData> {
    let Some(path) = scores else {
        return Ok(ComplexityData::default());
    };
    let analyzer = ScoreFileAnalyzer::from_path(path)
        .with_context(|| format!("Failed to read score file {}", path.display()))?;
    let data = ComplexityTask::new(&analyzer)
        .with_method_complexity(config.calculate_method_complexity)
        .calculate_complexity(project)?;
    Ok(data)
}

pub fn cmd_record(config: &Config, logs: &[impl AsRef<Path>]) -> Result<String> {
    let session = Session::open(config.clone());
    let mut out = String::new();
    for log in logs {
        let log = log.as_ref();
        let applied = ingest::ingest_file(log, session.project())
            .with_context(|| format!("Failed to ingest {}", log.display()))?;
        writeln!(out, "Recorded {} events from {}", applied, log.display()).unwrap();
    }
    let stats = match session.shutdown() {
        Some(result) => result?,
        None => db::SaveStats::default(),
    };
    writeln!(
        out,
        "Saved {} new hits across {} classes to {}",
        stats.added_hits,
        stats.classes,
        config.data_file.display()
    )
    .unwrap();
    Ok(out)
}

pub fn cmd_summary(project: &ProjectData, complexity: &ComplexityData, style: &Style) -> String {
    let report = Report::new(project, complexity);
    match style {
        Style::Text => TextFormatter.format(&report),
        Style::Markdown => MarkdownFormatter.format(&report),
        Style::Json => JsonFormatter.format(&report),
    }
}

/// Packages at or below `prefix` (every package when `None`).
pub fn cmd_packages(project: &ProjectData, complexity: &ComplexityData, prefix: Option<&str>) -> String {
    let report = Report::new(project, complexity);
    let packages: Vec<_> = match prefix {
        Some(prefix) => project
            .packages()
            .into_iter()
            .filter(|p| is_within_package(p.name(), prefix))
            .collect(),
        None => project.packages(),
    };
    if packages.is_empty() {
        return format!("No packages match '{}'\n", prefix.unwrap_or(""));
    }

    let mut out = String::new();
    writeln!(
        out,
        "{:<40} {:>8} {:>8} {:>8} {:>8} {:>10}",
        "PACKAGE", "FILES", "CLASSES", "LINES", "BRANCHES", "COMPLEXITY"
    )
    .unwrap();
    writeln!(out, "{}", "-".repeat(87)).unwrap();
    for package in &packages {
        writeln!(
            out,
            "{:<40} {:>8} {:>8} {:>8} {:>8} {:>10}",
            report.package_display_name(Some(package)),
            package.source_files().len(),
            package.classes().len(),
            report.line_coverage_percent(package),
            report.branch_coverage_percent(package),
            report::format_ccn(report.ccn_for_package(package)),
        )
        .unwrap();
    }
    out
}

/// `name` is `prefix` itself or nested below it (`com.example.io` is within
/// `com.example`, `com.examples` is not).
fn is_within_package(name: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || name
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

pub fn cmd_files(project: &ProjectData, complexity: &ComplexityData, sort_by_coverage: bool) -> String {
    let report = Report::new(project, complexity);
    let mut files = report.source_files(None);
    if sort_by_coverage {
        files.sort_by(|a, b| a.line_coverage_rate().total_cmp(&b.line_coverage_rate()));
    }

    let mut out = String::new();
    writeln!(
        out,
        "{:<60} {:>8} {:>8} {:>8} {:>8}",
        "FILE", "LINES", "COVERED", "RATE", "CCN"
    )
    .unwrap();
    writeln!(out, "{}", "-".repeat(96)).unwrap();
    for f in &files {
        writeln!(
            out,
            "{:<60} {:>8} {:>8} {:>8} {:>8}",
            f.name(),
            f.number_of_valid_lines(),
            f.number_of_covered_lines(),
            report.line_coverage_percent(f),
            report::format_ccn(report.ccn_for_source_file(f)),
        )
        .unwrap();
    }
    out
}

/// Line detail for one source file. With `source`, every line of the text
/// is shown next to its coverage; otherwise only tracked lines are listed.
pub fn cmd_lines(
    project: &ProjectData,
    source_file: &str,
    source: Option<&str>,
    uncovered: bool,
) -> Result<String> {
    let file = project
        .source_files()
        .into_iter()
        .find(|f| f.name() == source_file)
        .ok_or_else(|| anyhow::anyhow!("Source file not found: {}", source_file))?;

    if uncovered {
        let missed: Vec<u32> = file
            .classes()
            .iter()
            .flat_map(|c| c.lines())
            .filter(|l| !l.is_covered())
            .map(|l| l.number())
            .collect();
        if missed.is_empty() {
            return Ok(format!(
                "All instrumented lines are covered in '{}'\n",
                source_file
            ));
        }
        let mut missed = missed;
        missed.sort_unstable();
        // classes sharing a file may track the same line
        missed.dedup();
        return Ok(format!(
            "Uncovered lines in '{}':\n  {}\n  ({} lines)\n",
            source_file,
            format_line_ranges(&missed),
            missed.len()
        ));
    }

    let complexity = ComplexityData::default();
    let report = Report::new(project, &complexity);
    let mut out = String::new();
    match source {
        Some(text) => {
            for line in report.source_lines(&file, text) {
                let hits = match (&line.data, line.valid) {
                    (Some(data), true) => data.hits.to_string(),
                    _ => String::new(),
                };
                writeln!(
                    out,
                    "{:>6} {:>8}  {}{}",
                    line.number,
                    hits,
                    line.code,
                    line.condition_details.unwrap_or_default()
                )
                .unwrap();
            }
        }
        None => {
            writeln!(out, "{:>6}  {:>10}", "LINE", "HITS").unwrap();
            writeln!(out, "{}", "-".repeat(18)).unwrap();
            let mut lines: Vec<_> = file.classes().iter().flat_map(|c| c.lines()).collect();
            lines.sort_by_key(|l| l.number());
            for line in lines {
                let snapshot = line.snapshot();
                let marker = if snapshot.is_covered() { "✓" } else { "✗" };
                let details = if snapshot.has_branch() {
                    report::condition_details(&snapshot)
                } else {
                    String::new()
                };
                writeln!(
                    out,
                    "{:>6}  {:>10}  {}{}",
                    snapshot.number, snapshot.hits, marker, details
                )
                .unwrap();
            }
        }
    }
    Ok(out)
}

pub fn cmd_merge(source: &Path, target: &Path) -> Result<String> {
    let stats = db::merge_files(source, target)
        .with_context(|| format!("Failed to merge {} into {}", source.display(), target.display()))?;
    Ok(format!(
        "Merged {} into {} ({} classes, {} hits)\n",
        source.display(),
        target.display(),
        stats.classes,
        stats.added_hits
    ))
}

pub fn cmd_complexity(project: &ProjectData, complexity: &ComplexityData) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "Project: {}", report::format_ccn(complexity.ccn_for_project())).unwrap();
    for class in project.classes() {
        writeln!(
            out,
            "  {:<58} {:>8}",
            class.name(),
            report::format_ccn(complexity.ccn_for_class(&class))
        )
        .unwrap();
        for token in class.method_names_and_descriptors() {
            let method = MethodData::from_token(&class, &token)?;
            writeln!(out, "    {:<56} {:>8}", token, complexity.ccn_for_method(&method)).unwrap();
        }
    }
    Ok(out)
}

/// Collapse sorted line numbers into ranges: `1-3, 7, 9-10`.
pub fn format_line_ranges(lines: &[u32]) -> String {
    let mut ranges: Vec<String> = Vec::new();
    let mut iter = lines.iter().copied();
    let Some(first) = iter.next() else {
        return String::new();
    };
    let (mut start, mut end) = (first, first);
    for n in iter {
        if n == end + 1 {
            end = n;
            continue;
        }
        ranges.push(range_text(start, end));
        start = n;
        end = n;
    }
    ranges.push(range_text(start, end));
    ranges.join(", ")
}

fn range_text(start: u32, end: u32) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{}-{}", start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two files: Foo (lines 1-4, two covered, one jump half taken) and a
    /// fully covered Bar.
    fn seed_project() -> ProjectData {
        let project = ProjectData::new();
        let foo = project.get_or_create_class("com.example.Foo");
        for n in 1..=4 {
            foo.add_line(n, "run", "()V");
        }
        foo.add_jump(2, 0);
        foo.touch(1);
        foo.touch(2);
        foo.touch_branch(2, 0, 0);

        let bar = project.get_or_create_class("com.example.Bar");
        bar.add_line(1, "go", "(I)I");
        bar.touch(1);
        project
    }

    #[test]
    fn test_cmd_summary_text() {
        let project = seed_project();
        let out = cmd_summary(&project, &ComplexityData::default(), &Style::Text);
        assert!(out.contains("All Packages"));
        assert!(out.contains("60%"));
        assert!(out.contains("50%"));
    }

    #[test]
    fn test_cmd_packages_prefix() {
        let project = seed_project();
        project.get_or_create_class("com.example.io.Reader").touch(3);
        project.get_or_create_class("org.other.Thing").touch(1);

        let out = cmd_packages(&project, &ComplexityData::default(), Some("com.example"));
        assert!(out.contains("com.example.io"));
        assert!(!out.contains("org.other"));

        let out = cmd_packages(&project, &ComplexityData::default(), None);
        assert!(out.contains("org.other"));

        let out = cmd_packages(&project, &ComplexityData::default(), Some("net"));
        assert!(out.contains("No packages match 'net'"));
    }

    #[test]
    fn test_cmd_files_sorted_by_coverage() {
        let project = seed_project();
        let out = cmd_files(&project, &ComplexityData::default(), true);
        let foo = out.find("com/example/Foo.java").unwrap();
        let bar = out.find("com/example/Bar.java").unwrap();
        assert!(foo < bar);
        assert!(out.contains("100%"));
    }

    #[test]
    fn test_cmd_lines_tracked_only() {
        let project = seed_project();
        let out = cmd_lines(&project, "com/example/Foo.java", None, false).unwrap();
        assert!(out.contains("LINE"));
        assert!(out.contains("[each condition: 50%]"));
        assert_eq!(out.matches('✗').count(), 2);
    }

    #[test]
    fn test_cmd_lines_with_source() {
        let project = seed_project();
        let source = "a();\nif (x) {\n}\nb();\nextra();\n";
        let out = cmd_lines(&project, "com/example/Foo.java", Some(source), false).unwrap();
        assert!(out.contains("if (x) { [each condition: 50%]"));
        assert!(out.contains("extra();"));
    }

    #[test]
    fn test_cmd_lines_uncovered() {
        let project = seed_project();
        let out = cmd_lines(&project, "com/example/Foo.java", None, true).unwrap();
        assert!(out.contains("3-4"));
        assert!(out.contains("(2 lines)"));

        let out = cmd_lines(&project, "com/example/Bar.java", None, true).unwrap();
        assert!(out.contains("All instrumented lines are covered"));
    }

    #[test]
    fn test_cmd_lines_unknown_file() {
        let project = seed_project();
        assert!(cmd_lines(&project, "nope.java", None, false).is_err());
    }

    #[test]
    fn test_cmd_complexity_defaults_to_zero() {
        let project = seed_project();
        let out = cmd_complexity(&project, &ComplexityData::default()).unwrap();
        assert!(out.contains("Project: 0"));
        assert!(out.contains("run()V"));
    }

    #[test]
    fn test_cmd_lines_uncovered_shared_line_listed_once() {
        let project = seed_project();
        let inner = project.get_or_create_class("com.example.Foo$Inner");
        inner.add_line(3, "call", "()V");
        inner.add_line(5, "call", "()V");

        let out = cmd_lines(&project, "com/example/Foo.java", None, true).unwrap();
        assert!(out.contains("  3-5\n"));
        assert!(out.contains("(3 lines)"));
    }

    #[test]
    fn test_is_within_package() {
        assert!(is_within_package("com.example", "com.example"));
        assert!(is_within_package("com.example.io", "com.example"));
        assert!(!is_within_package("com.examples", "com.example"));
        assert!(is_within_package("", ""));
        assert!(!is_within_package("", "com"));
    }

    #[test]
    fn test_format_line_ranges() {
        assert_eq!(format_line_ranges(&[]), "");
        assert_eq!(format_line_ranges(&[5]), "5");
        assert_eq!(format_line_ranges(&[1, 2, 3, 7, 9, 10]), "1-3, 7, 9-10");
    }
}
