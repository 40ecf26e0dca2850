mod common;

use covtrack::cli::{self, Style};
use covtrack::complexity::{ComplexityData, ComplexityTask, Scope};
use covtrack::coverage::ProjectData;
use covtrack::report::{MarkdownFormatter, Report, ReportFormatter};
use covtrack::session::Session;

fn sample_project() -> ProjectData {
    let project = ProjectData::new();
    common::declare_lines(&project, "com.example.Foo", 4);
    common::declare_lines(&project, "com.example.io.Reader", 2);
    common::declare_lines(&project, "Main", 1);

    let foo = project.class("com.example.Foo").unwrap();
    foo.add_jump(2, 0);
    foo.touch(1);
    foo.touch(2);
    foo.touch_branch(2, 0, 1);
    project.class("com.example.io.Reader").unwrap().touch(1);
    project
}

#[test]
fn report_listings_and_rates() {
    let project = sample_project();
    let complexity = ComplexityData::default();
    let report = Report::new(&project, &complexity);

    let names: Vec<String> = report
        .packages()
        .iter()
        .map(|p| report.package_display_name(Some(p)))
        .collect();
    assert_eq!(names, vec!["(default)", "com.example", "com.example.io"]);

    let files: Vec<String> = report
        .source_files(None)
        .iter()
        .map(|f| f.name().to_string())
        .collect();
    assert_eq!(
        files,
        vec!["com/example/Foo.java", "Main.java", "com/example/io/Reader.java"]
    );

    // 3 of 7 lines, 1 of 2 branches
    assert_eq!(report.line_coverage_percent(&project), "43%");
    assert_eq!(report.branch_coverage_percent(&project), "50%");
    assert_eq!(report.line_coverage_graph_width(&project), 42);
    assert_eq!(report.branch_coverage_graph_width(&project), 50);
}

#[test]
fn report_sub_packages() {
    let project = sample_project();
    let nested: Vec<String> = project
        .sub_packages("com.example")
        .iter()
        .map(|p| p.name().to_string())
        .collect();
    assert_eq!(nested, vec!["com.example"]);
    assert_eq!(project.sub_packages("").len(), 1);
    assert!(project.sub_packages("com.ex").is_empty());

    let listed = cli::cmd_packages(&project, &ComplexityData::default(), Some("com.example"));
    assert!(listed.contains("com.example.io"));
    assert!(!listed.contains("(default)"));
}

#[test]
fn report_markdown_with_complexity() {
    let project = sample_project();
    let analyzer = |scope: &Scope<'_>| -> covtrack::error::Result<f64> {
        match scope {
            Scope::Package(p) if p.name() == "com.example" => Ok(1.5),
            _ => Ok(1.0),
        }
    };
    let complexity = ComplexityTask::new(&analyzer)
        .calculate_complexity(&project)
        .unwrap();

    let md = MarkdownFormatter.format(&Report::new(&project, &complexity));
    assert!(md.contains("| **All Packages** | 3 | 43% | 50% | 1 |"));
    assert!(md.contains("| `com.example` | 1 | 50% | 50% | 1.5 |"));
    assert!(md.contains("| `(default)` | 1 | 0% | N/A | 1 |"));
}

#[test]
fn report_from_saved_data_file() {
    let (config, _dir) = common::setup_config();
    let session = Session::open(config.clone());
    session.record_hit("com.example.Foo", 1);
    session.record_hit("com.example.Foo", 2);
    session.shutdown().unwrap().unwrap();

    let project = cli::load(&config).unwrap();
    let complexity = cli::complexity(&project, None, &config).unwrap();
    let out = cli::cmd_summary(&project, &complexity, &Style::Text);
    assert!(out.contains("com.example"));
    assert!(out.contains("100%"));
}

#[test]
fn report_load_missing_data_file_fails() {
    let (config, _dir) = common::setup_config();
    let err = cli::load(&config).unwrap_err();
    assert!(err.to_string().contains("No coverage data"));
}
