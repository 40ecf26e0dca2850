mod common;

use std::io::Write;

use covtrack::cli;
use covtrack::error::CovtrackError;
use covtrack::ingest;
use covtrack::session::Session;

const LOG: &str = "\
# run 1
source com.example.Foo Foo.java
line com.example.Foo 10 run(I)V
line com.example.Foo 11 run(I)V
jump com.example.Foo 11 0
switch com.example.Foo 11 1 2
hit com.example.Foo 10
hit com.example.Foo 10
hit com.example.Foo 11
branch com.example.Foo 11 0 1
branch com.example.Foo 11 1 2
hit com.example.Foo$Inner 3
";

#[test]
fn ingest_log_into_session() {
    let (config, _dir) = common::setup_config();
    let session = Session::open(config.clone());

    let applied = ingest::ingest(LOG.as_bytes(), session.project()).unwrap();
    assert_eq!(applied, 11);

    let foo = session.project().class("com.example.Foo").unwrap();
    assert_eq!(foo.source_file_name(), "com/example/Foo.java");
    assert_eq!(foo.line(10).unwrap().hits(), 2);

    let line = foo.line(11).unwrap().snapshot();
    assert_eq!(line.conditions.len(), 2);
    assert_eq!(line.conditions[0].hits, vec![0, 1]);
    assert_eq!(line.conditions[1].hits, vec![0, 0, 1]);

    // inner classes share the outer class's file
    let inner = session.project().class("com.example.Foo$Inner").unwrap();
    assert_eq!(inner.source_file_name(), "com/example/Foo.java");
    assert_eq!(session.project().source_files().len(), 1);

    session.save().unwrap();
    assert_eq!(common::stored_hits(&config, "com.example.Foo", 10), Some(2));
}

#[test]
fn ingest_stops_at_first_bad_line() {
    let project = covtrack::coverage::ProjectData::new();
    let log = "hit a.A 1\nhit a.A one\nhit a.A 2\n";
    let err = ingest::ingest(log.as_bytes(), &project).unwrap_err();
    assert!(matches!(err, CovtrackError::Parse { line: 2, .. }));

    let class = project.class("a.A").unwrap();
    assert_eq!(class.line(1).unwrap().hits(), 1);
    assert!(class.line(2).is_none());
}

#[test]
fn record_command_replays_logs() {
    let (config, dir) = common::setup_config();
    let log_path = dir.path().join("hits.log");
    let mut file = std::fs::File::create(&log_path).unwrap();
    file.write_all(LOG.as_bytes()).unwrap();
    drop(file);

    let out = cli::cmd_record(&config, &[&log_path]).unwrap();
    assert!(out.contains("Recorded 11 events"));
    assert!(out.contains("Saved 4 new hits across 2 classes"));

    // a second replay doubles the stored counts
    cli::cmd_record(&config, &[&log_path]).unwrap();
    assert_eq!(common::stored_hits(&config, "com.example.Foo", 10), Some(4));
}

#[test]
fn record_command_missing_log_fails() {
    let (config, dir) = common::setup_config();
    let missing = dir.path().join("missing.log");
    assert!(cli::cmd_record(&config, &[&missing]).is_err());
}
