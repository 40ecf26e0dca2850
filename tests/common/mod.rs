#![allow(dead_code)]

use covtrack::config::Config;
use covtrack::coverage::ProjectData;
use tempfile::TempDir;

/// A config pointing at a data file inside a fresh temporary directory.
/// The caller must hold onto `TempDir` to keep the temp directory alive.
pub fn setup_config() -> (Config, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_data_file(dir.path().join("covtrack.db"));
    (config, dir)
}

/// Declare lines `1..=lines` of `class` in method `run()V`.
pub fn declare_lines(project: &ProjectData, class: &str, lines: u32) {
    let class = project.get_or_create_class(class);
    for n in 1..=lines {
        class.add_line(n, "run", "()V");
    }
}

/// Hit count of one stored line, or `None` when it is not stored.
pub fn stored_hits(config: &Config, class: &str, line: u32) -> Option<u64> {
    let project = covtrack::db::load_project(&config.data_file).unwrap()?;
    let hits = project.class(class)?.line(line)?.hits();
    Some(hits)
}
