//! The coverage hierarchy: project → package → source file → class → line.
//!
//! Classes and lines are live, concurrently mutable objects owned by the
//! project. Packages and source files are cheap views rebuilt from the
//! class table on every query.

pub mod class;
pub mod line;
pub mod package;
pub mod project;
pub mod snapshot;
pub mod source_file;

pub use class::ClassData;
pub use line::{LineData, MethodSignature, MAX_BRANCH_INDEX};
pub use package::PackageData;
pub use project::ProjectData;
pub use snapshot::{ClassSnapshot, ConditionSnapshot, LineSnapshot, ProjectSnapshot};
pub use source_file::SourceFileData;

/// Record one execution of `line` in `class_name`.
///
/// This is the hot path called by instrumented code. It never blocks on
/// I/O and never takes a lock wider than one shard of a class table.
#[inline]
pub fn record_hit(project: &ProjectData, class_name: &str, line: u32) {
    project.get_or_create_class(class_name).touch(line);
}

/// Record one hit of `outcome` of branch condition `condition` on `line`.
/// The line's own hit counter is not touched.
#[inline]
pub fn record_branch_hit(
    project: &ProjectData,
    class_name: &str,
    line: u32,
    condition: usize,
    outcome: usize,
) {
    project
        .get_or_create_class(class_name)
        .touch_branch(line, condition, outcome);
}
