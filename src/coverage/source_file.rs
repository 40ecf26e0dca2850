use std::sync::Arc;

use crate::coverage::class::ClassData;
use crate::coverage::line::LineData;
use crate::model::{CoverageContainer, CoverageCounts};

/// The classes compiled from one source file.
#[derive(Debug, Clone)]
pub struct SourceFileData {
    name: String,
    classes: Vec<Arc<ClassData>>,
}

impl SourceFileData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classes: Vec::new(),
        }
    }

    /// Add a class, replacing any class of the same name.
    pub fn add_class(&mut self, class: Arc<ClassData>) {
        match self
            .classes
            .binary_search_by(|c| c.name().cmp(class.name()))
        {
            Ok(idx) => self.classes[idx] = class,
            Err(idx) => self.classes.insert(idx, class),
        }
    }

    /// Path relative to a source root, e.g. `com/example/Foo.java`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File name without directories.
    pub fn base_name(&self) -> &str {
        match self.name.rfind(['/', '\\']) {
            Some(idx) => &self.name[idx + 1..],
            None => &self.name,
        }
    }

    /// The name with path separators replaced by dots, usable as a flat
    /// output file name.
    pub fn normalized_name(&self) -> String {
        self.name.replace(['/', '\\'], ".")
    }

    /// Package of the first class in the file.
    pub fn package_name(&self) -> &str {
        self.classes.first().map_or("", |c| c.package_name())
    }

    /// Classes sorted by name.
    pub fn classes(&self) -> &[Arc<ClassData>] {
        &self.classes
    }

    /// True when at least one class tracks any line at all.
    pub fn contains_instrumentation_info(&self) -> bool {
        self.classes.iter().any(|c| c.number_of_lines() > 0)
    }

    pub fn is_valid_source_line_number(&self, number: u32) -> bool {
        self.classes
            .iter()
            .any(|c| c.is_valid_source_line_number(number))
    }

    pub fn line_coverage(&self, number: u32) -> Option<Arc<LineData>> {
        self.classes.iter().find_map(|c| c.line(number))
    }
}

impl CoverageContainer for SourceFileData {
    fn counts(&self) -> CoverageCounts {
        self.classes.iter().map(|c| c.counts()).sum()
    }
}
