use std::collections::BTreeMap;
use std::sync::Arc;

use crate::coverage::class::ClassData;
use crate::coverage::source_file::SourceFileData;
use crate::model::{CoverageContainer, CoverageCounts};

/// The classes of one package. Built on demand from a project, or by hand
/// as a placeholder for a package that has no classes.
#[derive(Debug, Clone)]
pub struct PackageData {
    name: String,
    classes: Vec<Arc<ClassData>>,
}

impl PackageData {
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

    /// Dotted package name; empty for the default package.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Classes sorted by name.
    pub fn classes(&self) -> &[Arc<ClassData>] {
        &self.classes
    }

    /// Distinct source files of this package's classes, sorted by name.
    pub fn source_files(&self) -> Vec<SourceFileData> {
        group_by_source_file(&self.classes)
    }
}

impl CoverageContainer for PackageData {
    fn counts(&self) -> CoverageCounts {
        self.classes.iter().map(|c| c.counts()).sum()
    }
}

pub(crate) fn group_by_source_file(classes: &[Arc<ClassData>]) -> Vec<SourceFileData> {
    let mut files: BTreeMap<String, SourceFileData> = BTreeMap::new();
    for class in classes {
        let name = class.source_file_name();
        files
            .entry(name.clone())
            .or_insert_with(|| SourceFileData::new(name))
            .add_class(Arc::clone(class));
    }
    files.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_package() {
        let package = PackageData::new("com.empty");
        assert_eq!(package.number_of_valid_lines(), 0);
        assert_eq!(package.line_coverage_rate(), 0.0);
        assert_eq!(package.branch_coverage_rate(), 0.0);
        assert!(package.source_files().is_empty());
    }

    #[test]
    fn test_source_files_group_inner_classes() {
        let mut package = PackageData::new("com.example");
        package.add_class(Arc::new(ClassData::new("com.example.Foo")));
        package.add_class(Arc::new(ClassData::new("com.example.Foo$1")));
        package.add_class(Arc::new(ClassData::new("com.example.Bar")));

        let files = package.source_files();
        let names: Vec<_> = files.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["com/example/Bar.java", "com/example/Foo.java"]);
        assert_eq!(files[1].classes().len(), 2);
    }

    #[test]
    fn test_add_class_replaces_same_name() {
        let mut package = PackageData::new("p");
        let first = Arc::new(ClassData::new("p.A"));
        first.touch(1);
        package.add_class(first);
        package.add_class(Arc::new(ClassData::new("p.A")));
        assert_eq!(package.classes().len(), 1);
        assert_eq!(package.number_of_valid_lines(), 0);
    }
}
