use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::coverage::class::ClassData;
use crate::coverage::package::{group_by_source_file, PackageData};
use crate::coverage::snapshot::ProjectSnapshot;
use crate::coverage::source_file::SourceFileData;
use crate::model::{CoverageContainer, CoverageCounts};

/// Root of the coverage hierarchy: every class of the program under test,
/// keyed by fully qualified name.
///
/// Packages and source files are not stored; they are derived from the
/// registered classes whenever they are asked for, so they can never go
/// stale relative to the class table.
#[derive(Debug, Default)]
pub struct ProjectData {
    classes: DashMap<String, Arc<ClassData>>,
}

impl ProjectData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a project from a stored snapshot. All counters start out as
    /// already persisted.
    pub fn from_snapshot(snapshot: &ProjectSnapshot) -> Self {
        let project = Self::new();
        for class in &snapshot.classes {
            project.add_class(ClassData::from_snapshot(class));
        }
        project
    }

    /// Register a class. A class previously registered under the same name
    /// is replaced.
    pub fn add_class(&self, class: impl Into<Arc<ClassData>>) -> Arc<ClassData> {
        let class = class.into();
        self.classes
            .insert(class.name().to_string(), Arc::clone(&class));
        class
    }

    pub fn class(&self, name: &str) -> Option<Arc<ClassData>> {
        self.classes.get(name).map(|c| Arc::clone(c.value()))
    }

    /// Return the class registered under `name`, creating it first if
    /// needed. Concurrent callers with the same name all receive the same
    /// instance.
    pub fn get_or_create_class(&self, name: &str) -> Arc<ClassData> {
        if let Some(class) = self.classes.get(name) {
            return Arc::clone(class.value());
        }
        Arc::clone(
            self.classes
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(ClassData::new(name)))
                .value(),
        )
    }

    /// All classes sorted by name.
    pub fn classes(&self) -> Vec<Arc<ClassData>> {
        let mut classes: Vec<_> = self.classes.iter().map(|c| Arc::clone(c.value())).collect();
        classes.sort_by(|a, b| a.name().cmp(b.name()));
        classes
    }

    pub fn number_of_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Packages derived from the class names, sorted by name.
    pub fn packages(&self) -> Vec<PackageData> {
        let mut packages: BTreeMap<String, PackageData> = BTreeMap::new();
        for class in self.classes() {
            let name = class.package_name().to_string();
            packages
                .entry(name.clone())
                .or_insert_with(|| PackageData::new(name))
                .add_class(class);
        }
        packages.into_values().collect()
    }

    pub fn package(&self, name: &str) -> Option<PackageData> {
        self.packages().into_iter().find(|p| p.name() == name)
    }

    /// Packages named exactly `name`, as listed on a package overview.
    /// Nested packages such as `com.example.io` are not included.
    pub fn sub_packages(&self, name: &str) -> Vec<PackageData> {
        self.packages()
            .into_iter()
            .filter(|p| p.name() == name)
            .collect()
    }

    /// Every source file of the project, sorted by name.
    pub fn source_files(&self) -> Vec<SourceFileData> {
        group_by_source_file(&self.classes())
    }

    /// Point-in-time copy of every class, sorted by name.
    pub fn snapshot(&self) -> ProjectSnapshot {
        ProjectSnapshot {
            classes: self.classes().iter().map(|c| c.snapshot()).collect(),
        }
    }

    /// Add every counter of `other` to this project. Classes and lines
    /// missing on this side are created. The merged-in counts are treated
    /// as new, unsaved hits.
    pub fn merge(&self, other: &ProjectData) {
        self.absorb(&other.snapshot());
    }

    pub(crate) fn absorb(&self, snapshot: &ProjectSnapshot) {
        for class in &snapshot.classes {
            self.get_or_create_class(&class.name)
                .absorb(class);
        }
    }

    /// Record that `observed` has been written to the store.
    pub(crate) fn mark_saved(&self, observed: &ProjectSnapshot) {
        for seen in &observed.classes {
            if let Some(class) = self.class(&seen.name) {
                class.mark_saved(seen);
            }
        }
    }
}

impl CoverageContainer for ProjectData {
    fn counts(&self) -> CoverageCounts {
        self.packages().iter().map(|p| p.counts()).sum()
    }
}
