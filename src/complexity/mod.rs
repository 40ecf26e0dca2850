//! Per-entity complexity scores for one reporting pass.
//!
//! Scores come from an external [`ComplexityAnalyzer`]; this module only
//! caches them. [`ComplexityTask`] walks a project once and fills a
//! [`ComplexityData`] table that the report façade reads from.

pub mod analyzer;
pub mod task;

use std::collections::HashMap;

use crate::coverage::{ClassData, PackageData, SourceFileData};
use crate::error::{CovtrackError, Result};

pub use analyzer::{ComplexityAnalyzer, Scope, ScoreFileAnalyzer};
pub use task::ComplexityTask;

/// Structural identity of a method: owning class, name and descriptor.
///
/// Two values built from the same three parts are equal and hash alike no
/// matter which constructor produced them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodData {
    class_name: String,
    name: String,
    descriptor: String,
}

impl MethodData {
    pub fn new(class: &ClassData, name: &str, descriptor: &str) -> Self {
        Self {
            class_name: class.name().to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }

    /// Split a `name(descriptor)` token at its first `(`. The descriptor
    /// keeps the parenthesis.
    pub fn from_token(class: &ClassData, name_and_descriptor: &str) -> Result<Self> {
        let idx = name_and_descriptor
            .find('(')
            .ok_or_else(|| CovtrackError::MalformedMethod(name_and_descriptor.to_string()))?;
        let (name, descriptor) = name_and_descriptor.split_at(idx);
        Ok(Self::new(class, name, descriptor))
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }
}

/// Key of the score table: which entity a score belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComplexityKey {
    Package(String),
    SourceFile(String),
    Class(String),
    Method(MethodData),
}

/// Complexity scores computed for one reporting pass. Lookups of entities
/// that were never scored return zero.
#[derive(Debug, Clone, Default)]
pub struct ComplexityData {
    project: f64,
    scores: HashMap<ComplexityKey, f64>,
}

impl ComplexityData {
    pub fn new(ccn_for_project: f64) -> Self {
        Self {
            project: ccn_for_project,
            scores: HashMap::new(),
        }
    }

    pub fn ccn_for_project(&self) -> f64 {
        self.project
    }

    pub fn add_ccn_for_package(&mut self, package: &PackageData, ccn: f64) {
        self.insert(ComplexityKey::Package(package.name().to_string()), ccn);
    }

    pub fn ccn_for_package(&self, package: &PackageData) -> f64 {
        self.get(&ComplexityKey::Package(package.name().to_string()))
    }

    pub fn add_ccn_for_source_file(&mut self, source_file: &SourceFileData, ccn: f64) {
        self.insert(ComplexityKey::SourceFile(source_file.name().to_string()), ccn);
    }

    pub fn ccn_for_source_file(&self, source_file: &SourceFileData) -> f64 {
        self.get(&ComplexityKey::SourceFile(source_file.name().to_string()))
    }

    pub fn add_ccn_for_class(&mut self, class: &ClassData, ccn: f64) {
        self.insert(ComplexityKey::Class(class.name().to_string()), ccn);
    }

    pub fn ccn_for_class(&self, class: &ClassData) -> f64 {
        self.get(&ComplexityKey::Class(class.name().to_string()))
    }

    pub fn add_ccn_for_method(&mut self, method: &MethodData, ccn: u32) {
        self.insert(ComplexityKey::Method(method.clone()), f64::from(ccn));
    }

    pub fn ccn_for_method(&self, method: &MethodData) -> u32 {
        // method scores are stored from u32 values, so the cast is exact
        self.get(&ComplexityKey::Method(method.clone())) as u32
    }

    /// Number of scored entities, not counting the project.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn contains(&self, key: &ComplexityKey) -> bool {
        self.scores.contains_key(key)
    }

    fn insert(&mut self, key: ComplexityKey, ccn: f64) {
        self.scores.insert(key, ccn);
    }

    fn get(&self, key: &ComplexityKey) -> f64 {
        self.scores.get(key).copied().unwrap_or(0.0)
    }
}
