use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::complexity::MethodData;
use crate::coverage::{ClassData, PackageData, ProjectData, SourceFileData};
use crate::error::{CovtrackError, Result};

/// The entity an analyzer is asked to score.
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    Project(&'a ProjectData),
    Package(&'a PackageData),
    SourceFile(&'a SourceFileData),
    Class(&'a ClassData),
    Method {
        class: &'a ClassData,
        method: &'a MethodData,
    },
}

impl fmt::Display for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Project(_) => f.write_str("project"),
            Scope::Package(p) => write!(f, "package '{}'", p.name()),
            Scope::SourceFile(s) => write!(f, "source file '{}'", s.name()),
            Scope::Class(c) => write!(f, "class '{}'", c.name()),
            Scope::Method { class, method } => write!(
                f,
                "method '{}.{}{}'",
                class.name(),
                method.name(),
                method.descriptor()
            ),
        }
    }
}

/// Computes a complexity score for one entity. How scores of nested
/// entities combine is entirely up to the implementation.
pub trait ComplexityAnalyzer {
    /// Score `scope`. An error leaves the entity unscored for this pass.
    fn score(&self, scope: &Scope<'_>) -> Result<f64>;
}

impl<F> ComplexityAnalyzer for F
where
    F: Fn(&Scope<'_>) -> Result<f64>,
{
    fn score(&self, scope: &Scope<'_>) -> Result<f64> {
        self(scope)
    }
}

/// Scores produced ahead of time by an external tool.
///
/// ```json
/// {
///   "project": 2.5,
///   "packages": { "com.example": 2.5 },
///   "source_files": { "com/example/Foo.java": 3.0 },
///   "classes": { "com.example.Foo": 3.0 },
///   "methods": { "com.example.Foo.run()V": 4 }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScoreFileAnalyzer {
    project: Option<f64>,
    packages: HashMap<String, f64>,
    source_files: HashMap<String, f64>,
    classes: HashMap<String, f64>,
    methods: HashMap<String, u32>,
}

impl ScoreFileAnalyzer {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

impl ComplexityAnalyzer for ScoreFileAnalyzer {
    fn score(&self, scope: &Scope<'_>) -> Result<f64> {
        let found = match scope {
            Scope::Project(_) => self.project,
            Scope::Package(p) => self.packages.get(p.name()).copied(),
            Scope::SourceFile(s) => self.source_files.get(s.name()).copied(),
            Scope::Class(c) => self.classes.get(c.name()).copied(),
            Scope::Method { class, method } => {
                let key = format!("{}.{}{}", class.name(), method.name(), method.descriptor());
                self.methods.get(&key).copied().map(f64::from)
            }
        };
        found.ok_or_else(|| CovtrackError::Analyzer(format!("no score recorded for {}", scope)))
    }
}
