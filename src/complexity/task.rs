use crate::complexity::{ComplexityAnalyzer, ComplexityData, MethodData, Scope};
use crate::coverage::{ClassData, PackageData, ProjectData, SourceFileData};
use crate::error::Result;

/// Walks a project once, depth first and in name order, asking the
/// analyzer for a score at every level.
///
/// A failing analyzer call leaves that entity unscored and the walk moves
/// on; only a malformed method token aborts the pass.
pub struct ComplexityTask<'a> {
    analyzer: &'a dyn ComplexityAnalyzer,
    calculate_method_complexity: bool,
}

impl<'a> ComplexityTask<'a> {
    pub fn new(analyzer: &'a dyn ComplexityAnalyzer) -> Self {
        Self {
            analyzer,
            calculate_method_complexity: false,
        }
    }

    /// Also score every method of every class.
    pub fn with_method_complexity(mut self, enabled: bool) -> Self {
        self.calculate_method_complexity = enabled;
        self
    }

    pub fn calculate_complexity(&self, project: &ProjectData) -> Result<ComplexityData> {
        let ccn_for_project = self.score(&Scope::Project(project)).unwrap_or(0.0);
        let mut data = ComplexityData::new(ccn_for_project);

        for package in project.packages() {
            self.calculate_package(&package, &mut data)?;
        }

        log::debug!(
            "complexity pass scored {} entities (project ccn {})",
            data.len(),
            ccn_for_project
        );
        Ok(data)
    }

    fn calculate_package(&self, package: &PackageData, data: &mut ComplexityData) -> Result<()> {
        if let Some(ccn) = self.score(&Scope::Package(package)) {
            data.add_ccn_for_package(package, ccn);
        }
        for source_file in package.source_files() {
            self.calculate_source_file(&source_file, data)?;
        }
        Ok(())
    }

    fn calculate_source_file(&self, source_file: &SourceFileData, data: &mut ComplexityData) -> Result<()> {
        if let Some(ccn) = self.score(&Scope::SourceFile(source_file)) {
            data.add_ccn_for_source_file(source_file, ccn);
        }
        for class in source_file.classes() {
            self.calculate_class(class, data)?;
        }
        Ok(())
    }

    fn calculate_class(&self, class: &ClassData, data: &mut ComplexityData) -> Result<()> {
        if let Some(ccn) = self.score(&Scope::Class(class)) {
            data.add_ccn_for_class(class, ccn);
        }
        if !self.calculate_method_complexity {
            return Ok(());
        }
        for token in class.method_names_and_descriptors() {
            let method = MethodData::from_token(class, &token)?;
            if let Some(ccn) = self.score(&Scope::Method {
                class,
                method: &method,
            }) {
                data.add_ccn_for_method(&method, ccn.max(0.0).round() as u32);
            }
        }
        Ok(())
    }

    fn score(&self, scope: &Scope<'_>) -> Option<f64> {
        match self.analyzer.score(scope) {
            Ok(ccn) => Some(ccn),
            Err(e) => {
                log::warn!("Could not compute complexity of {}: {}", scope, e);
                None
            }
        }
    }
}
