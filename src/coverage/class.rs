use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::coverage::line::{LineData, JUMP_OUTCOMES};
use crate::coverage::snapshot::ClassSnapshot;
use crate::model::{CoverageContainer, CoverageCounts};

/// Extension used when a class never reported its source file.
const DEFAULT_SOURCE_EXTENSION: &str = ".java";

/// Coverage data for one class, keyed by 1-based line number.
///
/// The line table is a sharded concurrent map, so hits on different lines
/// of the same class rarely contend, and a hit on an existing line only
/// takes a shard read lock before bumping an atomic.
#[derive(Debug)]
pub struct ClassData {
    name: String,
    source_file_base: RwLock<Option<String>>,
    lines: DashMap<u32, Arc<LineData>>,
}

impl ClassData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_file_base: RwLock::new(None),
            lines: DashMap::new(),
        }
    }

    pub(crate) fn from_snapshot(snapshot: &ClassSnapshot) -> Self {
        let class = Self::new(snapshot.name.clone());
        if let Some(base) = &snapshot.source_file {
            class.set_source_file_name(base);
        }
        for line in &snapshot.lines {
            class
                .lines
                .insert(line.number, Arc::new(LineData::from_snapshot(line)));
        }
        class
    }

    /// Fully qualified name, e.g. `com.example.Foo$Inner`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Everything before the last `.`, or the empty default package.
    pub fn package_name(&self) -> &str {
        match self.name.rfind('.') {
            Some(idx) => &self.name[..idx],
            None => "",
        }
    }

    /// The class name without its package.
    pub fn base_name(&self) -> &str {
        match self.name.rfind('.') {
            Some(idx) => &self.name[idx + 1..],
            None => &self.name,
        }
    }

    /// Record the file name (without directories) this class was compiled
    /// from.
    pub fn set_source_file_name(&self, base: &str) {
        *self.source_file_base.write() = Some(base.to_string());
    }

    /// Path of the source file relative to a source root, e.g.
    /// `com/example/Foo.java`. Inner classes resolve to their outer
    /// class's file when no explicit name was recorded.
    pub fn source_file_name(&self) -> String {
        let base = match self.source_file_base.read().as_deref() {
            Some(base) => base.to_string(),
            None => {
                let base = self.base_name();
                let outer = match base.find('$') {
                    Some(idx) if idx > 0 => &base[..idx],
                    _ => base,
                };
                format!("{}{}", outer, DEFAULT_SOURCE_EXTENSION)
            }
        };
        let package = self.package_name();
        if package.is_empty() {
            base
        } else {
            format!("{}/{}", package.replace('.', "/"), base)
        }
    }

    pub fn line(&self, number: u32) -> Option<Arc<LineData>> {
        self.lines.get(&number).map(|l| Arc::clone(l.value()))
    }

    pub fn get_or_create_line(&self, number: u32) -> Arc<LineData> {
        if let Some(line) = self.lines.get(&number) {
            return Arc::clone(line.value());
        }
        Arc::clone(
            self.lines
                .entry(number)
                .or_insert_with(|| Arc::new(LineData::new(number)))
                .value(),
        )
    }

    /// Declare an instrumented line belonging to the given method.
    pub fn add_line(&self, number: u32, method_name: &str, method_descriptor: &str) -> Arc<LineData> {
        let line = self.get_or_create_line(number);
        line.set_method(method_name, method_descriptor);
        line
    }

    /// Declare a two-way jump as condition `condition` of `line`.
    pub fn add_jump(&self, line: u32, condition: usize) {
        self.get_or_create_line(line)
            .add_condition(condition, JUMP_OUTCOMES);
    }

    /// Declare a switch with `cases` explicit cases plus a default outcome.
    pub fn add_switch(&self, line: u32, condition: usize, cases: usize) {
        self.get_or_create_line(line).add_condition(condition, cases.saturating_add(1));
    }

    #[inline]
    pub fn touch(&self, line: u32) {
        match self.lines.get(&line) {
            Some(data) => data.touch(),
            None => self.get_or_create_line(line).touch(),
        }
    }

    pub fn touch_branch(&self, line: u32, condition: usize, outcome: usize) {
        self.get_or_create_line(line).touch_branch(condition, outcome);
    }

    /// All lines, sorted by line number.
    pub fn lines(&self) -> Vec<Arc<LineData>> {
        let mut lines: Vec<_> = self.lines.iter().map(|l| Arc::clone(l.value())).collect();
        lines.sort_by_key(|l| l.number());
        lines
    }

    pub fn number_of_lines(&self) -> usize {
        self.lines.len()
    }

    pub fn is_valid_source_line_number(&self, number: u32) -> bool {
        self.lines.contains_key(&number)
    }

    /// Distinct `name(descriptor)` tokens of every method seen on a line,
    /// in sorted order.
    pub fn method_names_and_descriptors(&self) -> BTreeSet<String> {
        self.lines
            .iter()
            .filter_map(|l| l.value().method())
            .map(|m| m.token())
            .collect()
    }

    pub fn snapshot(&self) -> ClassSnapshot {
        ClassSnapshot {
            name: self.name.clone(),
            source_file: self.source_file_base.read().clone(),
            lines: self.lines().iter().map(|l| l.snapshot()).collect(),
        }
    }

    /// Add the counters of `other` into this class, creating missing lines.
    pub(crate) fn absorb(&self, other: &ClassSnapshot) {
        if let Some(base) = &other.source_file {
            let mut current = self.source_file_base.write();
            if current.is_none() {
                *current = Some(base.clone());
            }
        }
        for line in &other.lines {
            self.get_or_create_line(line.number).absorb(line);
        }
    }

    pub(crate) fn mark_saved(&self, observed: &ClassSnapshot) {
        for seen in &observed.lines {
            if let Some(line) = self.line(seen.number) {
                line.mark_saved(seen);
            }
        }
    }
}

impl CoverageContainer for ClassData {
    fn counts(&self) -> CoverageCounts {
        self.lines.iter().map(|l| l.value().counts()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_and_base_name() {
        let class = ClassData::new("com.example.Foo");
        assert_eq!(class.package_name(), "com.example");
        assert_eq!(class.base_name(), "Foo");

        let class = ClassData::new("Toplevel");
        assert_eq!(class.package_name(), "");
        assert_eq!(class.base_name(), "Toplevel");
    }

    #[test]
    fn test_source_file_name_derived() {
        assert_eq!(
            ClassData::new("com.example.Foo$Inner").source_file_name(),
            "com/example/Foo.java"
        );
        assert_eq!(ClassData::new("Main").source_file_name(), "Main.java");
    }

    #[test]
    fn test_source_file_name_explicit() {
        let class = ClassData::new("com.example.Helper");
        class.set_source_file_name("Utilities.kt");
        assert_eq!(class.source_file_name(), "com/example/Utilities.kt");
    }

    #[test]
    fn test_touch_creates_line() {
        let class = ClassData::new("a.B");
        class.touch(4);
        class.touch(4);
        assert_eq!(class.line(4).unwrap().hits(), 2);
        assert!(class.is_valid_source_line_number(4));
        assert!(!class.is_valid_source_line_number(5));
    }

    #[test]
    fn test_counts_sum_lines() {
        let class = ClassData::new("a.B");
        class.add_line(1, "run", "()V");
        class.add_line(2, "run", "()V");
        class.touch(1);
        assert_eq!(class.number_of_valid_lines(), 2);
        assert_eq!(class.number_of_covered_lines(), 1);
        assert_eq!(class.line_coverage_rate(), 0.5);
        assert_eq!(class.number_of_valid_branches(), 0);
    }

    #[test]
    fn test_switch_outcomes_include_default() {
        let class = ClassData::new("a.B");
        class.add_switch(9, 0, 3);
        class.touch_branch(9, 0, 3);
        assert_eq!(class.number_of_valid_branches(), 4);
        assert_eq!(class.number_of_covered_branches(), 1);
    }

    #[test]
    fn test_method_tokens_sorted_and_distinct() {
        let class = ClassData::new("a.B");
        class.add_line(1, "zeta", "()V");
        class.add_line(2, "alpha", "(I)I");
        class.add_line(3, "alpha", "(I)I");
        let tokens: Vec<_> = class.method_names_and_descriptors().into_iter().collect();
        assert_eq!(tokens, vec!["alpha(I)I".to_string(), "zeta()V".to_string()]);
    }
}
