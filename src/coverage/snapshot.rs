//! Plain, owned copies of the live hierarchy. A snapshot is what the store
//! reads and writes and what the report façade hands out per line; it never
//! changes after it is taken.

use serde::Serialize;

use crate::model::{rate, CoverageCounts};

/// Outcome counters of one branch condition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConditionSnapshot {
    /// Hits per outcome, in declaration order.
    pub hits: Vec<u64>,
    /// Portion of each outcome already written to the store.
    #[serde(skip)]
    pub saved: Vec<u64>,
}

impl ConditionSnapshot {
    pub fn outcome_count(&self) -> usize {
        self.hits.len()
    }

    pub fn covered_outcomes(&self) -> usize {
        self.hits.iter().filter(|&&h| h > 0).count()
    }

    #[must_use]
    pub fn coverage_rate(&self) -> f64 {
        rate(self.covered_outcomes() as u64, self.outcome_count() as u64)
    }

    /// Hits of outcome `index` not yet written to the store.
    pub fn unsaved_hits(&self, index: usize) -> u64 {
        let hits = self.hits.get(index).copied().unwrap_or(0);
        let saved = self.saved.get(index).copied().unwrap_or(0);
        hits.saturating_sub(saved)
    }
}

/// One line of a class at the moment the snapshot was taken.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LineSnapshot {
    pub number: u32,
    pub method_name: Option<String>,
    pub method_descriptor: Option<String>,
    pub hits: u64,
    #[serde(skip)]
    pub saved_hits: u64,
    pub conditions: Vec<ConditionSnapshot>,
}

impl LineSnapshot {
    pub fn has_branch(&self) -> bool {
        !self.conditions.is_empty()
    }

    pub fn is_covered(&self) -> bool {
        self.hits > 0
    }

    pub fn unsaved_hits(&self) -> u64 {
        self.hits.saturating_sub(self.saved_hits)
    }

    pub fn counts(&self) -> CoverageCounts {
        CoverageCounts {
            valid_lines: 1,
            covered_lines: u64::from(self.is_covered()),
            valid_branches: self
                .conditions
                .iter()
                .map(|c| c.outcome_count() as u64)
                .sum(),
            covered_branches: self
                .conditions
                .iter()
                .map(|c| c.covered_outcomes() as u64)
                .sum(),
        }
    }
}

/// One class with all of its lines, sorted by line number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassSnapshot {
    pub name: String,
    pub source_file: Option<String>,
    pub lines: Vec<LineSnapshot>,
}

/// A whole project, classes sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectSnapshot {
    pub classes: Vec<ClassSnapshot>,
}

impl ProjectSnapshot {
    pub fn counts(&self) -> CoverageCounts {
        self.classes
            .iter()
            .flat_map(|c| c.lines.iter())
            .map(LineSnapshot::counts)
            .sum()
    }
}
