//! Shared coverage arithmetic. Every container in the hierarchy (project,
//! package, source file, class) reports a `CoverageCounts` computed from its
//! children at query time; rates are always derived from those counts.

use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::Serialize;

/// Compute a coverage rate, returning 0.0 when the total is zero.
#[must_use]
pub fn rate(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64
    }
}

/// Valid and covered line/branch totals for one container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoverageCounts {
    pub valid_lines: u64,
    pub covered_lines: u64,
    pub valid_branches: u64,
    pub covered_branches: u64,
}

impl CoverageCounts {
    #[must_use]
    pub fn line_rate(&self) -> f64 {
        rate(self.covered_lines, self.valid_lines)
    }

    #[must_use]
    pub fn branch_rate(&self) -> f64 {
        rate(self.covered_branches, self.valid_branches)
    }
}

impl Add for CoverageCounts {
    type Output = CoverageCounts;

    fn add(mut self, rhs: CoverageCounts) -> CoverageCounts {
        self += rhs;
        self
    }
}

impl AddAssign for CoverageCounts {
    fn add_assign(&mut self, rhs: CoverageCounts) {
        self.valid_lines += rhs.valid_lines;
        self.covered_lines += rhs.covered_lines;
        self.valid_branches += rhs.valid_branches;
        self.covered_branches += rhs.covered_branches;
    }
}

impl Sum for CoverageCounts {
    fn sum<I: Iterator<Item = CoverageCounts>>(iter: I) -> Self {
        iter.fold(CoverageCounts::default(), Add::add)
    }
}

/// A node of the coverage hierarchy that can summarize itself.
///
/// Implementors only provide `counts`, which must be the sum of the same
/// query over their children. The remaining methods are derived.
pub trait CoverageContainer {
    fn counts(&self) -> CoverageCounts;

    fn number_of_valid_lines(&self) -> u64 {
        self.counts().valid_lines
    }

    fn number_of_covered_lines(&self) -> u64 {
        self.counts().covered_lines
    }

    fn number_of_valid_branches(&self) -> u64 {
        self.counts().valid_branches
    }

    fn number_of_covered_branches(&self) -> u64 {
        self.counts().covered_branches
    }

    /// Covered / valid lines, or 0.0 when nothing is instrumented.
    fn line_coverage_rate(&self) -> f64 {
        self.counts().line_rate()
    }

    /// Covered / valid branches, or 0.0 when there are no branches.
    fn branch_coverage_rate(&self) -> f64 {
        self.counts().branch_rate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_zero_total() {
        assert_eq!(rate(0, 0), 0.0);
        assert_eq!(rate(1, 2), 0.5);
    }

    #[test]
    fn test_counts_sum() {
        let a = CoverageCounts {
            valid_lines: 2,
            covered_lines: 1,
            valid_branches: 2,
            covered_branches: 1,
        };
        let b = CoverageCounts {
            valid_lines: 3,
            covered_lines: 3,
            ..Default::default()
        };
        let total: CoverageCounts = [a, b].into_iter().sum();
        assert_eq!(total.valid_lines, 5);
        assert_eq!(total.covered_lines, 4);
        assert_eq!(total.line_rate(), 0.8);
        assert_eq!(total.branch_rate(), 0.5);
    }

    #[test]
    fn test_empty_counts_have_zero_rates() {
        let empty = CoverageCounts::default();
        assert_eq!(empty.line_rate(), 0.0);
        assert_eq!(empty.branch_rate(), 0.0);
    }
}
