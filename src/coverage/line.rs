use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::coverage::snapshot::{ConditionSnapshot, LineSnapshot};
use crate::model::CoverageCounts;

/// Number of outcomes of a two-way jump (taken / not taken).
pub const JUMP_OUTCOMES: usize = 2;

/// Largest condition index or outcome a line accepts. Branch hits beyond
/// it are dropped.
pub const MAX_BRANCH_INDEX: usize = u16::MAX as usize;

/// A hit counter plus the portion of it already written to the snapshot
/// store. `hits - saved` is the delta the next save must add on disk.
#[derive(Debug, Default)]
pub(crate) struct Counter {
    hits: AtomicU64,
    saved: AtomicU64,
}

impl Counter {
    /// A counter whose whole value is already persisted.
    pub(crate) fn persisted(value: u64) -> Self {
        Self {
            hits: AtomicU64::new(value),
            saved: AtomicU64::new(value),
        }
    }

    #[inline]
    pub(crate) fn increment(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(&self, hits: u64) {
        self.hits.fetch_add(hits, Ordering::Relaxed);
    }

    pub(crate) fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub(crate) fn saved(&self) -> u64 {
        self.saved.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_saved(&self, observed: u64) {
        self.saved.fetch_max(observed, Ordering::Relaxed);
    }
}

/// One branch condition on a line: a fixed number of outcomes, each
/// covered independently.
#[derive(Debug)]
pub struct ConditionData {
    outcomes: Box<[Counter]>,
}

impl ConditionData {
    pub(crate) fn new(outcomes: usize) -> Self {
        Self {
            outcomes: (0..outcomes.max(1)).map(|_| Counter::default()).collect(),
        }
    }

    pub(crate) fn from_snapshot(snapshot: &ConditionSnapshot) -> Self {
        Self {
            outcomes: snapshot
                .hits
                .iter()
                .map(|&h| Counter::persisted(h))
                .collect(),
        }
    }

    pub fn outcome_count(&self) -> usize {
        self.outcomes.len()
    }

    /// Grow to `outcomes` outcomes, keeping the existing counters.
    fn widen(&mut self, outcomes: usize) {
        if outcomes <= self.outcomes.len() {
            return;
        }
        let mut counters = std::mem::take(&mut self.outcomes).into_vec();
        counters.resize_with(outcomes, Counter::default);
        self.outcomes = counters.into_boxed_slice();
    }

    /// Returns false when `outcome` is outside this condition.
    fn touch(&self, outcome: usize) -> bool {
        match self.outcomes.get(outcome) {
            Some(counter) => {
                counter.increment();
                true
            }
            None => false,
        }
    }

    fn snapshot(&self) -> ConditionSnapshot {
        ConditionSnapshot {
            hits: self.outcomes.iter().map(Counter::hits).collect(),
            saved: self.outcomes.iter().map(Counter::saved).collect(),
        }
    }
}

/// Name and descriptor of the method a line belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodSignature {
    pub name: String,
    pub descriptor: String,
}

impl MethodSignature {
    /// The combined `name(descriptor)` token.
    #[must_use]
    pub fn token(&self) -> String {
        format!("{}{}", self.name, self.descriptor)
    }
}

/// Coverage state of a single source line.
///
/// The hit counter and every condition outcome are atomics, so recording a
/// hit never takes more than a shared read lock on the condition list.
#[derive(Debug)]
pub struct LineData {
    number: u32,
    method: RwLock<Option<MethodSignature>>,
    hits: Counter,
    conditions: RwLock<Vec<ConditionData>>,
}

impl LineData {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            method: RwLock::new(None),
            hits: Counter::default(),
            conditions: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn from_snapshot(snapshot: &LineSnapshot) -> Self {
        let method = match (&snapshot.method_name, &snapshot.method_descriptor) {
            (Some(name), Some(descriptor)) => Some(MethodSignature {
                name: name.clone(),
                descriptor: descriptor.clone(),
            }),
            _ => None,
        };
        Self {
            number: snapshot.number,
            method: RwLock::new(method),
            hits: Counter::persisted(snapshot.hits),
            conditions: RwLock::new(
                snapshot
                    .conditions
                    .iter()
                    .map(ConditionData::from_snapshot)
                    .collect(),
            ),
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn hits(&self) -> u64 {
        self.hits.hits()
    }

    pub fn is_covered(&self) -> bool {
        self.hits() > 0
    }

    pub fn method(&self) -> Option<MethodSignature> {
        self.method.read().clone()
    }

    /// Attach method information. The first declaration wins.
    pub fn set_method(&self, name: &str, descriptor: &str) {
        let mut method = self.method.write();
        if method.is_none() {
            *method = Some(MethodSignature {
                name: name.to_string(),
                descriptor: descriptor.to_string(),
            });
        }
    }

    #[inline]
    pub fn touch(&self) {
        self.hits.increment();
    }

    /// Declare condition `index` with `outcomes` outcomes. An already
    /// declared condition keeps its size and counts.
    pub fn add_condition(&self, index: usize, outcomes: usize) {
        if index > MAX_BRANCH_INDEX {
            log::trace!("ignoring condition {} on line {}: index too large", index, self.number);
            return;
        }
        let outcomes = outcomes.min(MAX_BRANCH_INDEX + 1);
        let mut conditions = self.conditions.write();
        if index < conditions.len() {
            return;
        }
        while conditions.len() < index {
            conditions.push(ConditionData::new(JUMP_OUTCOMES));
        }
        conditions.push(ConditionData::new(outcomes));
    }

    /// Record one hit of `outcome` on condition `condition`.
    ///
    /// An undeclared condition is created on the fly, wide enough to hold
    /// the outcome. Outcomes outside a declared condition are dropped.
    pub fn touch_branch(&self, condition: usize, outcome: usize) {
        if condition > MAX_BRANCH_INDEX || outcome > MAX_BRANCH_INDEX {
            log::trace!(
                "dropping outcome {} of condition {} on line {}: index too large",
                outcome,
                condition,
                self.number
            );
            return;
        }
        {
            let conditions = self.conditions.read();
            if let Some(data) = conditions.get(condition) {
                if !data.touch(outcome) {
                    log::trace!(
                        "dropping outcome {} of condition {} on line {}: condition has {} outcomes",
                        outcome,
                        condition,
                        self.number,
                        data.outcome_count()
                    );
                }
                return;
            }
        }
        self.add_condition(condition, JUMP_OUTCOMES.max(outcome.saturating_add(1)));
        let conditions = self.conditions.read();
        if let Some(data) = conditions.get(condition) {
            data.touch(outcome);
        }
    }

    pub fn has_branch(&self) -> bool {
        !self.conditions.read().is_empty()
    }

    pub fn condition_size(&self) -> usize {
        self.conditions.read().len()
    }

    pub fn counts(&self) -> CoverageCounts {
        let conditions = self.conditions.read();
        let mut counts = CoverageCounts {
            valid_lines: 1,
            covered_lines: u64::from(self.is_covered()),
            ..Default::default()
        };
        for condition in conditions.iter() {
            for outcome in condition.outcomes.iter() {
                counts.valid_branches += 1;
                if outcome.hits() > 0 {
                    counts.covered_branches += 1;
                }
            }
        }
        counts
    }

    /// Point-in-time copy of this line.
    pub fn snapshot(&self) -> LineSnapshot {
        let method = self.method();
        LineSnapshot {
            number: self.number,
            method_name: method.as_ref().map(|m| m.name.clone()),
            method_descriptor: method.map(|m| m.descriptor),
            hits: self.hits.hits(),
            saved_hits: self.hits.saved(),
            conditions: self
                .conditions
                .read()
                .iter()
                .map(ConditionData::snapshot)
                .collect(),
        }
    }

    /// Add the counters of `other` to this line. Conditions narrower than
    /// their counterpart in `other` are widened first.
    pub(crate) fn absorb(&self, other: &LineSnapshot) {
        if let (Some(name), Some(descriptor)) = (&other.method_name, &other.method_descriptor) {
            self.set_method(name, descriptor);
        }
        self.hits.add(other.hits);
        for (index, condition) in other.conditions.iter().enumerate() {
            self.add_condition(index, condition.hits.len());
            let mut conditions = self.conditions.write();
            let Some(target) = conditions.get_mut(index) else {
                continue;
            };
            target.widen(condition.hits.len().min(MAX_BRANCH_INDEX + 1));
            for (counter, &hits) in target.outcomes.iter().zip(&condition.hits) {
                counter.add(hits);
            }
        }
    }

    /// Record that the values in `observed` are now on disk.
    pub(crate) fn mark_saved(&self, observed: &LineSnapshot) {
        self.hits.mark_saved(observed.hits);
        let conditions = self.conditions.read();
        for (condition, seen) in conditions.iter().zip(&observed.conditions) {
            for (counter, &hits) in condition.outcomes.iter().zip(&seen.hits) {
                counter.mark_saved(hits);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_without_branches() {
        let line = LineData::new(7);
        assert!(!line.has_branch());
        assert_eq!(line.counts().valid_lines, 1);
        assert_eq!(line.counts().covered_lines, 0);
        line.touch();
        line.touch();
        assert_eq!(line.hits(), 2);
        assert_eq!(line.counts().covered_lines, 1);
    }

    #[test]
    fn test_jump_half_covered() {
        let line = LineData::new(3);
        line.add_condition(0, JUMP_OUTCOMES);
        line.touch_branch(0, 1);
        let counts = line.counts();
        assert_eq!(counts.valid_branches, 2);
        assert_eq!(counts.covered_branches, 1);
        assert_eq!(counts.branch_rate(), 0.5);
    }

    #[test]
    fn test_undeclared_condition_is_created() {
        let line = LineData::new(3);
        line.touch_branch(1, 3);
        assert_eq!(line.condition_size(), 2);
        let snap = line.snapshot();
        assert_eq!(snap.conditions[0].hits, vec![0, 0]);
        assert_eq!(snap.conditions[1].hits, vec![0, 0, 0, 1]);
    }

    #[test]
    fn test_out_of_range_outcome_is_dropped() {
        let line = LineData::new(3);
        line.add_condition(0, JUMP_OUTCOMES);
        line.touch_branch(0, 5);
        assert_eq!(line.condition_size(), 1);
        assert_eq!(line.counts().covered_branches, 0);
    }

    #[test]
    fn test_redeclaring_condition_keeps_counts() {
        let line = LineData::new(3);
        line.add_condition(0, 3);
        line.touch_branch(0, 2);
        line.add_condition(0, JUMP_OUTCOMES);
        assert_eq!(line.snapshot().conditions[0].hits, vec![0, 0, 1]);
    }

    #[test]
    fn test_huge_branch_indices_are_dropped() {
        let line = LineData::new(3);
        line.touch_branch(0, usize::MAX);
        line.touch_branch(1 << 40, 0);
        line.touch_branch(0, MAX_BRANCH_INDEX + 1);
        assert!(!line.has_branch());

        line.touch_branch(0, MAX_BRANCH_INDEX);
        let snap = line.snapshot();
        assert_eq!(snap.conditions[0].outcome_count(), MAX_BRANCH_INDEX + 1);
        assert_eq!(snap.conditions[0].hits[MAX_BRANCH_INDEX], 1);
    }

    #[test]
    fn test_huge_switch_is_capped() {
        let line = LineData::new(3);
        line.add_condition(0, usize::MAX);
        line.add_condition(usize::MAX, JUMP_OUTCOMES);
        assert_eq!(line.condition_size(), 1);
        assert_eq!(line.snapshot().conditions[0].outcome_count(), MAX_BRANCH_INDEX + 1);
    }

    #[test]
    fn test_absorb_widens_narrow_condition() {
        let line = LineData::new(1);
        line.touch_branch(0, 0);

        let wider = LineData::new(1);
        wider.add_condition(0, 4);
        wider.touch_branch(0, 3);
        line.absorb(&wider.snapshot());

        assert_eq!(line.snapshot().conditions[0].hits, vec![1, 0, 0, 1]);
    }

    #[test]
    fn test_first_method_declaration_wins() {
        let line = LineData::new(1);
        line.set_method("run", "()V");
        line.set_method("other", "(I)V");
        let method = line.method().unwrap();
        assert_eq!(method.token(), "run()V");
    }

    #[test]
    fn test_mark_saved_tracks_delta() {
        let line = LineData::new(1);
        line.touch();
        let observed = line.snapshot();
        line.touch();
        line.mark_saved(&observed);
        let snap = line.snapshot();
        assert_eq!(snap.hits, 2);
        assert_eq!(snap.saved_hits, 1);
        assert_eq!(snap.unsaved_hits(), 1);
    }
}
