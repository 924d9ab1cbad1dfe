//! Interval index over flags.
//!
//! Flags are kept sorted by `(start, id)`. A segment tree over that order
//! records the maximum end of each subtree, with open ends stored as +inf.
//! A query walks the tree in order and skips any subtree that starts after
//! the range or ends at or before it, so results come out already sorted.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::flag::{Flag, FlagId};
use crate::interval::TimeRange;

#[derive(Debug, Clone, Default)]
pub struct IntervalIndex {
    flags: Vec<Flag>,
    max_end: Vec<f64>,
}

impl IntervalIndex {
    pub fn new(mut flags: Vec<Flag>) -> Self {
        flags.sort_by(order_by_start);
        Self::from_sorted(flags)
    }

    /// This index with `changed` merged in, replacing entries with the same id.
    ///
    /// Linear in the size of the index; the unchanged entries are not re-sorted.
    pub fn merged(&self, mut changed: Vec<Flag>) -> Self {
        if changed.is_empty() {
            return self.clone();
        }
        changed.sort_by(order_by_start);
        let replaced: HashSet<FlagId> = changed.iter().map(|flag| flag.id).collect();

        let mut kept = self
            .flags
            .iter()
            .filter(|flag| !replaced.contains(&flag.id))
            .peekable();
        let mut fresh = changed.into_iter().peekable();
        let mut flags = Vec::with_capacity(self.flags.len() + fresh.len());
        loop {
            let take_kept = match (kept.peek(), fresh.peek()) {
                (Some(a), Some(b)) => order_by_start(a, b) != Ordering::Greater,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            if take_kept {
                flags.extend(kept.next().cloned());
            } else {
                flags.extend(fresh.next());
            }
        }
        Self::from_sorted(flags)
    }

    fn from_sorted(flags: Vec<Flag>) -> Self {
        let mut index = Self {
            max_end: vec![f64::NEG_INFINITY; 4 * flags.len().max(1)],
            flags,
        };
        if !index.flags.is_empty() {
            index.build(1, 0, index.flags.len());
        }
        index
    }

    fn build(&mut self, node: usize, lo: usize, hi: usize) -> f64 {
        let max = if hi - lo == 1 {
            self.flags[lo].interval.end_or_inf()
        } else {
            let mid = (lo + hi) / 2;
            let left = self.build(2 * node, lo, mid);
            let right = self.build(2 * node + 1, mid, hi);
            left.max(right)
        };
        self.max_end[node] = max;
        max
    }

    /// Flags overlapping `range`, ascending by start then id.
    pub fn query(&self, range: &TimeRange) -> Vec<&Flag> {
        let mut out = Vec::new();
        if !self.flags.is_empty() {
            self.collect(1, 0, self.flags.len(), range, &mut out);
        }
        out
    }

    fn collect<'a>(
        &'a self,
        node: usize,
        lo: usize,
        hi: usize,
        range: &TimeRange,
        out: &mut Vec<&'a Flag>,
    ) {
        // Sorted by start, so the first entry has the smallest start.
        if self.flags[lo].start() > range.upper() || self.max_end[node] <= range.lower() {
            return;
        }
        if hi - lo == 1 {
            let flag = &self.flags[lo];
            if range.overlaps(&flag.interval) {
                out.push(flag);
            }
            return;
        }
        let mid = (lo + hi) / 2;
        self.collect(2 * node, lo, mid, range, out);
        self.collect(2 * node + 1, mid, hi, range, out);
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.flags.iter()
    }
}

pub(crate) fn order_by_start(a: &Flag, b: &Flag) -> Ordering {
    a.start().total_cmp(&b.start()).then(a.id.cmp(&b.id))
}
