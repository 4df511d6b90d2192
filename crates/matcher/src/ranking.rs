//! Bounded top-n ranking

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Candidate index with its score
///
/// Ordered so that "greater" means "ranks higher": higher score first,
/// then lower candidate index.
#[derive(Debug, Clone, Copy)]
pub struct Ranked {
    pub index: usize,
    pub score: f32,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.index.cmp(&self.index))
    }
}

/// Keeps the `n` highest-ranked entries seen so far
///
/// Backed by a min-heap of at most `n` entries whose root is the current
/// worst, so each push is O(log n) and memory stays O(n).
#[derive(Debug)]
pub struct TopN {
    capacity: usize,
    heap: BinaryHeap<Reverse<Ranked>>,
}

impl TopN {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity.saturating_add(1)),
        }
    }

    pub fn push(&mut self, index: usize, score: f32) {
        if self.capacity == 0 {
            return;
        }

        let entry = Ranked { index, score };
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(entry));
            return;
        }

        if let Some(mut worst) = self.heap.peek_mut() {
            if entry > worst.0 {
                *worst = Reverse(entry);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Entries best first
    pub fn into_sorted_vec(self) -> Vec<Ranked> {
        // Ascending order of Reverse<_> is descending rank
        self.heap.into_sorted_vec().into_iter().map(|r| r.0).collect()
    }
}
