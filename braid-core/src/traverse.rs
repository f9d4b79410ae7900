//! Deterministic priority-ordered DAG traversal
//!
//! The shared walk used by `values`, append's predecessor selection, and
//! join's bookkeeping. The frontier is a max-heap keyed by the
//! last-write-wins order, so the greatest entry is always expanded first
//! and the visit order is a pure function of the index, the roots, and
//! the bound.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use braid_model::Hash;

use crate::entry::Entry;
use crate::order::last_write_wins;

/// Heap wrapper so `BinaryHeap` pops the greatest entry under the
/// last-write-wins order.
struct Frontier(Entry);

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.0.hash() == other.0.hash()
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        last_write_wins(&self.0, &other.0)
    }
}

/// Walk the DAG from `roots` toward predecessors, newest-first.
///
/// Visits each reachable entry at most once, expanding the greatest
/// frontier entry at every step. Predecessor hashes absent from `index`
/// are skipped silently (they are tail references). `amount` bounds the
/// number of entries visited; `None` walks the full reachable set.
///
/// A larger `amount` returns the smaller result as a prefix, which is
/// what lets append widen its predecessor set just by raising the bound.
pub fn traverse(index: &HashMap<Hash, Entry>, roots: &[Entry], amount: Option<usize>) -> Vec<Entry> {
    let mut frontier = BinaryHeap::with_capacity(roots.len());
    let mut seen: HashSet<Hash> = HashSet::with_capacity(roots.len());
    let mut visited = Vec::new();

    for root in roots {
        if seen.insert(root.hash()) {
            frontier.push(Frontier(root.clone()));
        }
    }

    loop {
        if amount.is_some_and(|limit| visited.len() >= limit) {
            break;
        }
        let Some(Frontier(entry)) = frontier.pop() else {
            break;
        };
        for hash in entry.next() {
            if seen.contains(hash) {
                continue;
            }
            if let Some(parent) = index.get(hash) {
                seen.insert(*hash);
                frontier.push(Frontier(parent.clone()));
            }
        }
        visited.push(entry);
    }

    visited
}
