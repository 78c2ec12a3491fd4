//! Duplicate suppression for bare-node worklists.
//!
//! A node enters the bag only if it is not already a member; membership is
//! released on pop, before the node is relaxed, so a later improvement can
//! re-queue it. Three set flavors: a per-node marker byte, and two-level
//! (sharded) hash and ordered sets keyed by `node >> k`.

use std::collections::{BTreeSet, HashSet};

use parking_lot::Mutex;

use super::{Worklist, WorklistHandle};
use crate::graph::CsrGraph;

pub trait NodeSet: Sync {
    /// Returns true for the first inserter.
    fn insert(&self, node: u32) -> bool;
    fn remove(&self, node: u32);
}

/// Membership tracked by the per-node marker byte in the graph itself.
pub struct MarkingSet<'g> {
    graph: &'g CsrGraph,
}

impl<'g> MarkingSet<'g> {
    pub fn new(graph: &'g CsrGraph) -> Self {
        Self { graph }
    }
}

impl NodeSet for MarkingSet<'_> {
    #[inline]
    fn insert(&self, node: u32) -> bool {
        self.graph.node(node).mark()
    }

    #[inline]
    fn remove(&self, node: u32) {
        self.graph.node(node).unmark();
    }
}

/// Picks a shard shift so that `node >> shift` lands in `shard_count` bins.
fn shard_shift(num_nodes: usize, shard_count: usize) -> u32 {
    let mut shift = 0;
    while (num_nodes >> shift) > shard_count {
        shift += 1;
    }
    shift
}

const SHARDS: usize = 256;

pub struct TwoLevelHashSet {
    shards: Box<[Mutex<HashSet<u32>>]>,
    shift: u32,
}

impl TwoLevelHashSet {
    pub fn new(num_nodes: usize) -> Self {
        let shards = (0..SHARDS).map(|_| Mutex::new(HashSet::new())).collect();
        Self {
            shards,
            shift: shard_shift(num_nodes, SHARDS),
        }
    }

    #[inline]
    fn shard(&self, node: u32) -> &Mutex<HashSet<u32>> {
        &self.shards[(node >> self.shift) as usize % SHARDS]
    }
}

impl NodeSet for TwoLevelHashSet {
    #[inline]
    fn insert(&self, node: u32) -> bool {
        self.shard(node).lock().insert(node)
    }

    #[inline]
    fn remove(&self, node: u32) {
        self.shard(node).lock().remove(&node);
    }
}

pub struct TwoLevelOrderedSet {
    shards: Box<[Mutex<BTreeSet<u32>>]>,
    shift: u32,
}

impl TwoLevelOrderedSet {
    pub fn new(num_nodes: usize) -> Self {
        let shards = (0..SHARDS).map(|_| Mutex::new(BTreeSet::new())).collect();
        Self {
            shards,
            shift: shard_shift(num_nodes, SHARDS),
        }
    }

    #[inline]
    fn shard(&self, node: u32) -> &Mutex<BTreeSet<u32>> {
        &self.shards[(node >> self.shift) as usize % SHARDS]
    }
}

impl NodeSet for TwoLevelOrderedSet {
    #[inline]
    fn insert(&self, node: u32) -> bool {
        self.shard(node).lock().insert(node)
    }

    #[inline]
    fn remove(&self, node: u32) {
        self.shard(node).lock().remove(&node);
    }
}

/// A worklist wrapper that drops duplicate pushes and clears membership on
/// pop. Exactly one suppression policy is active per solve.
pub struct WorkSet<W, S> {
    inner: W,
    set: S,
}

impl<W, S> WorkSet<W, S> {
    pub fn new(inner: W, set: S) -> Self {
        Self { inner, set }
    }
}

impl<W, S> Worklist<u32> for WorkSet<W, S>
where
    W: Worklist<u32>,
    S: NodeSet,
{
    type Handle<'a>
        = WorkSetHandle<'a, W, S>
    where
        Self: 'a;

    fn handle(&self, worker: usize) -> WorkSetHandle<'_, W, S> {
        WorkSetHandle {
            inner: self.inner.handle(worker),
            set: &self.set,
        }
    }
}

pub struct WorkSetHandle<'a, W: Worklist<u32> + 'a, S> {
    inner: W::Handle<'a>,
    set: &'a S,
}

impl<W: Worklist<u32>, S: NodeSet> WorklistHandle<u32> for WorkSetHandle<'_, W, S> {
    fn push(&mut self, item: u32) -> bool {
        if self.set.insert(item) {
            self.inner.push(item)
        } else {
            false
        }
    }

    fn pop(&mut self) -> Option<u32> {
        let item = self.inner.pop()?;
        self.set.remove(item);
        Some(item)
    }

    fn flush(&mut self) {
        self.inner.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worklist::ChunkedFifo;

    #[test]
    fn duplicate_pushes_are_dropped() {
        let bag = WorkSet::new(ChunkedFifo::new(64), TwoLevelHashSet::new(1000));
        let mut h = bag.handle(0);
        assert!(h.push(42));
        assert!(!h.push(42));
        assert_eq!(h.pop(), Some(42));
        assert_eq!(h.pop(), None);
        // Membership released on pop; the node may be queued again.
        assert!(h.push(42));
    }

    #[test]
    fn marking_set_uses_graph_marker() {
        let graph = CsrGraph::from_edges(3, &[(0, 1, 1)]);
        let bag = WorkSet::new(ChunkedFifo::new(64), MarkingSet::new(&graph));
        let mut h = bag.handle(0);
        assert!(h.push(1));
        assert!(!h.push(1));
        assert!(h.push(2));
        let mut popped = vec![h.pop().unwrap(), h.pop().unwrap()];
        popped.sort_unstable();
        assert_eq!(popped, vec![1, 2]);
    }

    #[test]
    fn ordered_set_shards_cover_all_nodes() {
        let set = TwoLevelOrderedSet::new(1 << 20);
        for n in (0..1_000_000u32).step_by(65_537) {
            assert!(set.insert(n));
            assert!(!set.insert(n));
            set.remove(n);
            assert!(set.insert(n));
        }
    }
}
