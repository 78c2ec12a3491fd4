//! Compressed sparse row graph with per-node atomic solver state.
//!
//! The topology (offsets / destinations / weights) is immutable for the
//! duration of a solve and is shared across all workers without
//! synchronization. The only mutable state is the per-node tentative
//! distance and the worklist-membership marker, both atomic.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Tentative distance of a node. `DIST_INFINITY` marks an unreached node.
pub type Dist = u32;

pub const DIST_INFINITY: Dist = u32::MAX;

/// Index of an edge into the flat destination/weight arrays.
pub type EdgeIdx = usize;

/// Mutable per-node solver state.
pub struct NodeData {
    dist: AtomicU32,
    in_set: AtomicBool,
}

impl NodeData {
    fn new() -> Self {
        Self {
            dist: AtomicU32::new(DIST_INFINITY),
            in_set: AtomicBool::new(false),
        }
    }

    pub fn dist(&self) -> Dist {
        self.dist.load(Ordering::Acquire)
    }

    /// Hot-path read; monotonicity makes a stale value harmless.
    #[inline]
    pub fn dist_relaxed(&self) -> Dist {
        self.dist.load(Ordering::Relaxed)
    }

    pub fn set_dist(&self, d: Dist) {
        self.dist.store(d, Ordering::Release);
    }

    /// Monotonic-minimum update. Installs `new` only while it improves on the
    /// stored distance and returns the replaced value on success. A failed
    /// weak exchange retries as long as `new` is still an improvement, so at
    /// most one caller wins any given `old -> new` transition.
    #[inline]
    pub fn lower_with_cas(&self, new: Dist) -> Option<Dist> {
        let mut old = self.dist.load(Ordering::Acquire);
        while new < old {
            match self
                .dist
                .compare_exchange_weak(old, new, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(prev) => return Some(prev),
                Err(cur) => old = cur,
            }
        }
        None
    }

    /// Test-and-set of the worklist membership byte. Returns true for the
    /// first inserter.
    #[inline]
    pub fn mark(&self) -> bool {
        !self.in_set.swap(true, Ordering::AcqRel)
    }

    #[inline]
    pub fn unmark(&self) {
        self.in_set.store(false, Ordering::Release);
    }
}

/// Directed graph in CSR form. Out-edges of a node occupy a contiguous slice
/// of the destination and weight arrays, so iteration is a linear scan and
/// neighbor ids stay in `u32`. Per-node state lives in a parallel array that
/// the driver re-initializes with worker-striped writes (first-touch keeps
/// pages near the workers that use them).
pub struct CsrGraph {
    offsets: Vec<usize>,
    dsts: Vec<u32>,
    weights: Vec<Dist>,
    nodes: Vec<NodeData>,
}

impl CsrGraph {
    /// Builds a graph from an edge list via counting sort.
    pub fn from_edges(num_nodes: usize, edges: &[(u32, u32, Dist)]) -> Self {
        let mut out_deg = vec![0_usize; num_nodes];
        for &(src, dst, _) in edges {
            assert!((src as usize) < num_nodes, "source vertex out of range");
            assert!((dst as usize) < num_nodes, "destination vertex out of range");
            out_deg[src as usize] += 1;
        }

        let mut offsets = vec![0_usize; num_nodes + 1];
        for v in 0..num_nodes {
            offsets[v + 1] = offsets[v] + out_deg[v];
        }

        let mut dsts = vec![0_u32; edges.len()];
        let mut weights = vec![0_u32; edges.len()];
        let mut cursor = offsets[..num_nodes].to_vec();
        for &(src, dst, w) in edges {
            let idx = cursor[src as usize];
            cursor[src as usize] += 1;
            dsts[idx] = dst;
            weights[idx] = w;
        }

        Self::from_parts(offsets, dsts, weights)
    }

    /// Assembles a graph from pre-built CSR arrays (the loader path).
    pub fn from_parts(offsets: Vec<usize>, dsts: Vec<u32>, weights: Vec<Dist>) -> Self {
        assert!(!offsets.is_empty(), "offsets array must have n + 1 entries");
        assert_eq!(*offsets.last().unwrap(), dsts.len());
        assert_eq!(dsts.len(), weights.len());
        let num_nodes = offsets.len() - 1;
        let nodes = (0..num_nodes).map(|_| NodeData::new()).collect();
        Self {
            offsets,
            dsts,
            weights,
            nodes,
        }
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn num_edges(&self) -> usize {
        self.dsts.len()
    }

    /// Edge handles of `n`'s out-edges.
    #[inline]
    pub fn out_edges(&self, n: u32) -> std::ops::Range<EdgeIdx> {
        self.offsets[n as usize]..self.offsets[n as usize + 1]
    }

    #[inline]
    pub fn out_degree(&self, n: u32) -> usize {
        self.offsets[n as usize + 1] - self.offsets[n as usize]
    }

    #[inline]
    pub fn edge_dst(&self, e: EdgeIdx) -> u32 {
        self.dsts[e]
    }

    #[inline]
    pub fn edge_weight(&self, e: EdgeIdx) -> Dist {
        self.weights[e]
    }

    #[inline]
    pub fn node(&self, n: u32) -> &NodeData {
        &self.nodes[n as usize]
    }

    /// Snapshot of all distances, for reporting and cross-variant checks.
    pub fn distances(&self) -> Vec<Dist> {
        self.nodes.iter().map(|n| n.dist()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csr_layout_from_edges() {
        let g = CsrGraph::from_edges(4, &[(0, 1, 5), (0, 2, 3), (2, 1, 1), (1, 3, 2), (2, 3, 6)]);
        assert_eq!(g.num_nodes(), 4);
        assert_eq!(g.num_edges(), 5);
        assert_eq!(g.out_degree(0), 2);
        assert_eq!(g.out_degree(2), 2);
        assert_eq!(g.out_degree(3), 0);

        let targets: Vec<(u32, Dist)> = g
            .out_edges(0)
            .map(|e| (g.edge_dst(e), g.edge_weight(e)))
            .collect();
        assert_eq!(targets, vec![(1, 5), (2, 3)]);
    }

    #[test]
    fn parallel_edges_and_self_loops_are_kept() {
        let g = CsrGraph::from_edges(2, &[(0, 0, 7), (0, 1, 4), (0, 1, 2)]);
        assert_eq!(g.out_degree(0), 3);
        let weights: Vec<Dist> = g.out_edges(0).map(|e| g.edge_weight(e)).collect();
        assert_eq!(weights, vec![7, 4, 2]);
    }

    #[test]
    fn cas_update_is_monotonic() {
        let g = CsrGraph::from_edges(1, &[]);
        let n = g.node(0);
        assert_eq!(n.dist(), DIST_INFINITY);
        assert_eq!(n.lower_with_cas(10), Some(DIST_INFINITY));
        assert_eq!(n.lower_with_cas(10), None);
        assert_eq!(n.lower_with_cas(12), None);
        assert_eq!(n.lower_with_cas(3), Some(10));
        assert_eq!(n.dist(), 3);
    }

    #[test]
    fn marker_reports_first_inserter() {
        let g = CsrGraph::from_edges(1, &[]);
        let n = g.node(0);
        assert!(n.mark());
        assert!(!n.mark());
        n.unmark();
        assert!(n.mark());
    }
}
