//! Relaxation kernels and the distance-update protocols they run on.
//!
//! All writes to a node's tentative distance funnel through a
//! [`DistUpdate`] policy: either the lock-free monotonic-minimum CAS loop or
//! a striped-lock load/compare/store used by the no-CAS variants. Both
//! guarantee that a distance never increases and that exactly one caller
//! observes a given improvement, so each improvement produces at most one
//! queued follow-up.

use parking_lot::Mutex;

use crate::graph::{CsrGraph, Dist, EdgeIdx, NodeData, DIST_INFINITY};

/// Worklist element of the request-carrying variants: the node together with
/// the tentative distance it was pushed at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateRequest {
    pub node: u32,
    pub dist: Dist,
}

/// Per-worker counters, merged once at the end of a solve. Never shared
/// between threads while the solve is running.
#[derive(Clone, Copy, Debug, Default)]
pub struct RelaxStats {
    /// Successful distance improvements.
    pub relaxed_edges: u64,
    /// Improvements that lowered an already-finite distance.
    pub bad_work: u64,
    /// Popped items that were stale on arrival or went stale mid-relaxation.
    pub empty_work: u64,
    pub pushes: u64,
    pub pops: u64,
}

impl RelaxStats {
    pub fn merge(&mut self, other: &RelaxStats) {
        self.relaxed_edges += other.relaxed_edges;
        self.bad_work += other.bad_work;
        self.empty_work += other.empty_work;
        self.pushes += other.pushes;
        self.pops += other.pops;
    }
}

/// How a destination distance is lowered.
pub trait DistUpdate: Sync {
    /// Installs `new` if it improves on the stored distance; returns the
    /// replaced value on success.
    fn try_lower(&self, node: u32, data: &NodeData, new: Dist) -> Option<Dist>;
}

/// Lock-free protocol: `compare_exchange_weak` retry loop.
pub struct CasUpdate;

impl DistUpdate for CasUpdate {
    #[inline]
    fn try_lower(&self, _node: u32, data: &NodeData, new: Dist) -> Option<Dist> {
        data.lower_with_cas(new)
    }
}

/// Plain store guarded by a striped lock; the stripe count keeps the lock
/// array small while bounding false sharing between unrelated nodes.
pub struct LockedUpdate {
    locks: Box<[Mutex<()>]>,
    mask: usize,
}

impl LockedUpdate {
    pub fn new(num_nodes: usize) -> Self {
        let stripes = num_nodes.next_power_of_two().clamp(64, 1024);
        let locks = (0..stripes).map(|_| Mutex::new(())).collect();
        Self {
            locks,
            mask: stripes - 1,
        }
    }
}

impl DistUpdate for LockedUpdate {
    #[inline]
    fn try_lower(&self, node: u32, data: &NodeData, new: Dist) -> Option<Dist> {
        let _guard = self.locks[node as usize & self.mask].lock();
        let old = data.dist_relaxed();
        if new < old {
            data.set_dist(new);
            Some(old)
        } else {
            None
        }
    }
}

/// Relaxes a single edge from a source with tentative distance `sdist`.
/// At most one successful store per call, at most one push per store.
#[inline]
pub fn relax_edge<U: DistUpdate>(
    graph: &CsrGraph,
    upd: &U,
    sdist: Dist,
    e: EdgeIdx,
    stats: &mut RelaxStats,
    push: &mut impl FnMut(u32, Dist),
) {
    let dst = graph.edge_dst(e);
    // Saturation keeps INFINITY + w from wrapping into a valid distance.
    let nd = sdist.saturating_add(graph.edge_weight(e));
    if let Some(old) = upd.try_lower(dst, graph.node(dst), nd) {
        if old != DIST_INFINITY {
            stats.bad_work += 1;
        }
        stats.relaxed_edges += 1;
        push(dst, nd);
    }
}

/// Request-carrying relaxation with stale-work elimination: a request whose
/// distance no longer matches the node is dropped, and a request whose node
/// improves mid-iteration is abandoned (a concurrent worker already queued a
/// better one).
pub fn relax_request<U: DistUpdate>(
    graph: &CsrGraph,
    upd: &U,
    req: UpdateRequest,
    stats: &mut RelaxStats,
    push: &mut impl FnMut(u32, Dist),
) {
    let data = graph.node(req.node);
    if req.dist != data.dist_relaxed() {
        stats.empty_work += 1;
        return;
    }
    for e in graph.out_edges(req.node) {
        if req.dist != data.dist_relaxed() {
            stats.empty_work += 1;
            break;
        }
        relax_edge(graph, upd, req.dist, e, stats, &mut *push);
    }
}

/// Blind relaxation over a bare node id: no stale check, the current
/// distance is re-read for every edge. Duplicate suppression, if any, is the
/// worklist's concern.
pub fn relax_blind<U: DistUpdate>(
    graph: &CsrGraph,
    upd: &U,
    node: u32,
    stats: &mut RelaxStats,
    push: &mut impl FnMut(u32, Dist),
) {
    let data = graph.node(node);
    for e in graph.out_edges(node) {
        relax_edge(graph, upd, data.dist_relaxed(), e, stats, &mut *push);
    }
}

/// A relaxation policy paired with the worklist item type it consumes. The
/// engine is monomorphized over this, so variant selection costs nothing in
/// the inner loop.
pub trait Relaxation: Sync {
    type Item: Send + Copy;

    fn relax(&self, item: Self::Item, stats: &mut RelaxStats, push: &mut impl FnMut(Self::Item));

    /// Seeds the worklist by relaxing the source's out-edges.
    fn seed(&self, source: u32, stats: &mut RelaxStats, push: &mut impl FnMut(Self::Item));
}

pub struct RequestRelax<'g, U> {
    pub graph: &'g CsrGraph,
    pub upd: U,
}

impl<U: DistUpdate> Relaxation for RequestRelax<'_, U> {
    type Item = UpdateRequest;

    fn relax(&self, item: UpdateRequest, stats: &mut RelaxStats, push: &mut impl FnMut(UpdateRequest)) {
        relax_request(self.graph, &self.upd, item, stats, &mut |node, dist| {
            push(UpdateRequest { node, dist })
        });
    }

    fn seed(&self, source: u32, stats: &mut RelaxStats, push: &mut impl FnMut(UpdateRequest)) {
        for e in self.graph.out_edges(source) {
            relax_edge(self.graph, &self.upd, 0, e, stats, &mut |node, dist| {
                push(UpdateRequest { node, dist })
            });
        }
    }
}

pub struct BlindRelax<'g, U> {
    pub graph: &'g CsrGraph,
    pub upd: U,
}

impl<U: DistUpdate> Relaxation for BlindRelax<'_, U> {
    type Item = u32;

    fn relax(&self, item: u32, stats: &mut RelaxStats, push: &mut impl FnMut(u32)) {
        relax_blind(self.graph, &self.upd, item, stats, &mut |node, _| push(node));
    }

    fn seed(&self, source: u32, stats: &mut RelaxStats, push: &mut impl FnMut(u32)) {
        for e in self.graph.out_edges(source) {
            relax_edge(self.graph, &self.upd, 0, e, stats, &mut |node, _| push(node));
        }
    }
}
