//! Single-threaded reference solver backed by an ordered request set.
//!
//! Distances install lazily at pop time; a popped request that no longer
//! improves its node is counted as empty work and skipped. Used both as the
//! `serial` variant and as the oracle the parallel variants are tested
//! against.

use std::collections::BTreeSet;

use crate::graph::{CsrGraph, Dist, DIST_INFINITY};
use crate::relax::RelaxStats;

pub fn solve_serial(graph: &CsrGraph, source: u32) -> RelaxStats {
    for i in 0..graph.num_nodes() {
        let node = graph.node(i as u32);
        node.set_dist(DIST_INFINITY);
        node.unmark();
    }

    let mut stats = RelaxStats::default();
    let mut queue: BTreeSet<(Dist, u32)> = BTreeSet::new();
    queue.insert((0, source));
    stats.pushes += 1;

    while let Some((w, n)) = queue.pop_first() {
        stats.pops += 1;
        let data = graph.node(n);
        if w >= data.dist_relaxed() {
            stats.empty_work += 1;
            continue;
        }
        data.set_dist(w);
        stats.relaxed_edges += 1;
        for e in graph.out_edges(n) {
            let dst = graph.edge_dst(e);
            let nd = w.saturating_add(graph.edge_weight(e));
            if nd < graph.node(dst).dist_relaxed() && queue.insert((nd, dst)) {
                stats.pushes += 1;
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_node_graph() {
        let g = CsrGraph::from_edges(4, &[(0, 1, 5), (0, 2, 3), (2, 1, 1), (1, 3, 2), (2, 3, 6)]);
        solve_serial(&g, 0);
        assert_eq!(g.distances(), vec![0, 4, 3, 6]);
    }

    #[test]
    fn unreachable_nodes_stay_infinite() {
        let g = CsrGraph::from_edges(3, &[(0, 1, 2)]);
        solve_serial(&g, 0);
        assert_eq!(g.distances(), vec![0, 2, DIST_INFINITY]);
    }

    #[test]
    fn source_distance_is_zero_even_with_incoming_edges() {
        let g = CsrGraph::from_edges(2, &[(0, 1, 1), (1, 0, 1)]);
        solve_serial(&g, 0);
        assert_eq!(g.node(0).dist(), 0);
    }
}
