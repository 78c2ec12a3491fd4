//! Post-solve checks: the source sits at zero, unreached nodes are reported
//! (a disconnected input is not an error), and every edge out of a reached
//! node satisfies the triangle inequality.

use crate::graph::{CsrGraph, Dist, DIST_INFINITY};

#[derive(Clone, Copy, Debug)]
pub struct VerifyReport {
    pub unreached: usize,
    pub max_dist: Dist,
}

pub fn verify(graph: &CsrGraph, source: u32) -> Result<VerifyReport, String> {
    let sdist = graph.node(source).dist();
    if sdist != 0 {
        return Err(format!("source {source} has non-zero distance {sdist}"));
    }

    let mut unreached = 0usize;
    let mut max_dist = 0;
    for n in 0..graph.num_nodes() as u32 {
        let du = graph.node(n).dist();
        if du == DIST_INFINITY {
            unreached += 1;
            continue;
        }
        max_dist = max_dist.max(du);
        for e in graph.out_edges(n) {
            let dst = graph.edge_dst(e);
            let w = graph.edge_weight(e);
            let dv = graph.node(dst).dist();
            if dv > du.saturating_add(w) {
                return Err(format!(
                    "edge ({n} -> {dst}) violates the triangle inequality: {dv} > {du} + {w}"
                ));
            }
        }
    }

    Ok(VerifyReport {
        unreached,
        max_dist,
    })
}
