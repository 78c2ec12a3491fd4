//! Parallel solve driver. Seeds the worklist from the source's out-edges,
//! then runs one OS thread per worker until the bag goes quiescent.
//!
//! Termination uses a process-wide pending-work counter: incremented before
//! an item becomes visible in the bag, decremented once a popped item has
//! been fully relaxed. A worker that finds no work and reads zero pending
//! items can safely stop, since any future push would have been counted
//! before its producer's own item was retired.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam_utils::CachePadded;

use crate::graph::{CsrGraph, DIST_INFINITY};
use crate::options::Variant;
use crate::relax::{
    BlindRelax, CasUpdate, DistUpdate, LockedUpdate, RelaxStats, Relaxation, RequestRelax,
    UpdateRequest,
};
use crate::serial;
use crate::worklist::{
    ChunkedFifo, MarkingSet, NodeIndexer, NodeSet, Obim, RequestIndexer, TwoLevelHashSet,
    TwoLevelOrderedSet, WorkSet, Worklist, WorklistHandle,
};

#[derive(Clone, Copy, Debug)]
pub struct SolveConfig {
    pub source: u32,
    pub threads: usize,
    /// Delta-step shift: items are bucketed by `dist >> delta`.
    pub delta: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct SolveStats {
    pub time: Duration,
    pub work: RelaxStats,
}

/// Re-initializes every node to `INFINITY`/unmarked, striped across workers
/// so first-touch places the pages where they will be used.
fn reset_state(graph: &CsrGraph, threads: usize) {
    let n = graph.num_nodes();
    if n == 0 {
        return;
    }
    let threads = threads.clamp(1, n);
    let stride = n.div_ceil(threads);
    std::thread::scope(|s| {
        for t in 0..threads {
            let lo = t * stride;
            let hi = ((t + 1) * stride).min(n);
            s.spawn(move || {
                for i in lo..hi {
                    let node = graph.node(i as u32);
                    node.set_dist(DIST_INFINITY);
                    node.unmark();
                }
            });
        }
    });
}

/// Runs one relaxation policy against one worklist until quiescence.
pub fn solve<R, W>(graph: &CsrGraph, source: u32, threads: usize, wl: &W, relaxer: &R) -> RelaxStats
where
    R: Relaxation,
    W: Worklist<R::Item>,
{
    let threads = threads.max(1);
    reset_state(graph, threads);
    graph.node(source).set_dist(0);

    let pending = CachePadded::new(AtomicUsize::new(0));

    let mut total = RelaxStats::default();
    {
        let mut seed_pushes = 0u64;
        let mut h = wl.handle(0);
        relaxer.seed(source, &mut total, &mut |item| {
            pending.fetch_add(1, Ordering::Release);
            if h.push(item) {
                seed_pushes += 1;
            } else {
                pending.fetch_sub(1, Ordering::Release);
            }
        });
        h.flush();
        total.pushes += seed_pushes;
    }

    std::thread::scope(|s| {
        let mut joins = Vec::with_capacity(threads);
        for worker in 0..threads {
            let pending = &pending;
            joins.push(s.spawn(move || {
                let mut stats = RelaxStats::default();
                let mut h = wl.handle(worker);
                loop {
                    match h.pop() {
                        Some(item) => {
                            let mut pushed = 0u64;
                            relaxer.relax(item, &mut stats, &mut |it| {
                                pending.fetch_add(1, Ordering::Release);
                                if h.push(it) {
                                    pushed += 1;
                                } else {
                                    pending.fetch_sub(1, Ordering::Release);
                                }
                            });
                            stats.pops += 1;
                            stats.pushes += pushed;
                            pending.fetch_sub(1, Ordering::AcqRel);
                        }
                        None => {
                            h.flush();
                            if pending.load(Ordering::Acquire) == 0 {
                                break;
                            }
                            std::thread::yield_now();
                        }
                    }
                }
                stats
            }));
        }
        for join in joins {
            total.merge(&join.join().expect("worker thread panicked"));
        }
    });

    total
}

/// Solves with the given variant and reports wall time plus work counters.
/// The distance array is left in the graph's node state.
pub fn run_variant(graph: &CsrGraph, variant: Variant, cfg: &SolveConfig) -> SolveStats {
    let started = Instant::now();
    let work = dispatch(graph, variant, cfg);
    SolveStats {
        time: started.elapsed(),
        work,
    }
}

fn request_solve<W, U>(graph: &CsrGraph, cfg: &SolveConfig, wl: &W, upd: U) -> RelaxStats
where
    W: Worklist<UpdateRequest>,
    U: DistUpdate,
{
    let relaxer = RequestRelax { graph, upd };
    solve(graph, cfg.source, cfg.threads, wl, &relaxer)
}

fn blind_solve<W, U>(graph: &CsrGraph, cfg: &SolveConfig, wl: &W, upd: U) -> RelaxStats
where
    W: Worklist<u32>,
    U: DistUpdate,
{
    let relaxer = BlindRelax { graph, upd };
    solve(graph, cfg.source, cfg.threads, wl, &relaxer)
}

fn request_obim<U: DistUpdate>(graph: &CsrGraph, cfg: &SolveConfig, upd: U) -> RelaxStats {
    let wl = Obim::new(RequestIndexer { shift: cfg.delta }, graph.num_nodes().max(1024));
    request_solve(graph, cfg, &wl, upd)
}

fn request_fifo<U: DistUpdate>(graph: &CsrGraph, cfg: &SolveConfig, upd: U) -> RelaxStats {
    let wl = ChunkedFifo::new(graph.num_nodes().max(1024));
    request_solve(graph, cfg, &wl, upd)
}

fn blind_obim<U: DistUpdate>(graph: &CsrGraph, cfg: &SolveConfig, upd: U) -> RelaxStats {
    let indexer = NodeIndexer {
        graph,
        shift: cfg.delta,
    };
    let wl = Obim::new(indexer, graph.num_nodes().max(1024));
    blind_solve(graph, cfg, &wl, upd)
}

fn blind_fifo<U: DistUpdate>(graph: &CsrGraph, cfg: &SolveConfig, upd: U) -> RelaxStats {
    let wl = ChunkedFifo::new(graph.num_nodes().max(1024));
    blind_solve(graph, cfg, &wl, upd)
}

fn blind_obim_set<S, U>(graph: &CsrGraph, cfg: &SolveConfig, set: S, upd: U) -> RelaxStats
where
    S: NodeSet,
    U: DistUpdate,
{
    let indexer = NodeIndexer {
        graph,
        shift: cfg.delta,
    };
    let wl = WorkSet::new(Obim::new(indexer, graph.num_nodes().max(1024)), set);
    blind_solve(graph, cfg, &wl, upd)
}

fn blind_fifo_set<S, U>(graph: &CsrGraph, cfg: &SolveConfig, set: S, upd: U) -> RelaxStats
where
    S: NodeSet,
    U: DistUpdate,
{
    let wl = WorkSet::new(ChunkedFifo::new(graph.num_nodes().max(1024)), set);
    blind_solve(graph, cfg, &wl, upd)
}

fn dispatch(graph: &CsrGraph, variant: Variant, cfg: &SolveConfig) -> RelaxStats {
    let n = graph.num_nodes();
    match variant {
        Variant::Serial => serial::solve_serial(graph, cfg.source),

        Variant::Async => request_obim(graph, cfg, LockedUpdate::new(n)),
        Variant::AsyncFifo => request_fifo(graph, cfg, LockedUpdate::new(n)),
        Variant::AsyncWithCas => request_obim(graph, cfg, CasUpdate),
        Variant::AsyncWithCasFifo => request_fifo(graph, cfg, CasUpdate),
        // The pull half of push-pull is not engaged; scheduling and updates
        // are those of async-with-cas.
        Variant::AsyncPp => request_obim(graph, cfg, CasUpdate),

        Variant::AsyncBlindObim => blind_obim(graph, cfg, LockedUpdate::new(n)),
        Variant::AsyncBlindFifo => blind_fifo(graph, cfg, LockedUpdate::new(n)),
        Variant::AsyncBlindFifoHset => {
            blind_fifo_set(graph, cfg, TwoLevelHashSet::new(n), LockedUpdate::new(n))
        }
        Variant::AsyncBlindFifoMset => {
            blind_fifo_set(graph, cfg, MarkingSet::new(graph), LockedUpdate::new(n))
        }
        Variant::AsyncBlindFifoOset => {
            blind_fifo_set(graph, cfg, TwoLevelOrderedSet::new(n), LockedUpdate::new(n))
        }
        Variant::AsyncBlindObimHset => {
            blind_obim_set(graph, cfg, TwoLevelHashSet::new(n), LockedUpdate::new(n))
        }
        Variant::AsyncBlindObimMset => {
            blind_obim_set(graph, cfg, MarkingSet::new(graph), LockedUpdate::new(n))
        }
        Variant::AsyncBlindObimOset => {
            blind_obim_set(graph, cfg, TwoLevelOrderedSet::new(n), LockedUpdate::new(n))
        }

        Variant::AsyncWithCasBlindObim => blind_obim(graph, cfg, CasUpdate),
        Variant::AsyncWithCasBlindFifo => blind_fifo(graph, cfg, CasUpdate),
        Variant::AsyncWithCasBlindFifoHset => {
            blind_fifo_set(graph, cfg, TwoLevelHashSet::new(n), CasUpdate)
        }
        Variant::AsyncWithCasBlindFifoMset => {
            blind_fifo_set(graph, cfg, MarkingSet::new(graph), CasUpdate)
        }
        Variant::AsyncWithCasBlindFifoOset => {
            blind_fifo_set(graph, cfg, TwoLevelOrderedSet::new(n), CasUpdate)
        }
        Variant::AsyncWithCasBlindObimHset => {
            blind_obim_set(graph, cfg, TwoLevelHashSet::new(n), CasUpdate)
        }
        Variant::AsyncWithCasBlindObimMset => {
            blind_obim_set(graph, cfg, MarkingSet::new(graph), CasUpdate)
        }
        Variant::AsyncWithCasBlindObimOset => {
            blind_obim_set(graph, cfg, TwoLevelOrderedSet::new(n), CasUpdate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Dist;
    use clap::ValueEnum;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    fn cfg(threads: usize, delta: u32) -> SolveConfig {
        SolveConfig {
            source: 0,
            threads,
            delta,
        }
    }

    fn all_variants() -> &'static [Variant] {
        Variant::value_variants()
    }

    fn random_graph(n: usize, m: usize, max_weight: Dist, seed: u64) -> CsrGraph {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut used = HashSet::new();
        while used.len() < m {
            let u = rng.gen_range(0..n as u32);
            let v = rng.gen_range(0..n as u32);
            if u == v {
                continue;
            }
            used.insert((u, v));
        }
        let mut pairs: Vec<(u32, u32)> = used.into_iter().collect();
        pairs.sort_unstable();
        let edges: Vec<(u32, u32, Dist)> = pairs
            .into_iter()
            .map(|(u, v)| (u, v, rng.gen_range(0..=max_weight)))
            .collect();
        CsrGraph::from_edges(n, &edges)
    }

    #[test]
    fn four_node_graph_all_variants() {
        let g = CsrGraph::from_edges(4, &[(0, 1, 5), (0, 2, 3), (2, 1, 1), (1, 3, 2), (2, 3, 6)]);
        for &variant in all_variants() {
            for threads in [1, 2, 4, 8] {
                run_variant(&g, variant, &cfg(threads, 10));
                assert_eq!(
                    g.distances(),
                    vec![0, 4, 3, 6],
                    "variant {variant:?} threads {threads}"
                );
            }
        }
    }

    #[test]
    fn diamond_is_deterministic_across_thread_counts() {
        let g = CsrGraph::from_edges(4, &[(0, 1, 1), (0, 2, 1), (1, 3, 1), (2, 3, 1)]);
        for threads in [1, 4, 16] {
            run_variant(&g, Variant::AsyncWithCas, &cfg(threads, 10));
            assert_eq!(g.distances(), vec![0, 1, 1, 2], "threads {threads}");
        }
    }

    #[test]
    fn chain_distances_across_delta_sweep() {
        let n = 1000;
        let edges: Vec<(u32, u32, Dist)> =
            (0..n - 1).map(|i| (i as u32, i as u32 + 1, 1)).collect();
        let g = CsrGraph::from_edges(n, &edges);
        let expected: Vec<Dist> = (0..n as Dist).collect();
        for delta in [0, 5, 10, 20] {
            for variant in [Variant::AsyncWithCas, Variant::Async, Variant::AsyncBlindObimMset] {
                run_variant(&g, variant, &cfg(4, delta));
                assert_eq!(g.distances(), expected, "variant {variant:?} delta {delta}");
            }
        }
    }

    #[test]
    fn disconnected_component_stays_unreached() {
        // Two triangles; the source sits in the first.
        let g = CsrGraph::from_edges(
            6,
            &[
                (0, 1, 1),
                (1, 2, 1),
                (2, 0, 1),
                (3, 4, 1),
                (4, 5, 1),
                (5, 3, 1),
            ],
        );
        run_variant(&g, Variant::AsyncWithCas, &cfg(4, 10));
        let dist = g.distances();
        assert_eq!(&dist[..3], &[0, 1, 2]);
        assert!(dist[3..].iter().all(|&d| d == DIST_INFINITY));

        let report = crate::verify::verify(&g, 0).expect("verifier accepts disconnected graphs");
        assert_eq!(report.unreached, 3);
        assert_eq!(report.max_dist, 2);
    }

    #[test]
    fn long_cheap_path_beats_short_expensive_edge() {
        // A 60-hop unit-weight path competes with a single weight-1000 edge
        // into the same sink.
        let hops = 60u32;
        let mut edges: Vec<(u32, u32, Dist)> =
            (0..hops).map(|i| (i, i + 1, 1)).collect();
        edges.push((0, hops, 1000));
        let g = CsrGraph::from_edges(hops as usize + 1, &edges);
        for &variant in all_variants() {
            run_variant(&g, variant, &cfg(4, 3));
            assert_eq!(
                g.node(hops).dist(),
                hops,
                "variant {variant:?} must settle the cheap path"
            );
        }
    }

    #[test]
    fn self_loop_and_parallel_edges() {
        let g = CsrGraph::from_edges(2, &[(0, 0, 7), (0, 1, 4), (0, 1, 2)]);
        for &variant in all_variants() {
            run_variant(&g, variant, &cfg(2, 10));
            assert_eq!(g.distances(), vec![0, 2], "variant {variant:?}");
        }
    }

    #[test]
    fn zero_weight_edges_converge() {
        let g = CsrGraph::from_edges(4, &[(0, 1, 0), (1, 2, 0), (2, 3, 0), (0, 3, 5)]);
        for &variant in all_variants() {
            run_variant(&g, variant, &cfg(4, 10));
            assert_eq!(g.distances(), vec![0, 0, 0, 0], "variant {variant:?}");
        }
    }

    #[test]
    fn single_node_graph_produces_no_work() {
        let g = CsrGraph::from_edges(1, &[]);
        let stats = run_variant(&g, Variant::AsyncWithCas, &cfg(4, 10));
        assert_eq!(g.distances(), vec![0]);
        assert_eq!(stats.work.pushes, 0);
    }

    #[test]
    fn every_variant_matches_serial_on_random_graphs() {
        for seed in 0..4u64 {
            let g = random_graph(200, 1200, 50, 0x5e5e + seed);
            run_variant(&g, Variant::Serial, &cfg(1, 10));
            let expected = g.distances();
            for &variant in all_variants() {
                run_variant(&g, variant, &cfg(4, 10));
                assert_eq!(g.distances(), expected, "seed {seed} variant {variant:?}");
            }
        }
    }

    #[test]
    fn resolving_is_idempotent() {
        let g = random_graph(150, 900, 20, 99);
        run_variant(&g, Variant::AsyncWithCasBlindObimHset, &cfg(4, 8));
        let first = g.distances();
        run_variant(&g, Variant::AsyncWithCasBlindObimHset, &cfg(4, 8));
        assert_eq!(g.distances(), first);
    }

    #[test]
    fn alternate_sources_cover_the_graph() {
        let g = random_graph(64, 512, 16, 7);
        for source in [0u32, 17, 63] {
            let c = SolveConfig {
                source,
                threads: 2,
                delta: 6,
            };
            run_variant(&g, Variant::AsyncWithCas, &c);
            assert!(crate::verify::verify(&g, source).is_ok(), "source {source}");
        }
    }
}
