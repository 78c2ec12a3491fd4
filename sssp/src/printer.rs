use std::time::Duration;

use crate::engine::SolveStats;
use crate::graph::{Dist, DIST_INFINITY};
use crate::options::{SsspCli, Variant};

fn dist_str(d: Dist) -> String {
    if d == DIST_INFINITY {
        "unreachable".to_string()
    } else {
        d.to_string()
    }
}

pub fn print_run(
    cli: &SsspCli,
    variant: Variant,
    iteration: usize,
    report_node: u32,
    report_dist: Dist,
    stats: &SolveStats,
) {
    let mrps = (stats.work.relaxed_edges as f32 / 1_000_000.0) / stats.time.as_secs_f32();
    println!(
        "{} it {iteration} {:>10.4?} relaxed {:>9} bad {:>8} empty {:>8} pushes {:>9} pops {:>9} mrps {:>7.2} dist[{report_node}] = {}",
        format!("{:<1$}", format!("{variant:?}"), cli.max_variant_len()),
        stats.time,
        stats.work.relaxed_edges,
        stats.work.bad_work,
        stats.work.empty_work,
        stats.work.pushes,
        stats.work.pops,
        mrps,
        dist_str(report_dist),
    );
}

pub fn print_summary(variant: Variant, times: &[Duration]) {
    if times.is_empty() {
        return;
    }
    let secs: Vec<f32> = times.iter().map(|t| t.as_secs_f32()).collect();
    println!(
        "summary: {variant:?} min: {:>8.4} avg: {:>8.4} max: {:>8.4}",
        secs.iter().fold(f32::INFINITY, |a, &b| a.min(b)),
        secs.iter().sum::<f32>() / secs.len() as f32,
        secs.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b)),
    );
}
