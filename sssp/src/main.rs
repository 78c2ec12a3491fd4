use std::process;

use clap::Parser;

use benchmark_record::{RunRecord, SolveRecord};
use sssp::engine::{run_variant, SolveConfig};
use sssp::graph::{CsrGraph, DIST_INFINITY};
use sssp::input;
use sssp::options::SsspCli;
use sssp::printer;
use sssp::verify;

fn load_graph(cli: &SsspCli) -> std::io::Result<CsrGraph> {
    match &cli.graph {
        Some(path) => input::load_binary(path),
        None => Ok(input::uniform_random(
            cli.synthetic.synthetic_nodes,
            cli.synthetic.avg_degree,
            cli.synthetic.max_weight,
            cli.synthetic.random_seed,
        )),
    }
}

fn main() {
    let cli = SsspCli::parse();
    cli.describe();

    let graph = match load_graph(&cli) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("failed to load graph: {e}");
            process::exit(2);
        }
    };
    println!("read {} nodes, {} edges", graph.num_nodes(), graph.num_edges());

    let num_nodes = graph.num_nodes() as u32;
    if cli.start_node >= num_nodes || cli.report_node >= num_nodes {
        eprintln!(
            "start node {} or report node {} out of range for {} nodes",
            cli.start_node, cli.report_node, num_nodes
        );
        process::exit(2);
    }

    let cfg = SolveConfig {
        source: cli.start_node,
        threads: cli.threads(),
        delta: cli.delta,
    };
    println!("using delta-step buckets of width 2^{}", cfg.delta);

    let mut record = RunRecord::new();
    record.set_graph(graph.num_nodes(), graph.num_edges(), cli.start_node);
    record.set_solver(cfg.delta, cfg.threads);

    let mut failed = false;
    for variant in cli.variants() {
        let mut times = Vec::with_capacity(cli.iterations);
        for iteration in 0..cli.iterations {
            let stats = run_variant(&graph, variant, &cfg);
            let report_dist = graph.node(cli.report_node).dist();
            printer::print_run(&cli, variant, iteration, cli.report_node, report_dist, &stats);
            times.push(stats.time);

            let verified = if cli.skip_verify {
                None
            } else {
                match verify::verify(&graph, cli.start_node) {
                    Ok(report) => {
                        println!(
                            "verification successful ({} unreached, max dist {})",
                            report.unreached, report.max_dist
                        );
                        Some(true)
                    }
                    Err(msg) => {
                        eprintln!("verification failed for {variant:?}: {msg}");
                        failed = true;
                        Some(false)
                    }
                }
            };

            record.record_solve(SolveRecord {
                variant: format!("{variant:?}"),
                iteration,
                seconds: stats.time.as_secs_f64(),
                relaxed_edges: stats.work.relaxed_edges,
                bad_work: stats.work.bad_work,
                empty_work: stats.work.empty_work,
                pushes: stats.work.pushes,
                pops: stats.work.pops,
                report_dist: (report_dist != DIST_INFINITY).then_some(report_dist),
                verified,
            });
        }
        printer::print_summary(variant, &times);
    }

    if let Some(path) = &cli.output_file {
        record.write(path);
    }
    if failed {
        process::exit(1);
    }
}
