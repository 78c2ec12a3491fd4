use std::path::PathBuf;

use clap::{Args, Parser, ValueEnum};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct SsspCli {
    /// Input graph in flat binary CSR format; a synthetic graph is generated
    /// when omitted
    pub graph: Option<PathBuf>,

    /// Node to start the search from
    #[arg(long, default_value_t = 0)]
    pub start_node: u32,

    /// Node to report the distance to
    #[arg(long, default_value_t = 1)]
    pub report_node: u32,

    /// Shift value for the delta-step priority (buckets of width 2^delta)
    #[arg(long, default_value_t = 10)]
    pub delta: u32,

    #[arg(value_enum, short, long, num_args(0..))]
    pub algo: Option<Vec<Variant>>,

    /// Worker thread count; 0 means all available cores
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    #[arg(short, long, default_value_t = 1)]
    pub iterations: usize,

    #[arg(long)]
    pub skip_verify: bool,

    /// Append a JSON-lines run record to this file
    #[arg(long)]
    pub output_file: Option<PathBuf>,

    #[command(flatten)]
    pub synthetic: Synthetic,

    /// The input graph is symmetric
    #[arg(long)]
    pub symmetric_graph: bool,

    /// Transpose of the input graph (accepted for tool compatibility)
    #[arg(long)]
    pub graph_transpose: Option<PathBuf>,

    /// Memory limit in MB (recorded, not enforced by the in-memory engine)
    #[arg(long)]
    pub memory_limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct Synthetic {
    /// Number of nodes when generating a synthetic graph
    #[arg(long, default_value_t = 1 << 16)]
    pub synthetic_nodes: usize,

    /// Average out-degree of the synthetic graph
    #[arg(long, default_value_t = 8)]
    pub avg_degree: usize,

    /// Edge weights are drawn uniformly from 0..=max-weight
    #[arg(long, default_value_t = 100)]
    pub max_weight: u32,

    /// Seed for the synthetic graph
    #[arg(long, default_value_t = 0)]
    pub random_seed: u64,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Serial,
    Async,
    AsyncFifo,
    AsyncWithCas,
    AsyncWithCasFifo,
    AsyncPp,
    AsyncBlindObim,
    AsyncBlindFifo,
    AsyncBlindFifoHset,
    AsyncBlindFifoMset,
    AsyncBlindFifoOset,
    AsyncBlindObimHset,
    AsyncBlindObimMset,
    AsyncBlindObimOset,
    AsyncWithCasBlindObim,
    AsyncWithCasBlindFifo,
    AsyncWithCasBlindFifoHset,
    AsyncWithCasBlindFifoMset,
    AsyncWithCasBlindFifoOset,
    AsyncWithCasBlindObimHset,
    AsyncWithCasBlindObimMset,
    AsyncWithCasBlindObimOset,
}

impl SsspCli {
    pub fn describe(&self) {
        match &self.graph {
            Some(path) => println!("graph file: {}", path.display()),
            None => println!(
                "synthetic graph: {} nodes, avg degree {}, max weight {}, seed {}",
                self.synthetic.synthetic_nodes,
                self.synthetic.avg_degree,
                self.synthetic.max_weight,
                self.synthetic.random_seed
            ),
        }
        println!("start node: {}", self.start_node);
        println!("report node: {}", self.report_node);
        println!("delta shift: {}", self.delta);
        println!("threads: {}", self.threads());
        println!("iterations: {}", self.iterations);
        println!("variants: {:?}", self.variants());
        if self.symmetric_graph {
            println!("symmetric graph: true");
        }
        if let Some(path) = &self.graph_transpose {
            println!("graph transpose: {} (unused by these variants)", path.display());
        }
        if let Some(mb) = self.memory_limit {
            println!("memory limit: {mb} MB");
        }
    }

    pub fn threads(&self) -> usize {
        if self.threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.threads
        }
    }

    pub fn variants(&self) -> Vec<Variant> {
        match &self.algo {
            Some(v) if !v.is_empty() => v.clone(),
            _ => vec![Variant::AsyncWithCas],
        }
    }

    pub fn max_variant_len(&self) -> usize {
        self.variants()
            .iter()
            .map(|v| format!("{v:?}").len())
            .max()
            .unwrap_or(24)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_variant_is_async_with_cas() {
        let cli = SsspCli::parse_from(["sssp"]);
        assert_eq!(cli.variants(), vec![Variant::AsyncWithCas]);
        assert_eq!(cli.start_node, 0);
        assert_eq!(cli.report_node, 1);
        assert_eq!(cli.delta, 10);
    }

    #[test]
    fn multiple_variants_parse() {
        let cli = SsspCli::parse_from([
            "sssp",
            "--algo",
            "serial",
            "async-with-cas-blind-obim-mset",
            "--delta",
            "4",
        ]);
        assert_eq!(
            cli.variants(),
            vec![Variant::Serial, Variant::AsyncWithCasBlindObimMset]
        );
        assert_eq!(cli.delta, 4);
    }
}
