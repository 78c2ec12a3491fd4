//! Persists shortest-paths runs as JSON lines. Each record carries the
//! graph and solver configuration, one entry per variant solve with the
//! engine's work counters and verification outcome, and enough host and
//! build context to compare runs across machines.

use json::JsonValue;
use std::collections::HashMap;
use std::env;
use std::ffi::OsStr;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

/// Dependencies whose pinned versions are worth recording with each run.
const PINNED_PACKAGES: [&str; 4] = ["clap", "crossbeam-deque", "parking_lot", "rand"];

/// Environment prefixes captured into the record.
const ENV_PREFIXES: [&str; 2] = ["SSSP", "SLURM"];

/// Counters and timing of one variant solve, as reported by the engine.
#[derive(Clone, Debug, Default)]
pub struct SolveRecord {
    pub variant: String,
    pub iteration: usize,
    pub seconds: f64,
    pub relaxed_edges: u64,
    pub bad_work: u64,
    pub empty_work: u64,
    pub pushes: u64,
    pub pops: u64,
    /// Distance of the report node, if it was reached.
    pub report_dist: Option<u32>,
    /// Outcome of the post-solve check, when it ran.
    pub verified: Option<bool>,
}

impl SolveRecord {
    fn as_json(&self) -> JsonValue {
        json::object! {
            "variant" => self.variant.clone(),
            "iteration" => self.iteration,
            "seconds" => self.seconds,
            "relaxed_edges" => self.relaxed_edges,
            "bad_work" => self.bad_work,
            "empty_work" => self.empty_work,
            "pushes" => self.pushes,
            "pops" => self.pops,
            "report_dist" => match self.report_dist {
                Some(d) => JsonValue::from(d),
                None => JsonValue::Null,
            },
            "verified" => match self.verified {
                Some(ok) => JsonValue::from(ok),
                None => JsonValue::Null,
            },
        }
    }
}

/// One process run: the solved graph, the solver configuration, and the
/// accumulated variant solves.
pub struct RunRecord {
    pub benchmark_name: String,
    run_date: String,
    parameters: Vec<String>,
    nodes: usize,
    edges: usize,
    start_node: u32,
    delta: u32,
    threads: usize,
    solves: Vec<SolveRecord>,
    build_type: String,
    git: HashMap<String, String>,
    host: HashMap<String, String>,
    environment: HashMap<String, String>,
    dependency_pins: HashMap<String, String>,
}

impl RunRecord {
    /// Create a record named after the running executable. This is the
    /// suggested way to construct one.
    pub fn new() -> Self {
        let benchmark_name = default_benchmark_name();
        Self::with_name(&benchmark_name)
    }

    pub fn with_name(benchmark_name: &str) -> Self {
        Self {
            benchmark_name: benchmark_name.to_string(),
            run_date: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            parameters: env::args().skip(1).collect(),
            nodes: 0,
            edges: 0,
            start_node: 0,
            delta: 0,
            threads: 0,
            solves: Vec::new(),
            build_type: build_type(),
            git: git_info(),
            host: host_info(),
            environment: captured_env(),
            dependency_pins: dependency_pins(),
        }
    }

    /// The graph this run was solved on.
    pub fn set_graph(&mut self, nodes: usize, edges: usize, start_node: u32) {
        self.nodes = nodes;
        self.edges = edges;
        self.start_node = start_node;
    }

    /// Solver configuration shared by every variant in the run.
    pub fn set_solver(&mut self, delta: u32, threads: usize) {
        self.delta = delta;
        self.threads = threads;
    }

    /// Append the counters of one finished variant solve.
    pub fn record_solve(&mut self, solve: SolveRecord) {
        self.solves.push(solve);
    }

    /// Convert the captured information into a JsonValue object.
    /// This is not intended as a stable API, but may be useful for some cases...use with caution.
    pub fn as_json(&self) -> JsonValue {
        let solves: Vec<JsonValue> = self.solves.iter().map(|s| s.as_json()).collect();
        json::object! {
            "benchmark name" => self.benchmark_name.clone(),
            "run_date" => self.run_date.clone(),
            "parameters" => self.parameters.clone(),
            "graph" => json::object! {
                "nodes" => self.nodes,
                "edges" => self.edges,
                "start_node" => self.start_node,
            },
            "solver" => json::object! {
                "delta" => self.delta,
                "threads" => self.threads,
            },
            "solves" => solves,
            "build type" => self.build_type.clone(),
            "git" => self.git.clone(),
            "host" => self.host.clone(),
            "environment" => self.environment.clone(),
            "dependencies" => self.dependency_pins.clone(),
        }
    }

    /// Display the captured information in JSON format to stdout.
    /// If `indent` is `Some(u16)`, pretty-prints with the given indentation level.
    /// If `indent` is `None`, prints in compact form as a single line.
    pub fn display(&self, indent: Option<u16>) {
        let json_obj = self.as_json();
        match indent {
            None => println!("{}", json::stringify(json_obj)),
            Some(indent) => println!("{}", json::stringify_pretty(json_obj, indent)),
        }
    }

    /// Append the record as one line to a JSON-lines file, creating it (and
    /// its parent directories) if needed.
    pub fn write(&self, file: &PathBuf) {
        if let Some(parent) = file.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(file) {
            let _ = writeln!(f, "{}", json::stringify(self.as_json()));
        }
    }

    /// Default output file name, keyed by the slurm job ID when running
    /// under slurm, otherwise by a timestamp.
    pub fn default_output_path(&self, root: &str) -> PathBuf {
        let time = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let id = self.environment.get("SLURM_JOB_ID").unwrap_or(&time);
        PathBuf::from(format!("{root}/{}_{id}_result.jsonl", self.benchmark_name))
    }
}

impl Default for RunRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Get the current executable path
fn executable() -> PathBuf {
    env::current_exe().unwrap_or(PathBuf::from("__unknown__"))
}

/// Generate a default benchmark name based on the executable file name
pub fn default_benchmark_name() -> String {
    executable()
        .file_stem()
        .unwrap_or(OsStr::new("__unknown__"))
        .to_string_lossy()
        .to_string()
}

/// "debug" or "release" when the executable sits in a standard target dir.
fn build_type() -> String {
    let exec = executable();
    let parent = exec
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if ["debug", "release"].contains(&parent.as_str()) {
        parent
    } else {
        "<unknown>".to_string()
    }
}

fn git_info() -> HashMap<String, String> {
    let queries: [(&str, &[&str]); 4] = [
        ("commit_hash", &["rev-parse", "HEAD"]),
        ("short_hash", &["rev-parse", "--short", "HEAD"]),
        ("commit_date", &["log", "-1", "--format=%cd", "--date=iso"]),
        ("commit_message", &["log", "-1", "--format=%s"]),
    ];

    let mut info = HashMap::new();
    for (key, args) in queries {
        if let Ok(output) = Command::new("git").args(args).output() {
            if output.status.success() {
                let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
                info.insert(key.to_string(), value);
            }
        }
    }
    info
}

/// Selected host facts from the sysinfo crate.
fn host_info() -> HashMap<String, String> {
    let sys = sysinfo::System::new_all();
    let mut host = HashMap::new();

    let names = [
        ("os_name", sysinfo::System::name()),
        ("kernel_version", sysinfo::System::kernel_version()),
        ("os_version", sysinfo::System::long_os_version()),
        ("hostname", sysinfo::System::host_name()),
    ];
    for (key, value) in names {
        if let Some(value) = value {
            host.insert(key.to_string(), value);
        }
    }

    host.insert("cpu_cores".to_string(), sys.cpus().len().to_string());
    host.insert(
        "physical_cpu_cores".to_string(),
        sys.physical_core_count().unwrap_or(0).to_string(),
    );
    if let Some(cpu) = sys.cpus().first() {
        host.insert("cpu_brand".to_string(), cpu.brand().to_string());
        host.insert("cpu_frequency_mhz".to_string(), cpu.frequency().to_string());
    }
    host.insert("ram_bytes".to_string(), sys.total_memory().to_string());
    host
}

fn captured_env() -> HashMap<String, String> {
    env::vars()
        .filter(|(key, _)| ENV_PREFIXES.iter().any(|p| key.starts_with(p)))
        .collect()
}

/// Pinned versions of the packages in `PINNED_PACKAGES`, read from the
/// Cargo.lock next to CARGO_MANIFEST_DIR (or the current directory).
fn dependency_pins() -> HashMap<String, String> {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let Ok(contents) = fs::read_to_string(format!("{manifest_dir}/Cargo.lock")) else {
        return HashMap::new();
    };

    let mut pins = HashMap::new();
    let mut current: Option<String> = None;
    for line in contents.lines() {
        let line = line.trim();
        if let Some(name) = line.strip_prefix("name = ") {
            let name = name.trim_matches('"');
            current = PINNED_PACKAGES
                .contains(&name)
                .then(|| name.to_string());
        } else if let Some(version) = line.strip_prefix("version = ") {
            if let Some(name) = current.take() {
                pins.insert(name, version.trim_matches('"').to_string());
            }
        }
    }
    pins
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_solve() -> SolveRecord {
        SolveRecord {
            variant: "AsyncWithCas".to_string(),
            iteration: 0,
            seconds: 0.25,
            relaxed_edges: 120,
            bad_work: 3,
            empty_work: 7,
            pushes: 120,
            pops: 127,
            report_dist: Some(42),
            verified: Some(true),
        }
    }

    #[test]
    fn solves_accumulate_in_the_record() {
        let mut record = RunRecord::with_name("sssp_test");
        record.set_graph(100, 800, 0);
        record.set_solver(10, 4);
        record.record_solve(sample_solve());
        record.record_solve(SolveRecord {
            iteration: 1,
            report_dist: None,
            verified: None,
            ..sample_solve()
        });

        let js = record.as_json();
        assert_eq!(js["solves"].len(), 2);
        assert_eq!(js["solves"][0]["report_dist"], 42);
        assert!(js["solves"][1]["report_dist"].is_null());
        assert!(js["solves"][1]["verified"].is_null());
        assert_eq!(js["graph"]["nodes"], 100);
        assert_eq!(js["graph"]["edges"], 800);
        assert_eq!(js["solver"]["delta"], 10);
        assert_eq!(js["solver"]["threads"], 4);
    }

    #[test]
    fn named_record_keeps_its_name() {
        let record = RunRecord::with_name("MyBenchmark");
        assert_eq!(record.benchmark_name, "MyBenchmark");
    }

    #[test]
    fn default_output_path_is_jsonl() {
        let record = RunRecord::with_name("sssp_bench");
        let output_path = record.default_output_path(".");
        let output_path_str = output_path.to_string_lossy().to_string();

        assert!(output_path_str.ends_with("_result.jsonl"));
        assert!(output_path_str.contains("sssp_bench"));
    }

    #[test]
    fn env_capture_covers_both_prefixes() {
        unsafe {
            env::set_var("SSSP_DELTA_HINT", "12");
            env::set_var("SLURM_JOB_ID", "4242");
        }

        let record = RunRecord::new();
        assert_eq!(record.environment.get("SSSP_DELTA_HINT").unwrap(), "12");
        assert_eq!(record.environment.get("SLURM_JOB_ID").unwrap(), "4242");
        assert!(record
            .environment
            .keys()
            .all(|k| k.starts_with("SSSP") || k.starts_with("SLURM")));
    }
}
