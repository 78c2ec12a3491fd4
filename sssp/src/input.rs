//! Graph ingestion: a flat binary CSR file format and a seeded synthetic
//! generator for benchmarking without an input file. The engine itself only
//! ever sees the in-memory [`CsrGraph`].

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::graph::{CsrGraph, Dist};

/// "csr1" little-endian.
const MAGIC: u64 = 0x3172_7363;

fn read_u64(r: &mut impl Read) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_u32(r: &mut impl Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Layout: magic, node count, edge count (u64 each), then `n + 1` u64
/// offsets, `m` u32 destinations, `m` u32 weights.
pub fn load_binary(path: &Path) -> io::Result<CsrGraph> {
    let mut r = BufReader::new(File::open(path)?);
    if read_u64(&mut r)? != MAGIC {
        return Err(invalid("not a csr graph file"));
    }
    let n = read_u64(&mut r)? as usize;
    let m = read_u64(&mut r)? as usize;

    let mut offsets = Vec::with_capacity(n + 1);
    for _ in 0..=n {
        offsets.push(read_u64(&mut r)? as usize);
    }
    if offsets.last().copied() != Some(m) {
        return Err(invalid("offset array does not match edge count"));
    }
    if offsets.windows(2).any(|w| w[0] > w[1]) {
        return Err(invalid("offset array is not monotonic"));
    }
    let mut dsts = Vec::with_capacity(m);
    for _ in 0..m {
        let dst = read_u32(&mut r)?;
        if dst as usize >= n {
            return Err(invalid("edge destination out of range"));
        }
        dsts.push(dst);
    }
    let mut weights = Vec::with_capacity(m);
    for _ in 0..m {
        weights.push(read_u32(&mut r)?);
    }

    Ok(CsrGraph::from_parts(offsets, dsts, weights))
}

pub fn write_binary(graph: &CsrGraph, path: &Path) -> io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(&MAGIC.to_le_bytes())?;
    w.write_all(&(graph.num_nodes() as u64).to_le_bytes())?;
    w.write_all(&(graph.num_edges() as u64).to_le_bytes())?;

    let mut offset = 0u64;
    w.write_all(&offset.to_le_bytes())?;
    for n in 0..graph.num_nodes() as u32 {
        offset += graph.out_degree(n) as u64;
        w.write_all(&offset.to_le_bytes())?;
    }
    for n in 0..graph.num_nodes() as u32 {
        for e in graph.out_edges(n) {
            w.write_all(&graph.edge_dst(e).to_le_bytes())?;
        }
    }
    for n in 0..graph.num_nodes() as u32 {
        for e in graph.out_edges(n) {
            w.write_all(&graph.edge_weight(e).to_le_bytes())?;
        }
    }
    w.flush()
}

/// Dart-throwing construction of a uniform random directed graph: (src, dst)
/// pairs are drawn until `num_nodes * avg_degree` distinct non-loop edges
/// exist, then weights are drawn in `0..=max_weight`. Deterministic for a
/// given seed.
pub fn uniform_random(
    num_nodes: usize,
    avg_degree: usize,
    max_weight: Dist,
    seed: u64,
) -> CsrGraph {
    assert!(num_nodes > 0, "graph must have at least one node");
    let target = (num_nodes * avg_degree).min(num_nodes * (num_nodes.saturating_sub(1)));

    let mut rng = StdRng::seed_from_u64(seed);
    let mut darts: HashSet<(u32, u32)> = HashSet::with_capacity(target);
    while darts.len() < target {
        let src = rng.gen_range(0..num_nodes as u32);
        let dst = rng.gen_range(0..num_nodes as u32);
        if src == dst {
            continue;
        }
        darts.insert((src, dst));
    }

    let mut pairs: Vec<(u32, u32)> = darts.into_iter().collect();
    pairs.sort_unstable();
    let edges: Vec<(u32, u32, Dist)> = pairs
        .into_iter()
        .map(|(src, dst)| (src, dst, rng.gen_range(0..=max_weight)))
        .collect();
    CsrGraph::from_edges(num_nodes, &edges)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_round_trip() {
        let g = CsrGraph::from_edges(4, &[(0, 1, 5), (0, 2, 3), (2, 1, 1), (1, 3, 2), (2, 3, 6)]);
        let path = std::env::temp_dir().join("sssp_round_trip_test.csr");
        write_binary(&g, &path).expect("write");
        let loaded = load_binary(&path).expect("load");
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.num_nodes(), g.num_nodes());
        assert_eq!(loaded.num_edges(), g.num_edges());
        for n in 0..g.num_nodes() as u32 {
            let a: Vec<_> = g
                .out_edges(n)
                .map(|e| (g.edge_dst(e), g.edge_weight(e)))
                .collect();
            let b: Vec<_> = loaded
                .out_edges(n)
                .map(|e| (loaded.edge_dst(e), loaded.edge_weight(e)))
                .collect();
            assert_eq!(a, b, "node {n}");
        }
    }

    #[test]
    fn loader_rejects_garbage() {
        let path = std::env::temp_dir().join("sssp_garbage_test.csr");
        std::fs::write(&path, b"definitely not a graph").expect("write");
        assert!(load_binary(&path).is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn generator_is_deterministic_per_seed() {
        let a = uniform_random(64, 4, 100, 17);
        let b = uniform_random(64, 4, 100, 17);
        assert_eq!(a.num_edges(), 64 * 4);
        assert_eq!(a.distances().len(), b.distances().len());
        for n in 0..64u32 {
            let ea: Vec<_> = a.out_edges(n).map(|e| (a.edge_dst(e), a.edge_weight(e))).collect();
            let eb: Vec<_> = b.out_edges(n).map(|e| (b.edge_dst(e), b.edge_weight(e))).collect();
            assert_eq!(ea, eb);
        }
    }

    #[test]
    fn generator_caps_dense_requests() {
        // Asking for more edges than can exist must not spin forever.
        let g = uniform_random(3, 10, 5, 0);
        assert_eq!(g.num_edges(), 6);
    }
}
