//! Parallel single-source shortest paths over non-negative edge weights.
//!
//! A relaxation-based, work-driven solver. Workers pull node updates from a
//! chunked worklist (FIFO or delta-step priority buckets, with optional
//! duplicate suppression) and push improved neighbors back in; all distance
//! writes go through a monotonic-minimum protocol over an immutable CSR
//! graph. Any execution order converges to the same distances; scheduling
//! only controls how much redundant work gets done along the way.

pub mod engine;
pub mod graph;
pub mod input;
pub mod options;
pub mod printer;
pub mod relax;
pub mod serial;
pub mod verify;
pub mod worklist;

pub use graph::{CsrGraph, Dist, DIST_INFINITY};
