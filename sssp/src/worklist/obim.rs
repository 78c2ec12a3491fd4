//! Priority-bucketed scheduler ("ordered by integer metric").
//!
//! Items are binned by `dist >> delta` into an ordered map of chunked
//! FIFOs. Workers pop from the lowest non-empty bucket they can find, which
//! approximates delta-stepping: strict global priority order is not
//! guaranteed, only encouraged. The monotonic distance protocol makes any
//! processing order converge to the same result, so bucketing is purely a
//! bad-work reduction.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::chunk::{Chunk, ChunkPool};
use super::fifo::ChunkedFifo;
use super::{Worklist, WorklistHandle};
use crate::graph::{CsrGraph, Dist};
use crate::relax::UpdateRequest;

/// Maps an item to its scheduling priority.
pub trait Indexer<T>: Sync {
    fn index(&self, item: &T) -> u32;
}

#[inline]
fn priority_of(dist: Dist, shift: u32) -> u32 {
    // Shifts of 32 or more collapse everything into one bucket.
    dist.checked_shr(shift).unwrap_or(0)
}

/// Priority from the distance carried by the request.
pub struct RequestIndexer {
    pub shift: u32,
}

impl Indexer<UpdateRequest> for RequestIndexer {
    #[inline]
    fn index(&self, item: &UpdateRequest) -> u32 {
        priority_of(item.dist, self.shift)
    }
}

/// Priority from the node's current tentative distance (bare-node items).
pub struct NodeIndexer<'g> {
    pub graph: &'g CsrGraph,
    pub shift: u32,
}

impl Indexer<u32> for NodeIndexer<'_> {
    #[inline]
    fn index(&self, item: &u32) -> u32 {
        priority_of(self.graph.node(*item).dist_relaxed(), self.shift)
    }
}

pub struct Obim<T: Send, I> {
    buckets: RwLock<BTreeMap<u32, Arc<ChunkedFifo<T>>>>,
    /// Bumped on bucket creation so handles know to refresh their snapshot.
    version: AtomicUsize,
    indexer: I,
    pool: Arc<ChunkPool<T>>,
}

impl<T: Send, I: Indexer<T>> Obim<T, I> {
    pub fn new(indexer: I, expected_items: usize) -> Self {
        Self {
            buckets: RwLock::new(BTreeMap::new()),
            version: AtomicUsize::new(0),
            indexer,
            pool: Arc::new(ChunkPool::new(expected_items)),
        }
    }
}

impl<T: Send + Copy, I: Indexer<T>> Worklist<T> for Obim<T, I> {
    type Handle<'a>
        = ObimHandle<'a, T, I>
    where
        Self: 'a;

    fn handle(&self, _worker: usize) -> ObimHandle<'_, T, I> {
        ObimHandle {
            bag: self,
            cache: Vec::new(),
            cache_version: 0,
            cursor: 0,
            push_bufs: BTreeMap::new(),
            pop_chunk: None,
        }
    }
}

pub struct ObimHandle<'a, T: Send, I> {
    bag: &'a Obim<T, I>,
    /// Ascending (priority, bucket) snapshot of the shared map.
    cache: Vec<(u32, Arc<ChunkedFifo<T>>)>,
    cache_version: usize,
    /// Lowest priority this worker believes holds its next work.
    cursor: u32,
    push_bufs: BTreeMap<u32, Box<Chunk<T>>>,
    pop_chunk: Option<Box<Chunk<T>>>,
}

impl<'a, T: Send, I: Indexer<T>> ObimHandle<'a, T, I> {
    fn refresh_cache(&mut self) {
        let version = self.bag.version.load(Ordering::Acquire);
        if version != self.cache_version {
            let map = self.bag.buckets.read();
            self.cache = map.iter().map(|(p, b)| (*p, b.clone())).collect();
            self.cache_version = version;
        }
    }

    fn bucket(&mut self, priority: u32) -> Arc<ChunkedFifo<T>> {
        self.refresh_cache();
        if let Ok(i) = self.cache.binary_search_by_key(&priority, |e| e.0) {
            return self.cache[i].1.clone();
        }
        let pool = self.bag.pool.clone();
        let bucket = {
            let mut map = self.bag.buckets.write();
            map.entry(priority)
                .or_insert_with(|| Arc::new(ChunkedFifo::with_pool(pool)))
                .clone()
        };
        self.bag.version.fetch_add(1, Ordering::Release);
        if let Err(i) = self.cache.binary_search_by_key(&priority, |e| e.0) {
            self.cache.insert(i, (priority, bucket.clone()));
        }
        bucket
    }

    fn publish_buffered(&mut self) {
        let bufs = std::mem::take(&mut self.push_bufs);
        for (priority, chunk) in bufs {
            if chunk.is_empty() {
                self.bag.pool.release(chunk);
            } else {
                self.bucket(priority).publish(chunk);
            }
        }
    }

    /// Scans for the lowest bucket holding a chunk, starting at the cursor
    /// and wrapping to the front (another worker may have repopulated a
    /// priority below us).
    fn scan(&mut self) -> Option<Box<Chunk<T>>> {
        self.refresh_cache();
        let start = self
            .cache
            .partition_point(|(p, _)| *p < self.cursor);
        for i in start..self.cache.len() {
            if let Some(chunk) = self.cache[i].1.take_chunk() {
                self.cursor = self.cache[i].0;
                return Some(chunk);
            }
        }
        for i in 0..start {
            if let Some(chunk) = self.cache[i].1.take_chunk() {
                self.cursor = self.cache[i].0;
                return Some(chunk);
            }
        }
        None
    }
}

impl<T: Send + Copy, I: Indexer<T>> WorklistHandle<T> for ObimHandle<'_, T, I> {
    fn push(&mut self, item: T) -> bool {
        let priority = self.bag.indexer.index(&item);
        if priority < self.cursor {
            self.cursor = priority;
        }
        if let Some(chunk) = self.push_bufs.get_mut(&priority) {
            if chunk.push(item) {
                return true;
            }
            let full = self
                .push_bufs
                .remove(&priority)
                .expect("buffered chunk present");
            self.bucket(priority).publish(full);
            let mut chunk = self.bag.pool.acquire();
            let ok = chunk.push(item);
            debug_assert!(ok);
            self.push_bufs.insert(priority, chunk);
            return true;
        }
        let mut chunk = self.bag.pool.acquire();
        let ok = chunk.push(item);
        debug_assert!(ok);
        self.push_bufs.insert(priority, chunk);
        true
    }

    fn pop(&mut self) -> Option<T> {
        loop {
            if let Some(chunk) = self.pop_chunk.as_mut() {
                if let Some(item) = chunk.pop() {
                    return Some(item);
                }
                let empty = self.pop_chunk.take().expect("pop chunk present");
                self.bag.pool.release(empty);
            }
            self.publish_buffered();
            match self.scan() {
                Some(chunk) => self.pop_chunk = Some(chunk),
                None => return None,
            }
        }
    }

    fn flush(&mut self) {
        self.publish_buffered();
    }
}
