//! Chunked FIFO: each worker fills a local push-chunk and drains a local
//! pop-chunk; full chunks are published to a shared lock-free MPMC queue and
//! work-stealing happens at chunk granularity.

use std::sync::Arc;

use crossbeam_deque::{Injector, Steal};

use super::chunk::{Chunk, ChunkPool};
use super::{Worklist, WorklistHandle};

pub struct ChunkedFifo<T: Send> {
    global: Injector<Box<Chunk<T>>>,
    pool: Arc<ChunkPool<T>>,
}

impl<T: Send> ChunkedFifo<T> {
    pub fn new(expected_items: usize) -> Self {
        Self::with_pool(Arc::new(ChunkPool::new(expected_items)))
    }

    /// Shares a chunk pool with sibling queues (the OBIM buckets do this).
    pub fn with_pool(pool: Arc<ChunkPool<T>>) -> Self {
        Self {
            global: Injector::new(),
            pool,
        }
    }

    /// Publishes a non-empty chunk for any worker to take.
    pub(crate) fn publish(&self, chunk: Box<Chunk<T>>) {
        debug_assert!(!chunk.is_empty());
        self.global.push(chunk);
    }

    /// Takes one published chunk, racing other workers for it.
    pub(crate) fn take_chunk(&self) -> Option<Box<Chunk<T>>> {
        loop {
            match self.global.steal() {
                Steal::Success(chunk) => return Some(chunk),
                Steal::Empty => return None,
                Steal::Retry => {}
            }
        }
    }
}

impl<T: Send + Copy> Worklist<T> for ChunkedFifo<T> {
    type Handle<'a>
        = FifoHandle<'a, T>
    where
        Self: 'a;

    fn handle(&self, _worker: usize) -> FifoHandle<'_, T> {
        FifoHandle {
            bag: self,
            push_chunk: None,
            pop_chunk: None,
        }
    }
}

pub struct FifoHandle<'a, T: Send> {
    bag: &'a ChunkedFifo<T>,
    push_chunk: Option<Box<Chunk<T>>>,
    pop_chunk: Option<Box<Chunk<T>>>,
}

impl<T: Send + Copy> WorklistHandle<T> for FifoHandle<'_, T> {
    fn push(&mut self, item: T) -> bool {
        if let Some(chunk) = self.push_chunk.as_mut() {
            if chunk.push(item) {
                return true;
            }
            // Full: publish and start a fresh one.
            let full = self.push_chunk.take().expect("push chunk present");
            self.bag.publish(full);
        }
        let mut chunk = self.bag.pool.acquire();
        let ok = chunk.push(item);
        debug_assert!(ok);
        self.push_chunk = Some(chunk);
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
            if let Some(chunk) = self.bag.take_chunk() {
                self.pop_chunk = Some(chunk);
                continue;
            }
            // Nothing published; fall back to the not-yet-full local chunk.
            match self.push_chunk.take() {
                Some(chunk) if !chunk.is_empty() => {
                    self.pop_chunk = Some(chunk);
                }
                Some(chunk) => {
                    self.bag.pool.release(chunk);
                    return None;
                }
                None => return None,
            }
        }
    }

    fn flush(&mut self) {
        if let Some(chunk) = self.push_chunk.take() {
            if chunk.is_empty() {
                self.bag.pool.release(chunk);
            } else {
                self.bag.publish(chunk);
            }
        }
    }
}
