//! Thread-parallel worklists: a bag of fixed-capacity chunks, organized
//! either as a plain FIFO or as priority buckets, optionally wrapped in a
//! duplicate-suppressing membership set.

pub mod chunk;
pub mod fifo;
pub mod obim;
pub mod workset;

pub use chunk::{Chunk, ChunkPool, CHUNK_CAP};
pub use fifo::ChunkedFifo;
pub use obim::{Indexer, NodeIndexer, Obim, RequestIndexer};
pub use workset::{MarkingSet, NodeSet, TwoLevelHashSet, TwoLevelOrderedSet, WorkSet};

/// A shared bag of work items. Workers interact through per-thread handles;
/// the bag itself only hands those out.
pub trait Worklist<T: Send>: Sync {
    type Handle<'a>: WorklistHandle<T>
    where
        Self: 'a;

    fn handle(&self, worker: usize) -> Self::Handle<'_>;
}

/// One worker's view of a bag. Handles own the worker's local chunks;
/// chunks move to the shared queues only when full (push side) or when the
/// local supply runs dry (pop side).
pub trait WorklistHandle<T> {
    /// Returns false if the bag dropped the item (duplicate suppression).
    fn push(&mut self, item: T) -> bool;

    fn pop(&mut self) -> Option<T>;

    /// Publishes locally buffered items so other workers can reach them.
    fn flush(&mut self);
}
