//! A pointer-stable, append-only list built from fixed-capacity chunks.
//!
//! Growing a `Vec<ResultNode>` would invalidate every pointer into it the
//! moment it reallocates — fatal here, since concurrently-running field
//! tasks hold raw pointers to sibling and parent nodes across await points.
//! [`ChunkedList`] instead grows by allocating a new
//! fixed-size chunk and never moves an already-allocated one, so a pointer
//! handed out for index `i` stays valid for the list's whole lifetime.

use std::sync::Mutex;

/// The number of slots per chunk. Matches [`crate::ExecutorConfig`]'s
/// `default_chunk_size` default so a typical single-level selection set
/// fits in one chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 16;

struct Chunk<T> {
    slots: Box<[T]>,
}

/// A pointer-stable list of `T`, built from fixed-capacity chunks.
///
/// Indexing is `O(chunk count)`, not `O(1)` — chunk count stays small in
/// practice (selection sets rarely exceed a few hundred fields), and the
/// tradeoff buys pointer stability without an indirection layer per
/// element.
pub struct ChunkedList<T> {
    chunk_size: usize,
    chunks: Mutex<Vec<Box<Chunk<T>>>>,
    len: std::sync::atomic::AtomicUsize,
}

impl<T> ChunkedList<T>
where
    T: Default,
{
    /// Creates an empty list using the given chunk size.
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        Self { chunk_size, chunks: Mutex::new(Vec::new()), len: std::sync::atomic::AtomicUsize::new(0) }
    }

    /// The number of slots allocated so far (including unused ones in a
    /// partially-filled chunk).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.chunks.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len() * self.chunk_size
    }

    /// Reserves (and default-initializes) a new slot, returning its index.
    ///
    /// Never invalidates a pointer returned by an earlier [`Self::get`] call:
    /// reservation either uses spare capacity in the last chunk or appends a
    /// brand new chunk, never resizing an existing one.
    pub fn push(&self) -> usize {
        let index = self.len.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if index >= self.capacity() {
            let mut chunks = self.chunks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            while index >= chunks.len() * self.chunk_size {
                let mut slots = Vec::with_capacity(self.chunk_size);
                slots.resize_with(self.chunk_size, T::default);
                chunks.push(Box::new(Chunk { slots: slots.into_boxed_slice() }));
            }
        }
        index
    }

    /// Returns a raw, stable pointer to the slot at `index`.
    ///
    /// # Panics
    /// Panics if `index` was never reserved via [`Self::push`].
    #[must_use]
    pub fn get(&self, index: usize) -> *const T {
        let chunk_index = index / self.chunk_size;
        let slot_index = index % self.chunk_size;
        let chunks = self.chunks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let chunk = chunks.get(chunk_index).expect("index was never reserved via push()");
        std::ptr::addr_of!(chunk.slots[slot_index])
    }

    /// The number of slots reserved via [`Self::push`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.len.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Whether no slots have been reserved yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointers_survive_growth_past_a_chunk_boundary() {
        let list: ChunkedList<i64> = ChunkedList::new(2);
        let first = list.push();
        let first_ptr = list.get(first);
        for _ in 0..10 {
            list.push();
        }
        assert_eq!(list.get(first), first_ptr, "growing past chunk boundaries must not move slot 0");
    }

    #[test]
    fn indices_are_assigned_densely() {
        let list: ChunkedList<i64> = ChunkedList::new(4);
        let indices: Vec<usize> = (0..9).map(|_| list.push()).collect();
        assert_eq!(indices, (0..9).collect::<Vec<_>>());
        assert_eq!(list.len(), 9);
    }
}
