//! Heap usage snapshot, for diagnostics (§4.J).
//!
//! The reference runtime's memory stats live in a cross-thread registry,
//! because its arenas are thread-local and diagnostics runs from a signal
//! handler on a separate thread. This interpreter has exactly one heap
//! owned by one `Interpreter` value (§5), so the registry collapses to a
//! plain snapshot struct the driver can read directly off `Heap` and log
//! after every collection.

use crate::heap::Heap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub used: usize,
    pub capacity: usize,
    pub max_capacity: usize,
    pub collections: u64,
}

impl MemoryStats {
    pub fn snapshot(heap: &Heap) -> Self {
        MemoryStats {
            used: heap.used(),
            capacity: heap.capacity(),
            max_capacity: heap.max_capacity(),
            collections: heap.collections,
        }
    }
}
