//! The interpreter instance (§5).
//!
//! Bundles a heap, operand stack, and named-root array as one owned value
//! rather than process-wide statics, so tests can spin up as many
//! interpreters as they like without interfering with each other — the
//! reference design's single global operand stack becomes a field here
//! instead of a singleton.

use lispr_core::gc;
use lispr_core::{GcStats, Heap, Ref, Root, Roots, Stack};

use crate::error::Fault;

pub struct Interpreter {
    pub heap: Heap,
    pub stack: Stack,
    pub roots: Roots,
    /// Remaining input characters for the reader (§4.H) and the `parse`
    /// bridge primitive (§6). Loaded wholesale by the CLI driver from
    /// stdin or a file argument — this interpreter has no streaming I/O of
    /// its own, matching the "reader is a client of the heap" framing: it
    /// is also a client of a plain in-memory character queue.
    pub source: std::collections::VecDeque<char>,
}

impl Interpreter {
    /// `heap_bytes`/`max_heap_bytes`/`stack_size` map directly onto
    /// `Heap::new` and `Stack::new` (§4.J `--heap-bytes`, `--max-heap-bytes`,
    /// `--stack-size`). The named roots are left pointing at a placeholder
    /// of offset 0 until `lispr_runtime::globals::bootstrap` installs the
    /// real singletons.
    pub fn new(heap_bytes: usize, max_heap_bytes: usize, stack_size: usize) -> Self {
        Interpreter {
            heap: Heap::new(heap_bytes, max_heap_bytes),
            stack: Stack::new(stack_size),
            roots: Roots::new(Ref(0)),
            source: std::collections::VecDeque::new(),
        }
    }

    /// Replace the remaining input with `text`. Called once by the driver
    /// before the read loop starts.
    pub fn load_source(&mut self, text: &str) {
        self.source = text.chars().collect();
    }

    /// Allocate `n` raw bytes, collecting against this interpreter's own
    /// root set (operand stack plus named roots) if the request does not
    /// fit. Destructuring `self` into its three fields first gives the
    /// closure a disjoint borrow of `stack`/`roots` alongside the `&mut
    /// Heap` the allocator itself needs — taking `&mut self` inside the
    /// closure would conflict with the outer `&mut self.heap` borrow.
    pub fn alloc(&mut self, n: usize) -> Result<Ref, Fault> {
        let Interpreter {
            heap, stack, roots, ..
        } = self;
        heap.alloc_bytes(n, |h| {
            let stats = gc::collect(h, stack.iter_mut().chain(roots.iter_mut()));
            tracing::debug!(
                old_capacity = stats.old_capacity,
                new_capacity = stats.new_capacity,
                bytes_before = stats.bytes_before,
                bytes_after = stats.bytes_after,
                reclaimed = stats.bytes_before.saturating_sub(stats.bytes_after),
                "gc cycle"
            );
            stats
        })
        .map_err(Fault::from)
    }

    /// Force a collection outside of an allocation request, logging via the
    /// returned stats (§4.J: the collector itself stays tracing-free; the
    /// caller — here, or the CLI driver — is responsible for emitting
    /// events).
    pub fn collect(&mut self) -> GcStats {
        let Interpreter {
            heap, stack, roots, ..
        } = self;
        gc::collect(heap, stack.iter_mut().chain(roots.iter_mut()))
    }

    pub fn root(&self, root: Root) -> Ref {
        self.roots.get(root)
    }

    pub fn set_root(&mut self, root: Root, value: Ref) {
        self.roots.set(root, value);
    }
}
