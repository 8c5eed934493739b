//! Copying collector (§4.B).
//!
//! Cheney-style two-space copying collector with a growth heuristic. Unlike
//! a textbook Cheney collector, the "to-space" is not pre-existing fixed
//! storage — it is allocated fresh, sized by [`Heap::next_capacity`], every
//! cycle; the old space is simply dropped afterward. This matches the
//! source design's `{base, used, capacity, max_capacity, last_used}` model
//! more directly than a permanently-reserved second semispace would.
//!
//! The algorithm runs in three phases instead of the source's single
//! recursive pass, because this implementation stores forwarding addresses
//! in a dedicated slot rather than by reusing `ref[0]` (see Design Notes):
//!
//! 1. **Ensure-copied** (worklist-driven, not recursive — see Hazards):
//!    starting from the roots, copy every reachable object's raw bytes into
//!    to-space *verbatim* (their reference slots still hold old addresses),
//!    mark the old copy live, and stash the new address in its forwarding
//!    slot. A plain `Vec<Ref>` stands in for the explicit Cheney
//!    scan-worklist the Hazards note recommends in place of native
//!    recursion.
//! 2. **Relink to-space**: walk the to-space buffer linearly using
//!    header-derived sizes alone (no root access needed); for every
//!    reference-bearing object, replace each old address in its copy with
//!    the forwarding address read from the corresponding old-space object.
//! 3. **Relink roots**: the same substitution, applied to the root set
//!    itself.

use crate::header::align;
use crate::heap::{obj_size_in, ref_slot_in, set_ref_slot_in, Heap, GcStats, Ref};

/// Run one collection cycle. `roots` must yield a mutable reference to
/// every live `Ref` the caller wants preserved — the combined contents of
/// the operand stack's live range and the named-roots array. Each is
/// rewritten in place to point at its new, post-collection address.
pub fn collect<'a>(heap: &mut Heap, roots: impl Iterator<Item = &'a mut Ref>) -> GcStats {
    let old_capacity = heap.capacity();
    let bytes_before = heap.used();
    let new_capacity = heap.next_capacity();
    let mut to_space = vec![0u8; new_capacity];
    let mut to_len = 0usize;

    let root_refs: Vec<&mut Ref> = roots.collect();

    let mut worklist: Vec<Ref> = root_refs.iter().map(|r| **r).collect();
    while let Some(old) = worklist.pop() {
        ensure_copied(heap, old, &mut to_space, &mut to_len, &mut worklist);
    }

    relink_to_space(heap, &mut to_space, to_len);

    for r in root_refs {
        *r = heap.read_forward(*r);
    }

    let bytes_after = to_len;
    heap.install_new_space(to_space, to_len);

    GcStats {
        old_capacity,
        new_capacity,
        bytes_before,
        bytes_after,
    }
}

/// Copy `old`'s bytes into to-space if not already done, recording its
/// forwarding address, and enqueue its (as-yet-unread) children so the
/// caller's worklist drains to a complete transitive closure.
///
/// Children are captured from the old copy *before* the forwarding address
/// is written, because the forwarding slot and reference slot 0 occupy the
/// same word (see Design Notes): once `write_forward` runs, `ref_slot(old,
/// 0)` no longer holds a meaningful child address.
fn ensure_copied(
    heap: &mut Heap,
    old: Ref,
    to_space: &mut [u8],
    to_len: &mut usize,
    worklist: &mut Vec<Ref>,
) {
    if heap.is_live(old) {
        return;
    }
    let header = heap.header_at(old);
    let size = heap.obj_size(old);
    let new_off = *to_len;
    let src = heap.copy_bytes_from(old, size);
    to_space[new_off..new_off + size].copy_from_slice(src);
    *to_len += align(size);

    let mut children = Vec::new();
    if header.refs {
        for i in 0..header.len {
            children.push(heap.ref_slot(old, i));
        }
    }

    heap.mark_live(old);
    heap.write_forward(old, new_off as u64);

    worklist.extend(children);
}

/// Walk the freshly populated to-space linearly, using only header-derived
/// sizes (the whole point of the self-describing layout in §4.A), and
/// replace every reference slot's stale old-space address with its
/// forwarding address.
fn relink_to_space(heap: &Heap, to_space: &mut [u8], to_len: usize) {
    let mut offset = 0usize;
    while offset < to_len {
        let r = Ref(offset as u64);
        let header = crate::heap::header_at_in(to_space, r);
        let size = obj_size_in(to_space, r);
        if header.refs {
            for i in 0..header.len {
                let old_child = ref_slot_in(to_space, r, i);
                let new_child = heap.read_forward(old_child);
                set_ref_slot_in(to_space, r, i, new_child);
            }
        }
        offset += align(size);
    }
    debug_assert_eq!(offset, to_len, "relink pass must exhaust to-space exactly");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Header;

    /// Allocates a reference-less, binary-only object holding one 8-byte
    /// payload word, without going through any semantic-type constructor —
    /// `lispr-core` has no vocabulary for "integer" or "symbol", only
    /// headers and bytes, so these tests build objects the same way the
    /// collector itself sees them.
    fn alloc_scalar(heap: &mut Heap, value: u64) -> Ref {
        let r = heap
            .alloc_bytes(crate::header::WORD * 2, |h| collect(h, std::iter::empty()))
            .unwrap();
        heap.write_header(r, Header::new(false, true, crate::header::WORD as u64));
        heap.write_u64(r.offset() + crate::header::WORD, value);
        r
    }

    /// Allocates a two-reference object (a stand-in for a CONS cell without
    /// any type tag — the collector never reads one).
    fn alloc_pair(heap: &mut Heap, a: Ref, b: Ref) -> Ref {
        let r = heap
            .alloc_bytes(crate::header::WORD * 3, |h| collect(h, std::iter::empty()))
            .unwrap();
        heap.write_header(r, Header::new(true, false, 2));
        heap.set_ref_slot(r, 0, a);
        heap.set_ref_slot(r, 1, b);
        r
    }

    fn scalar_value(heap: &Heap, r: Ref) -> u64 {
        heap.read_u64(r.offset() + crate::header::WORD)
    }

    #[test]
    fn collection_preserves_reachable_graph_and_drops_garbage() {
        let mut heap = Heap::new(4096, 4096);

        // Garbage: allocated, then made unreachable before collection.
        let _garbage_a = alloc_scalar(&mut heap, 111);
        let _garbage_b = alloc_scalar(&mut heap, 222);

        // Reachable graph: pair(int(42), int(7)), anchored as the sole root.
        let a = alloc_scalar(&mut heap, 42);
        let b = alloc_scalar(&mut heap, 7);
        let mut pair = alloc_pair(&mut heap, a, b);

        let bytes_before = heap.used();
        let stats = collect(&mut heap, std::iter::once(&mut pair));

        assert_eq!(stats.bytes_before, bytes_before);
        // The two garbage scalars are gone; only the pair and its two
        // children survive, so less is copied than was live before.
        assert!(stats.bytes_after < stats.bytes_before);

        let new_header = heap.header_at(pair);
        assert!(new_header.refs);
        assert_eq!(new_header.len, 2);

        let new_a = heap.ref_slot(pair, 0);
        let new_b = heap.ref_slot(pair, 1);
        assert_eq!(scalar_value(&heap, new_a), 42);
        assert_eq!(scalar_value(&heap, new_b), 7);
    }

    #[test]
    fn post_collection_heap_is_linearly_walkable_and_exhausts_used_bytes() {
        let mut heap = Heap::new(4096, 4096);
        let a = alloc_scalar(&mut heap, 1);
        let b = alloc_scalar(&mut heap, 2);
        let mut pair = alloc_pair(&mut heap, a, b);

        collect(&mut heap, std::iter::once(&mut pair));

        let mut offset = 0usize;
        let mut visited = 0usize;
        while offset < heap.used() {
            let r = Ref(offset as u64);
            let size = heap.obj_size(r);
            offset += align(size);
            visited += 1;
        }
        assert_eq!(offset, heap.used());
        // pair + two scalar children, nothing else.
        assert_eq!(visited, 3);
    }

    #[test]
    fn shared_reference_collapses_to_one_copy_not_two() {
        // Both slots of the pair point at the same scalar; after collection
        // they must still point at the same (single) copy.
        let mut heap = Heap::new(4096, 4096);
        let shared = alloc_scalar(&mut heap, 99);
        let mut pair = alloc_pair(&mut heap, shared, shared);

        collect(&mut heap, std::iter::once(&mut pair));

        let new_a = heap.ref_slot(pair, 0);
        let new_b = heap.ref_slot(pair, 1);
        assert_eq!(new_a, new_b);
        assert_eq!(scalar_value(&heap, new_a), 99);
    }

    #[test]
    fn growth_heuristic_keeps_headroom_above_survivors() {
        // Capacity is generous enough that none of these allocations trigger
        // a collection of their own (which would run with no roots supplied
        // and reclaim everything) — the collector under test here is only
        // the explicit `collect` call below.
        let mut heap = Heap::new(4096, 1 << 20);
        let mut root = alloc_scalar(&mut heap, 1);
        for i in 0..20u64 {
            let _ = alloc_scalar(&mut heap, i);
        }
        let stats = collect(&mut heap, std::iter::once(&mut root));
        assert!(stats.new_capacity >= stats.bytes_after);
        assert_eq!(scalar_value(&heap, root), 1);
    }
}
