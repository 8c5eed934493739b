//! Structural equality (§4.E `=`).
//!
//! Same header shape and tag, then bit-for-bit payload comparison for
//! binary objects or pairwise recursive comparison for reference-bearing
//! ones (CONS, LAMBDA). Pure heap reads — no allocation, so neither operand
//! needs to be stack-anchored.
//!
//! Cycle detection (§9, resolved Open Question): a `Vec` of in-progress
//! reference-pair comparisons stands in for the call stack's own path. A
//! pair revisited while still on that path means the structure is cyclic;
//! this implementation conservatively reports such pairs unequal rather
//! than looping forever. True cyclic equality is undecidable in general,
//! and the language has no mutation, so naturally occurring cycles are rare
//! and small — a linear scan of the in-progress list is cheap enough.

use lispr_core::header::WORD;
use lispr_core::Ref;

use crate::error::Fault;
use crate::interpreter::Interpreter;

pub fn equal(interp: &Interpreter, a: Ref, b: Ref) -> Result<bool, Fault> {
    let mut visiting = Vec::new();
    equal_inner(interp, a, b, &mut visiting)
}

fn equal_inner(
    interp: &Interpreter,
    a: Ref,
    b: Ref,
    visiting: &mut Vec<(Ref, Ref)>,
) -> Result<bool, Fault> {
    if a == b {
        return Ok(true);
    }
    let ha = interp.heap.header_at(a);
    let hb = interp.heap.header_at(b);
    if ha.refs != hb.refs || ha.binary != hb.binary {
        return Ok(false);
    }
    if interp.heap.tag_of(a) != interp.heap.tag_of(b) {
        return Ok(false);
    }

    if ha.refs {
        if ha.len != hb.len {
            return Ok(false);
        }
        if visiting.contains(&(a, b)) {
            return Ok(false);
        }
        visiting.push((a, b));
        for i in 0..ha.len {
            let ra = interp.heap.ref_slot(a, i);
            let rb = interp.heap.ref_slot(b, i);
            if !equal_inner(interp, ra, rb, visiting)? {
                visiting.pop();
                return Ok(false);
            }
        }
        visiting.pop();
        Ok(true)
    } else {
        if ha.len != hb.len {
            return Ok(false);
        }
        let bytes_a = interp.heap.read_bytes(a.offset() + WORD, ha.len as usize);
        let bytes_b = interp.heap.read_bytes(b.offset() + WORD, hb.len as usize);
        Ok(bytes_a == bytes_b)
    }
}
