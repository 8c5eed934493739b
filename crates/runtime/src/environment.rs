//! Association-list environments (§3 "Environment", §4.E `lookup`/`extend`).
//!
//! An environment is a chain of `(key value) . rest` conses terminated by
//! NIL: each entry is itself a two-element proper list, so `head(entry)` is
//! the key and `head(tail(entry))` is the value. Lookups scan left to
//! right, so the most recent `extend` shadows anything behind it; nothing
//! is ever mutated in place.

use lispr_core::header::tag;
use lispr_core::Ref;

use crate::constructors;
use crate::equality::equal;
use crate::error::Fault;
use crate::interpreter::Interpreter;

/// Scans `map` for `key` (compared with structural equality), returning the
/// bound value if present. Pure heap reads — no allocation, so `map`/`key`
/// need not be stack-anchored for the duration of the call.
pub fn lookup(interp: &Interpreter, map: Ref, key: Ref) -> Result<Option<Ref>, Fault> {
    let mut cur = map;
    loop {
        if interp.heap.tag_of(cur) == tag::NIL {
            return Ok(None);
        }
        let entry = interp.heap.ref_slot(cur, 0);
        let entry_key = interp.heap.ref_slot(entry, 0);
        if equal(interp, entry_key, key)? {
            let value_tail = interp.heap.ref_slot(entry, 1);
            return Ok(Some(interp.heap.ref_slot(value_tail, 0)));
        }
        cur = interp.heap.ref_slot(cur, 1);
    }
}

/// Prepends a `(key value)` binding onto `map`, returning the new
/// environment. `map`, `key`, and `value` are pushed onto the operand stack
/// for the duration of the three allocations this requires (one cons for
/// the `(value . NIL)` tail, one for the `(key value)` entry, one for the
/// new environment spine), then popped again before returning — the same
/// stack-anchoring discipline every allocating builder in this crate
/// follows.
pub fn extend(interp: &mut Interpreter, map: Ref, key: Ref, value: Ref) -> Result<Ref, Fault> {
    // Stack: [map@base, key@base+1, value@base+2]
    let base = interp.stack.top_index();
    interp.stack.push(map)?;
    interp.stack.push(key)?;
    interp.stack.push(value)?;

    // Stack: [map, key, value, nil@base+3] -> value_list = (value . nil)
    let nil = interp.root(lispr_core::Root::Nil);
    interp.stack.push(nil)?;
    let value_list = constructors::cons(interp, base + 2, base + 3)?;
    interp.stack.pop()?; // nil
    interp.stack.pop()?; // value

    // Stack: [map, key, value_list@base+2] -> entry = (key . value_list)
    interp.stack.push(value_list)?;
    let entry = constructors::cons(interp, base + 1, base + 2)?;
    interp.stack.pop()?; // value_list
    interp.stack.pop()?; // key

    // Stack: [map, entry@base+1] -> new_map = (entry . map)
    interp.stack.push(entry)?;
    let new_map = constructors::cons(interp, base + 1, base)?;
    interp.stack.pop()?; // entry
    interp.stack.pop()?; // map

    Ok(new_map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructors::{integer, nil};

    fn fresh() -> Interpreter {
        Interpreter::new(1 << 16, 1 << 20, 64)
    }

    fn bootstrap_nil(interp: &mut Interpreter) {
        let n = nil(interp).unwrap();
        interp.set_root(lispr_core::Root::Nil, n);
    }

    #[test]
    fn lookup_finds_most_recent_binding_for_shadowed_key() {
        let mut interp = fresh();
        bootstrap_nil(&mut interp);
        let empty = interp.root(lispr_core::Root::Nil);
        let k = integer(&mut interp, 1).unwrap();
        let v1 = integer(&mut interp, 100).unwrap();
        let v2 = integer(&mut interp, 200).unwrap();

        let env1 = extend(&mut interp, empty, k, v1).unwrap();
        let env2 = extend(&mut interp, env1, k, v2).unwrap();

        let found = lookup(&interp, env2, k).unwrap();
        assert_eq!(found, Some(v2));
    }

    #[test]
    fn lookup_miss_on_empty_environment_returns_none() {
        let mut interp = fresh();
        bootstrap_nil(&mut interp);
        let empty = interp.root(lispr_core::Root::Nil);
        let k = integer(&mut interp, 1).unwrap();
        assert_eq!(lookup(&interp, empty, k).unwrap(), None);
    }

    #[test]
    fn lookup_skips_non_matching_keys() {
        let mut interp = fresh();
        bootstrap_nil(&mut interp);
        let empty = interp.root(lispr_core::Root::Nil);
        let k1 = integer(&mut interp, 1).unwrap();
        let k2 = integer(&mut interp, 2).unwrap();
        let v1 = integer(&mut interp, 10).unwrap();
        let v2 = integer(&mut interp, 20).unwrap();

        let env1 = extend(&mut interp, empty, k1, v1).unwrap();
        let env2 = extend(&mut interp, env1, k2, v2).unwrap();

        assert_eq!(lookup(&interp, env2, k1).unwrap(), Some(v1));
        assert_eq!(lookup(&interp, env2, k2).unwrap(), Some(v2));
    }
}
