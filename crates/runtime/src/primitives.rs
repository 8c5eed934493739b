//! Stack primitives (§4.E).
//!
//! Pure stack-reshuffling operators plus the value primitives (cons/head/
//! tail, arithmetic, equality, association-list lookup/extend). Every
//! function here has the shape `fn(&mut Interpreter) -> Result<(), Fault>`:
//! it reads its operands directly off the top of `interp.stack` and leaves
//! its result(s) there, matching the `(a b -- c)` stack-effect notation in
//! the design.
//!
//! Primitives that allocate a reference-bearing object (`cons`, `lambda`,
//! `extend`) must not simply `pop` their operands and hand the bare `Ref`s
//! to a constructor: a collection triggered by that allocation would
//! relocate the referent out from under a bare local. Instead they compute
//! the *absolute* stack indices of their operands while those operands are
//! still resident, hand the indices to the constructor (which re-reads them
//! after allocating), and only pop once the new object is built.

use lispr_core::header::tag;
use lispr_core::{Fault as CoreFault, Ref};

use crate::constructors;
use crate::environment;
use crate::equality::equal;
use crate::error::Fault;
use crate::interpreter::Interpreter;

fn require(interp: &Interpreter, n: usize) -> Result<(), Fault> {
    if interp.stack.len() < n {
        return Err(Fault::Core(CoreFault::StackUnderflow));
    }
    Ok(())
}

fn expect_tag(interp: &Interpreter, r: Ref, expected: u64) -> Result<(), Fault> {
    let found = interp.heap.tag_of(r);
    if found != expected {
        return Err(Fault::TypeError {
            expected: tag::name(expected).to_string(),
            found: tag::name(found).to_string(),
        });
    }
    Ok(())
}

/// `(a b -- b a)`
pub fn swap(interp: &mut Interpreter) -> Result<(), Fault> {
    require(interp, 2)?;
    let b = interp.stack.pop()?;
    let a = interp.stack.pop()?;
    interp.stack.push(b)?;
    interp.stack.push(a)?;
    Ok(())
}

/// `(a -- a a)`
pub fn dup(interp: &mut Interpreter) -> Result<(), Fault> {
    require(interp, 1)?;
    let a = interp.stack.peek(0)?;
    interp.stack.push(a)?;
    Ok(())
}

/// `(a -- )`
pub fn drop(interp: &mut Interpreter) -> Result<(), Fault> {
    require(interp, 1)?;
    interp.stack.pop()?;
    Ok(())
}

/// `(a b -- a b a)`
pub fn over(interp: &mut Interpreter) -> Result<(), Fault> {
    require(interp, 2)?;
    let a = interp.stack.peek(1)?;
    interp.stack.push(a)?;
    Ok(())
}

/// `(a b -- a)`, per the documented stack effect: the top item is dropped
/// and the one beneath it survives.
pub fn nip(interp: &mut Interpreter) -> Result<(), Fault> {
    require(interp, 2)?;
    let _b = interp.stack.pop()?;
    let a = interp.stack.pop()?;
    interp.stack.push(a)?;
    Ok(())
}

/// `(a b c -- b c a)`
pub fn rot(interp: &mut Interpreter) -> Result<(), Fault> {
    require(interp, 3)?;
    let c = interp.stack.pop()?;
    let b = interp.stack.pop()?;
    let a = interp.stack.pop()?;
    interp.stack.push(b)?;
    interp.stack.push(c)?;
    interp.stack.push(a)?;
    Ok(())
}

/// `(a b -- a::b)`. Allocates.
pub fn cons(interp: &mut Interpreter) -> Result<(), Fault> {
    require(interp, 2)?;
    let tail_index = interp.stack.top_index() - 1;
    let head_index = interp.stack.top_index() - 2;
    let pair = constructors::cons(interp, head_index, tail_index)?;
    interp.stack.pop()?;
    interp.stack.pop()?;
    interp.stack.push(pair)?;
    Ok(())
}

/// `(a::b -- a b)`
pub fn decons(interp: &mut Interpreter) -> Result<(), Fault> {
    require(interp, 1)?;
    let pair = interp.stack.pop()?;
    expect_tag(interp, pair, tag::CONS)?;
    let head = interp.heap.ref_slot(pair, 0);
    let tail = interp.heap.ref_slot(pair, 1);
    interp.stack.push(head)?;
    interp.stack.push(tail)?;
    Ok(())
}

/// `(cons -- head)`
pub fn head(interp: &mut Interpreter) -> Result<(), Fault> {
    require(interp, 1)?;
    let pair = interp.stack.pop()?;
    expect_tag(interp, pair, tag::CONS)?;
    interp.stack.push(interp.heap.ref_slot(pair, 0))?;
    Ok(())
}

/// `(cons -- tail)`
pub fn tail(interp: &mut Interpreter) -> Result<(), Fault> {
    require(interp, 1)?;
    let pair = interp.stack.pop()?;
    expect_tag(interp, pair, tag::CONS)?;
    interp.stack.push(interp.heap.ref_slot(pair, 1))?;
    Ok(())
}

/// `(a b -- a++b)`: proper-list append. `NIL ++ b` returns `b` unchanged.
/// Walks `a`'s spine collecting its elements onto the operand stack (pure
/// reads, no allocation), then folds them onto `b` right-to-left, one
/// `cons` at a time, so each allocation only ever needs to see operands
/// already anchored on the stack.
pub fn append(interp: &mut Interpreter) -> Result<(), Fault> {
    require(interp, 2)?;
    let b = interp.stack.pop()?;
    let a = interp.stack.pop()?;

    let base = interp.stack.top_index();
    interp.stack.push(b)?; // base: running accumulator, starts as b

    let mut cur = a;
    let mut count = 0usize;
    loop {
        match interp.heap.tag_of(cur) {
            tag::NIL => break,
            tag::CONS => {
                interp.stack.push(interp.heap.ref_slot(cur, 0))?;
                cur = interp.heap.ref_slot(cur, 1);
                count += 1;
            }
            other => {
                return Err(Fault::TypeError {
                    expected: "proper list".to_string(),
                    found: tag::name(other).to_string(),
                })
            }
        }
    }

    // Stack is now [acc@base, e0@base+1, .., e(count-1)@base+count]. Fold
    // from the last-read element (nearest the end of `a`) down to the
    // first, each time consing it onto the current accumulator.
    let mut acc_index = base;
    for i in (0..count).rev() {
        let elem_index = base + 1 + i;
        let new_acc = constructors::cons(interp, elem_index, acc_index)?;
        interp.stack.push(new_acc)?;
        acc_index = interp.stack.top_index() - 1;
    }
    let result = interp.stack.get(acc_index)?;
    while interp.stack.top_index() > base {
        interp.stack.pop()?;
    }
    interp.stack.push(result)?;
    Ok(())
}

/// `(a b -- bool)`: structural equality (see `crate::equality`).
pub fn eq(interp: &mut Interpreter) -> Result<(), Fault> {
    require(interp, 2)?;
    let b = interp.stack.pop()?;
    let a = interp.stack.pop()?;
    let result = equal(interp, a, b)?;
    let r = constructors::boolean(interp, result)?;
    interp.stack.push(r)?;
    Ok(())
}

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Real(f64),
}

fn read_num(interp: &Interpreter, r: Ref) -> Result<Num, Fault> {
    match interp.heap.tag_of(r) {
        tag::INTEGER => Ok(Num::Int(constructors::read_integer(interp, r)?)),
        tag::REAL => Ok(Num::Real(constructors::read_real(interp, r)?)),
        other => Err(Fault::TypeError {
            expected: "integer or real".to_string(),
            found: tag::name(other).to_string(),
        }),
    }
}

fn numeric_pair(interp: &mut Interpreter) -> Result<(Num, Num), Fault> {
    require(interp, 2)?;
    let b = interp.stack.pop()?;
    let a = interp.stack.pop()?;
    let na = read_num(interp, a)?;
    let nb = read_num(interp, b)?;
    match (na, nb) {
        (Num::Int(_), Num::Int(_)) | (Num::Real(_), Num::Real(_)) => Ok((na, nb)),
        _ => Err(Fault::TypeError {
            expected: "matching numeric types".to_string(),
            found: "mixed integer/real".to_string(),
        }),
    }
}

/// `(a b -- bool)`: numeric less-than. Operands must share INTEGER or REAL.
pub fn lt(interp: &mut Interpreter) -> Result<(), Fault> {
    let (a, b) = numeric_pair(interp)?;
    let result = match (a, b) {
        (Num::Int(x), Num::Int(y)) => x < y,
        (Num::Real(x), Num::Real(y)) => x < y,
        _ => unreachable!("numeric_pair guarantees matching variants"),
    };
    let r = constructors::boolean(interp, result)?;
    interp.stack.push(r)?;
    Ok(())
}

/// `(a b -- a+b)`. Integer overflow wraps, matching the original's
/// `int64_t` arithmetic rather than panicking.
pub fn add(interp: &mut Interpreter) -> Result<(), Fault> {
    let (a, b) = numeric_pair(interp)?;
    let r = match (a, b) {
        (Num::Int(x), Num::Int(y)) => constructors::integer(interp, x.wrapping_add(y))?,
        (Num::Real(x), Num::Real(y)) => constructors::real(interp, x + y)?,
        _ => unreachable!("numeric_pair guarantees matching variants"),
    };
    interp.stack.push(r)?;
    Ok(())
}

/// `(a b -- a*b)`. Integer overflow wraps.
pub fn mul(interp: &mut Interpreter) -> Result<(), Fault> {
    let (a, b) = numeric_pair(interp)?;
    let r = match (a, b) {
        (Num::Int(x), Num::Int(y)) => constructors::integer(interp, x.wrapping_mul(y))?,
        (Num::Real(x), Num::Real(y)) => constructors::real(interp, x * y)?,
        _ => unreachable!("numeric_pair guarantees matching variants"),
    };
    interp.stack.push(r)?;
    Ok(())
}

/// `(a b -- a/b)`. Integer division by zero is fatal; `i64::MIN / -1`
/// wraps back to `i64::MIN` rather than panicking.
pub fn div(interp: &mut Interpreter) -> Result<(), Fault> {
    let (a, b) = numeric_pair(interp)?;
    let r = match (a, b) {
        (Num::Int(_), Num::Int(0)) => return Err(Fault::DivideByZero),
        (Num::Int(x), Num::Int(y)) => constructors::integer(interp, x.wrapping_div(y))?,
        (Num::Real(x), Num::Real(y)) => constructors::real(interp, x / y)?,
        _ => unreachable!("numeric_pair guarantees matching variants"),
    };
    interp.stack.push(r)?;
    Ok(())
}

/// `(a -- -a)`. `-i64::MIN` wraps back to `i64::MIN`.
pub fn neg(interp: &mut Interpreter) -> Result<(), Fault> {
    require(interp, 1)?;
    let a = interp.stack.pop()?;
    let r = match read_num(interp, a)? {
        Num::Int(x) => constructors::integer(interp, x.wrapping_neg())?,
        Num::Real(x) => constructors::real(interp, -x)?,
    };
    interp.stack.push(r)?;
    Ok(())
}

/// `(map key -- value TRUE)` or `(map key -- FALSE)`.
pub fn lookup(interp: &mut Interpreter) -> Result<(), Fault> {
    require(interp, 2)?;
    let key = interp.stack.pop()?;
    let map = interp.stack.pop()?;
    match environment::lookup(interp, map, key)? {
        Some(value) => {
            interp.stack.push(value)?;
            let t = interp.root(lispr_core::Root::True);
            interp.stack.push(t)?;
        }
        None => {
            let f = interp.root(lispr_core::Root::False);
            interp.stack.push(f)?;
        }
    }
    Ok(())
}

/// `(map key value -- map')`
pub fn extend(interp: &mut Interpreter) -> Result<(), Fault> {
    require(interp, 3)?;
    let value = interp.stack.pop()?;
    let key = interp.stack.pop()?;
    let map = interp.stack.pop()?;
    let new_map = environment::extend(interp, map, key, value)?;
    interp.stack.push(new_map)?;
    Ok(())
}

/// `(vars body env -- closure)`. Allocates.
pub fn lambda(interp: &mut Interpreter) -> Result<(), Fault> {
    require(interp, 3)?;
    let env_index = interp.stack.top_index() - 1;
    let body_index = interp.stack.top_index() - 2;
    let vars_index = interp.stack.top_index() - 3;
    let closure = constructors::lambda(interp, vars_index, body_index, env_index)?;
    interp.stack.pop()?;
    interp.stack.pop()?;
    interp.stack.pop()?;
    interp.stack.push(closure)?;
    Ok(())
}
