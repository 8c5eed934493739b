//! Typed constructors (§4.D).
//!
//! One factory per semantic type. Each stamps a header, writes the type tag
//! as the first word of the binary payload, fills in the rest, and returns
//! the new `Ref`. Scalar constructors (integer, real, symbol, string, bool,
//! natfun) take plain Rust values — nothing heap-allocated can go stale
//! underneath them. `cons` and `lambda` are different: their payload *is*
//! heap references, so those references must already be resident on the
//! operand stack (at a known depth) before the call — the constructor reads
//! them back only after allocating, by which point a collection may have
//! relocated them. See the module-level note in `interpreter.rs`.

use lispr_core::header::{tag, Header, WORD};
use lispr_core::Ref;

use crate::error::Fault;
use crate::interpreter::Interpreter;

fn scalar_size(payload_bytes: usize) -> usize {
    WORD + WORD + payload_bytes
}

fn write_scalar_header(interp: &mut Interpreter, r: Ref, payload_bytes: usize) {
    let header = Header::new(false, true, (WORD + payload_bytes) as u64);
    interp.heap.write_header(r, header);
}

pub fn integer(interp: &mut Interpreter, value: i64) -> Result<Ref, Fault> {
    let r = interp.alloc(scalar_size(8))?;
    write_scalar_header(interp, r, 8);
    interp.heap.write_u64(r.offset() + WORD, tag::INTEGER);
    interp
        .heap
        .write_u64(r.offset() + WORD + WORD, value as u64);
    Ok(r)
}

pub fn real(interp: &mut Interpreter, value: f64) -> Result<Ref, Fault> {
    let r = interp.alloc(scalar_size(8))?;
    write_scalar_header(interp, r, 8);
    interp.heap.write_u64(r.offset() + WORD, tag::REAL);
    interp
        .heap
        .write_u64(r.offset() + WORD + WORD, value.to_bits());
    Ok(r)
}

pub fn boolean(interp: &mut Interpreter, value: bool) -> Result<Ref, Fault> {
    let r = interp.alloc(scalar_size(1))?;
    write_scalar_header(interp, r, 1);
    interp.heap.write_u64(r.offset() + WORD, tag::BOOL);
    interp
        .heap
        .write_bytes(r.offset() + WORD + WORD, &[value as u8]);
    Ok(r)
}

pub fn nil(interp: &mut Interpreter) -> Result<Ref, Fault> {
    let r = interp.alloc(scalar_size(0))?;
    write_scalar_header(interp, r, 0);
    interp.heap.write_u64(r.offset() + WORD, tag::NIL);
    Ok(r)
}

/// `NUL`-terminated name, matching the source layout's symbol
/// representation; equality is by name comparison, not interning (§9).
pub fn symbol(interp: &mut Interpreter, name: &str) -> Result<Ref, Fault> {
    intern_text(interp, name, tag::SYMBOL)
}

pub fn string(interp: &mut Interpreter, text: &str) -> Result<Ref, Fault> {
    intern_text(interp, text, tag::STRING)
}

fn intern_text(interp: &mut Interpreter, text: &str, type_tag: u64) -> Result<Ref, Fault> {
    let payload_bytes = text.len() + 1; // NUL terminator
    let r = interp.alloc(scalar_size(payload_bytes))?;
    write_scalar_header(interp, r, payload_bytes);
    interp.heap.write_u64(r.offset() + WORD, type_tag);
    let data_off = r.offset() + WORD + WORD;
    interp.heap.write_bytes(data_off, text.as_bytes());
    interp.heap.write_bytes(data_off + text.len(), &[0]);
    Ok(r)
}

/// `index` is a position into the fixed primitive table built in
/// `globals::bootstrap` (§9: avoids transmuting an integer into a function
/// pointer).
pub fn natfun(interp: &mut Interpreter, index: u32) -> Result<Ref, Fault> {
    let r = interp.alloc(scalar_size(8))?;
    write_scalar_header(interp, r, 8);
    interp.heap.write_u64(r.offset() + WORD, tag::NATFUN);
    interp
        .heap
        .write_u64(r.offset() + WORD + WORD, index as u64);
    Ok(r)
}

fn ref_object_size(ref_count: u64) -> usize {
    WORD + ref_count as usize * WORD + WORD + 8
}

fn write_ref_header(interp: &mut Interpreter, r: Ref, ref_count: u64) {
    let header = Header::new(true, true, ref_count);
    interp.heap.write_header(r, header);
}

/// Writes the trailing payload-length word (always `8`: these objects'
/// only trailing payload is the one-word type tag) followed by the tag
/// itself, per the `refs=1, binary=1` layout in §3.
fn write_ref_tag(interp: &mut Interpreter, r: Ref, ref_count: u64, type_tag: u64) {
    let paylen_off = r.offset() + WORD + ref_count as usize * WORD;
    interp.heap.write_u64(paylen_off, 8);
    interp.heap.write_u64(paylen_off + WORD, type_tag);
}

/// Builds a CONS cell from the two values currently sitting at the given
/// absolute operand-stack indices (see `Stack::get`). The caller must not
/// have popped them yet — allocation may run a collection, and only values
/// still anchored on the stack survive it intact. Indices are read back
/// *after* allocating, so a relocation in between is already accounted for.
pub fn cons(interp: &mut Interpreter, head_index: usize, tail_index: usize) -> Result<Ref, Fault> {
    let r = interp.alloc(ref_object_size(2))?;
    write_ref_header(interp, r, 2);
    let head = interp.stack.get(head_index)?;
    let tail = interp.stack.get(tail_index)?;
    interp.heap.set_ref_slot(r, 0, head);
    interp.heap.set_ref_slot(r, 1, tail);
    write_ref_tag(interp, r, 2, tag::CONS);
    Ok(r)
}

/// Builds a LAMBDA closure from the formals/body/environment values at the
/// given absolute stack indices, under the same anchoring discipline as
/// `cons`.
pub fn lambda(
    interp: &mut Interpreter,
    formals_index: usize,
    body_index: usize,
    env_index: usize,
) -> Result<Ref, Fault> {
    let r = interp.alloc(ref_object_size(3))?;
    write_ref_header(interp, r, 3);
    let formals = interp.stack.get(formals_index)?;
    let body = interp.stack.get(body_index)?;
    let env = interp.stack.get(env_index)?;
    interp.heap.set_ref_slot(r, 0, formals);
    interp.heap.set_ref_slot(r, 1, body);
    interp.heap.set_ref_slot(r, 2, env);
    write_ref_tag(interp, r, 3, tag::LAMBDA);
    Ok(r)
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

pub fn read_integer(interp: &Interpreter, r: Ref) -> Result<i64, Fault> {
    expect_tag(interp, r, tag::INTEGER)?;
    Ok(interp.heap.read_u64(r.offset() + WORD + WORD) as i64)
}

pub fn read_real(interp: &Interpreter, r: Ref) -> Result<f64, Fault> {
    expect_tag(interp, r, tag::REAL)?;
    Ok(f64::from_bits(interp.heap.read_u64(r.offset() + WORD + WORD)))
}

pub fn read_bool(interp: &Interpreter, r: Ref) -> Result<bool, Fault> {
    expect_tag(interp, r, tag::BOOL)?;
    Ok(interp.heap.binary_bytes(r)[0] != 0)
}

/// Strips the trailing `NUL` terminator written by `symbol`/`string`.
fn read_text(interp: &Interpreter, r: Ref) -> &str {
    let bytes = interp.heap.binary_bytes(r);
    let without_nul = &bytes[..bytes.len() - 1];
    std::str::from_utf8(without_nul).expect("symbol/string payload is always valid UTF-8")
}

pub fn read_symbol<'a>(interp: &'a Interpreter, r: Ref) -> Result<&'a str, Fault> {
    expect_tag(interp, r, tag::SYMBOL)?;
    Ok(read_text(interp, r))
}

pub fn read_string<'a>(interp: &'a Interpreter, r: Ref) -> Result<&'a str, Fault> {
    expect_tag(interp, r, tag::STRING)?;
    Ok(read_text(interp, r))
}

pub fn read_natfun_index(interp: &Interpreter, r: Ref) -> Result<u32, Fault> {
    expect_tag(interp, r, tag::NATFUN)?;
    Ok(interp.heap.read_u64(r.offset() + WORD + WORD) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Interpreter {
        Interpreter::new(1 << 16, 1 << 20, 64)
    }

    #[test]
    fn integer_round_trips_through_tag_and_value() {
        let mut interp = fresh();
        let r = integer(&mut interp, -42).unwrap();
        assert_eq!(interp.heap.tag_of(r), tag::INTEGER);
        assert_eq!(
            interp.heap.read_u64(r.offset() + WORD + WORD) as i64,
            -42
        );
    }

    #[test]
    fn string_is_nul_terminated() {
        let mut interp = fresh();
        let r = string(&mut interp, "hi").unwrap();
        assert_eq!(interp.heap.tag_of(r), tag::STRING);
        assert_eq!(interp.heap.binary_bytes(r), b"hi\0");
    }

    #[test]
    fn cons_reads_anchored_stack_slots() {
        let mut interp = fresh();
        let a = integer(&mut interp, 1).unwrap();
        let b = integer(&mut interp, 2).unwrap();
        interp.stack.push(a).unwrap();
        interp.stack.push(b).unwrap();
        let pair = cons(&mut interp, 0, 1).unwrap();
        assert_eq!(interp.heap.tag_of(pair), tag::CONS);
        assert_eq!(interp.heap.ref_slot(pair, 0), interp.stack.get(0).unwrap());
        assert_eq!(interp.heap.ref_slot(pair, 1), interp.stack.get(1).unwrap());
    }
}
