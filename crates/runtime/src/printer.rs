//! Printed-form rendering (§4.I).
//!
//! Pure formatting: no allocation, so nothing here needs stack anchoring.
//! `print_value` never panics on a well-formed heap — an object whose tag
//! falls outside the known range prints as `<atom:N>` per §6, rather than
//! being treated specially; it can only mean heap corruption, and at that
//! point every other operation is equally compromised.

use std::fmt::Write as _;

use lispr_core::header::tag;
use lispr_core::Ref;

use crate::constructors;
use crate::interpreter::Interpreter;

pub fn print_value(interp: &Interpreter, r: Ref) -> String {
    let mut out = String::new();
    write_value(interp, r, &mut out);
    out
}

fn write_value(interp: &Interpreter, r: Ref, out: &mut String) {
    match interp.heap.tag_of(r) {
        tag::INTEGER => {
            let _ = write!(out, "{}", constructors::read_integer(interp, r).unwrap());
        }
        tag::REAL => {
            let _ = write!(out, "{}", constructors::read_real(interp, r).unwrap());
        }
        tag::BOOL => {
            let b = constructors::read_bool(interp, r).unwrap();
            out.push_str(if b { "<true>" } else { "<false>" });
        }
        tag::NIL => out.push_str("()"),
        tag::SYMBOL => out.push_str(constructors::read_symbol(interp, r).unwrap()),
        tag::STRING => {
            out.push('"');
            out.push_str(constructors::read_string(interp, r).unwrap());
            out.push('"');
        }
        tag::NATFUN => {
            let index = constructors::read_natfun_index(interp, r).unwrap();
            let name = crate::globals::PRIMITIVE_TABLE
                .get(index as usize)
                .map(|(n, _)| *n)
                .unwrap_or("?");
            let _ = write!(out, "<native:{name}>");
        }
        tag::LAMBDA => {
            out.push('\\');
            write_value(interp, interp.heap.ref_slot(r, 0), out);
            out.push('.');
            write_value(interp, interp.heap.ref_slot(r, 1), out);
        }
        tag::CONS => write_cons(interp, r, out),
        other => {
            let _ = write!(out, "<atom:{other}>");
        }
    }
}

/// Proper lists print as `(a b c)`; an improper tail prints as `<head
/// tail>` at the point the spine stops being a CONS chain terminated by
/// NIL.
fn write_cons(interp: &Interpreter, r: Ref, out: &mut String) {
    let head = interp.heap.ref_slot(r, 0);
    let tail = interp.heap.ref_slot(r, 1);
    match interp.heap.tag_of(tail) {
        tag::NIL => {
            out.push('(');
            write_value(interp, head, out);
            out.push(')');
        }
        tag::CONS => {
            out.push('(');
            write_value(interp, head, out);
            let mut cur = tail;
            loop {
                match interp.heap.tag_of(cur) {
                    tag::NIL => break,
                    tag::CONS => {
                        out.push(' ');
                        write_value(interp, interp.heap.ref_slot(cur, 0), out);
                        cur = interp.heap.ref_slot(cur, 1);
                    }
                    _ => {
                        out.push_str(" . ");
                        write_value(interp, cur, out);
                        break;
                    }
                }
            }
            out.push(')');
        }
        _ => {
            out.push('<');
            write_value(interp, head, out);
            out.push(' ');
            write_value(interp, tail, out);
            out.push('>');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructors::{cons, integer, nil, symbol};
    use crate::globals::bootstrap;

    fn fresh() -> Interpreter {
        let mut interp = Interpreter::new(1 << 16, 1 << 20, 256);
        bootstrap(&mut interp).unwrap();
        interp
    }

    #[test]
    fn prints_an_integer() {
        let mut interp = fresh();
        let r = integer(&mut interp, -3).unwrap();
        assert_eq!(print_value(&interp, r), "-3");
    }

    #[test]
    fn prints_booleans_with_angle_brackets() {
        let interp = fresh();
        let t = interp.root(lispr_core::Root::True);
        let f = interp.root(lispr_core::Root::False);
        assert_eq!(print_value(&interp, t), "<true>");
        assert_eq!(print_value(&interp, f), "<false>");
    }

    #[test]
    fn prints_nil_as_empty_parens() {
        let mut interp = fresh();
        let n = nil(&mut interp).unwrap();
        assert_eq!(print_value(&interp, n), "()");
    }

    #[test]
    fn prints_a_proper_list() {
        let mut interp = fresh();
        let n = nil(&mut interp).unwrap();
        let one = integer(&mut interp, 1).unwrap();
        let two = integer(&mut interp, 2).unwrap();
        interp.stack.push(two).unwrap();
        interp.stack.push(n).unwrap();
        let inner = cons(&mut interp, 0, 1).unwrap();
        interp.stack.pop().unwrap();
        interp.stack.pop().unwrap();
        interp.stack.push(one).unwrap();
        interp.stack.push(inner).unwrap();
        let list = cons(&mut interp, 0, 1).unwrap();
        assert_eq!(print_value(&interp, list), "(1 2)");
    }

    #[test]
    fn prints_an_improper_pair() {
        let mut interp = fresh();
        let a = integer(&mut interp, 1).unwrap();
        let b = symbol(&mut interp, "x").unwrap();
        interp.stack.push(a).unwrap();
        interp.stack.push(b).unwrap();
        let pair = cons(&mut interp, 0, 1).unwrap();
        assert_eq!(print_value(&interp, pair), "<1 x>");
    }

    #[test]
    fn prints_a_native_function_by_name() {
        let mut interp = fresh();
        let key = symbol(&mut interp, "dup").unwrap();
        let g = interp.root(lispr_core::Root::Global);
        let found = crate::environment::lookup(&interp, g, key).unwrap().unwrap();
        assert_eq!(print_value(&interp, found), "<native:dup>");
    }
}
