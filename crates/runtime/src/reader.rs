//! The expression reader (§4.H).
//!
//! Consumes characters from `interp.source`, one expression at a time.
//! `read_expr` returns `Ok(None)` on a clean end of input (only whitespace
//! remained) and `Err(Fault::ParseError)` on anything malformed partway
//! through a form. There is no lookahead buffer beyond the single
//! already-peeked character each helper needs — the `VecDeque<char>` is
//! the whole input, popped from the front as it is consumed.

use lispr_core::header::tag;
use lispr_core::Ref;

use crate::constructors;
use crate::error::Fault;
use crate::interpreter::Interpreter;

fn peek(interp: &Interpreter) -> Option<char> {
    interp.source.front().copied()
}

fn advance(interp: &mut Interpreter) -> Option<char> {
    interp.source.pop_front()
}

fn skip_whitespace(interp: &mut Interpreter) {
    while matches!(peek(interp), Some(c) if c.is_whitespace()) {
        advance(interp);
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || c == '(' || c == ')' || c == '"'
}

/// Reads the next expression, or `None` if only whitespace remains.
pub fn read_expr(interp: &mut Interpreter) -> Result<Option<Ref>, Fault> {
    skip_whitespace(interp);
    match peek(interp) {
        None => Ok(None),
        Some('(') => Ok(Some(read_list(interp)?)),
        Some(')') => Err(Fault::ParseError {
            message: "unexpected ')'".to_string(),
        }),
        Some('"') => Ok(Some(read_string_literal(interp)?)),
        Some(_) => Ok(Some(read_atom(interp)?)),
    }
}

/// Builds a proper list by first collecting each element as a plain `Ref`
/// (no allocation happens while reading sub-expressions recursively — each
/// recursive `read_expr` call allocates its own result independently and
/// returns it, so nothing here is invalidated by a later sibling's
/// allocation; each element is anchored on the operand stack the moment it
/// comes back), then folding right to left into conses.
fn read_list(interp: &mut Interpreter) -> Result<Ref, Fault> {
    advance(interp); // consume '('
    let base = interp.stack.top_index();
    let mut count = 0usize;
    loop {
        skip_whitespace(interp);
        match peek(interp) {
            None => {
                while interp.stack.top_index() > base {
                    interp.stack.pop()?;
                }
                return Err(Fault::ParseError {
                    message: "unterminated list".to_string(),
                });
            }
            Some(')') => {
                advance(interp);
                break;
            }
            Some(_) => {
                let elem = read_expr(interp)?.expect("peeked a non-EOF, non-')' character");
                interp.stack.push(elem)?;
                count += 1;
            }
        }
    }

    if count == 0 {
        return Ok(interp.root(lispr_core::Root::Nil));
    }

    let nil = interp.root(lispr_core::Root::Nil);
    interp.stack.push(nil)?;
    let mut acc_index = interp.stack.top_index() - 1;
    for i in (0..count).rev() {
        let elem_index = base + i;
        let new_acc = constructors::cons(interp, elem_index, acc_index)?;
        interp.stack.push(new_acc)?;
        acc_index = interp.stack.top_index() - 1;
    }
    let result = interp.stack.get(acc_index)?;
    while interp.stack.top_index() > base {
        interp.stack.pop()?;
    }
    Ok(result)
}

/// No escape sequences: a backslash is a literal character. The closing
/// quote must appear before input runs out.
fn read_string_literal(interp: &mut Interpreter) -> Result<Ref, Fault> {
    advance(interp); // consume opening '"'
    let mut text = String::new();
    loop {
        match advance(interp) {
            None => {
                return Err(Fault::ParseError {
                    message: "unterminated string literal".to_string(),
                })
            }
            Some('"') => break,
            Some(c) => text.push(c),
        }
    }
    constructors::string(interp, &text)
}

/// Collects characters up to the next delimiter, then classifies the
/// result: a valid `i64` literal becomes INTEGER, a valid `f64` literal
/// (that isn't also a valid `i64`) becomes REAL, anything else is a
/// SYMBOL.
fn read_atom(interp: &mut Interpreter) -> Result<Ref, Fault> {
    let mut text = String::new();
    while let Some(c) = peek(interp) {
        if is_delimiter(c) {
            break;
        }
        text.push(c);
        advance(interp);
    }
    if text.is_empty() {
        return Err(Fault::ParseError {
            message: "empty atom".to_string(),
        });
    }
    if let Ok(i) = text.parse::<i64>() {
        return constructors::integer(interp, i);
    }
    if let Ok(f) = text.parse::<f64>() {
        return constructors::real(interp, f);
    }
    constructors::symbol(interp, &text)
}

/// Used by the CLI driver (§4.G) to tell a bare NATFUN value apart from
/// anything else a top-level read-eval produced, so it knows whether to
/// auto-execute it.
pub fn is_natfun(interp: &Interpreter, r: Ref) -> bool {
    interp.heap.tag_of(r) == tag::NATFUN
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Interpreter {
        let mut interp = Interpreter::new(1 << 16, 1 << 20, 512);
        let n = constructors::nil(&mut interp).unwrap();
        interp.set_root(lispr_core::Root::Nil, n);
        interp
    }

    #[test]
    fn reads_an_integer() {
        let mut interp = fresh();
        interp.load_source("42");
        let r = read_expr(&mut interp).unwrap().unwrap();
        assert_eq!(interp.heap.tag_of(r), tag::INTEGER);
        assert_eq!(constructors::read_integer(&interp, r).unwrap(), 42);
    }

    #[test]
    fn reads_a_negative_integer() {
        let mut interp = fresh();
        interp.load_source("-7");
        let r = read_expr(&mut interp).unwrap().unwrap();
        assert_eq!(constructors::read_integer(&interp, r).unwrap(), -7);
    }

    #[test]
    fn reads_a_real() {
        let mut interp = fresh();
        interp.load_source("3.5");
        let r = read_expr(&mut interp).unwrap().unwrap();
        assert_eq!(interp.heap.tag_of(r), tag::REAL);
        assert_eq!(constructors::read_real(&interp, r).unwrap(), 3.5);
    }

    #[test]
    fn reads_a_symbol() {
        let mut interp = fresh();
        interp.load_source("foo-bar");
        let r = read_expr(&mut interp).unwrap().unwrap();
        assert_eq!(interp.heap.tag_of(r), tag::SYMBOL);
        assert_eq!(constructors::read_symbol(&interp, r).unwrap(), "foo-bar");
    }

    #[test]
    fn reads_a_string_literal() {
        let mut interp = fresh();
        interp.load_source("\"hello world\"");
        let r = read_expr(&mut interp).unwrap().unwrap();
        assert_eq!(constructors::read_string(&interp, r).unwrap(), "hello world");
    }

    #[test]
    fn reads_an_empty_list_as_nil() {
        let mut interp = fresh();
        interp.load_source("()");
        let r = read_expr(&mut interp).unwrap().unwrap();
        assert_eq!(interp.heap.tag_of(r), tag::NIL);
    }

    #[test]
    fn reads_a_nested_list() {
        let mut interp = fresh();
        interp.load_source("(1 (2 3) 4)");
        let r = read_expr(&mut interp).unwrap().unwrap();
        assert_eq!(interp.heap.tag_of(r), tag::CONS);
        let second = interp.heap.ref_slot(interp.heap.ref_slot(r, 1), 0);
        assert_eq!(interp.heap.tag_of(second), tag::CONS);
    }

    #[test]
    fn clean_eof_returns_none() {
        let mut interp = fresh();
        interp.load_source("   ");
        assert_eq!(read_expr(&mut interp).unwrap(), None);
    }

    #[test]
    fn unterminated_list_is_a_parse_error() {
        let mut interp = fresh();
        interp.load_source("(1 2");
        assert!(matches!(
            read_expr(&mut interp),
            Err(Fault::ParseError { .. })
        ));
    }

    #[test]
    fn reads_successive_expressions_from_the_same_source() {
        let mut interp = fresh();
        interp.load_source("1 2 3");
        let a = read_expr(&mut interp).unwrap().unwrap();
        let b = read_expr(&mut interp).unwrap().unwrap();
        let c = read_expr(&mut interp).unwrap().unwrap();
        assert_eq!(constructors::read_integer(&interp, a).unwrap(), 1);
        assert_eq!(constructors::read_integer(&interp, b).unwrap(), 2);
        assert_eq!(constructors::read_integer(&interp, c).unwrap(), 3);
        assert_eq!(read_expr(&mut interp).unwrap(), None);
    }
}
