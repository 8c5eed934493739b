//! The primitive table and bootstrap sequence (§4.D, §6, §9).
//!
//! `PRIMITIVE_TABLE` is the single source of truth for native-function
//! identity: a NATFUN object's payload is nothing but an index into this
//! table (§9, resolved Open Question — avoids transmuting an integer back
//! into a function pointer). `bootstrap` builds the NIL/TRUE/FALSE
//! singletons, installs them as named roots, and binds every table entry's
//! name to a NATFUN in a fresh GLOBAL environment.
//!
//! The table order matches the operator list in the design's glossary
//! exactly; tests below pin that order so a careless reshuffle is caught
//! immediately rather than silently renumbering every NATFUN already on
//! the heap of a running interpreter.

use lispr_core::header::tag;
use lispr_core::Root;

use crate::constructors;
use crate::environment;
use crate::error::Fault;
use crate::eval;
use crate::interpreter::Interpreter;
use crate::primitives;
use crate::printer;
use crate::reader;

pub type PrimFn = fn(&mut Interpreter) -> Result<(), Fault>;

pub const PRIMITIVE_TABLE: &[(&str, PrimFn)] = &[
    ("cons", primitives::cons),
    ("decons", primitives::decons),
    ("head", primitives::head),
    ("tail", primitives::tail),
    ("++", primitives::append),
    ("=", primitives::eq),
    ("<", primitives::lt),
    ("+", primitives::add),
    ("*", primitives::mul),
    ("/", primitives::div),
    ("neg", primitives::neg),
    ("extend", primitives::extend),
    ("lookup", primitives::lookup),
    ("global", global),
    ("global!", global_bang),
    ("parse", parse),
    ("eval", eval_primitive),
    ("print", print),
    ("swap", primitives::swap),
    ("dup", primitives::dup),
    ("drop", primitives::drop),
    ("over", primitives::over),
    ("nip", primitives::nip),
    ("rot", primitives::rot),
    ("execute", execute),
];

/// Creates the NIL/TRUE/FALSE singletons, an empty GLOBAL environment, then
/// binds every primitive table entry's name to a NATFUN in that
/// environment. Must run once, before any user code, since every other
/// constructor and primitive assumes the named roots are already real
/// objects rather than the placeholder `Ref(0)` `Interpreter::new` installs.
pub fn bootstrap(interp: &mut Interpreter) -> Result<(), Fault> {
    let nil = constructors::nil(interp)?;
    interp.set_root(Root::Nil, nil);
    let t = constructors::boolean(interp, true)?;
    interp.set_root(Root::True, t);
    let f = constructors::boolean(interp, false)?;
    interp.set_root(Root::False, f);
    interp.set_root(Root::Global, nil);

    for (index, (name, _)) in PRIMITIVE_TABLE.iter().enumerate() {
        // `sym` must be anchored on the stack before `natfun` allocates —
        // a collection there would otherwise relocate a bare local.
        let sym = constructors::symbol(interp, name)?;
        interp.stack.push(sym)?;
        let sym_idx = interp.stack.top_index() - 1;
        let fun = constructors::natfun(interp, index as u32)?;
        let sym = interp.stack.get(sym_idx)?;
        let current = interp.root(Root::Global);
        let updated = environment::extend(interp, current, sym, fun)?;
        interp.stack.pop()?;
        interp.set_root(Root::Global, updated);
    }
    Ok(())
}

/// Invokes `PRIMITIVE_TABLE[index]` by table index, shared by the `execute`
/// primitive and the CLI driver's auto-execute-NATFUN-result behavior
/// (§4.G): a bare NATFUN value produced by a top-level `eval` is run once
/// more for its effect, rather than just printed.
pub fn execute_index(interp: &mut Interpreter, index: u32) -> Result<(), Fault> {
    let (_, f) = PRIMITIVE_TABLE.get(index as usize).ok_or(Fault::Core(
        lispr_core::Fault::CorruptHeap {
            offset: index as usize,
        },
    ))?;
    f(interp)
}

/// `( -- env)`: pushes the current GLOBAL environment.
fn global(interp: &mut Interpreter) -> Result<(), Fault> {
    let g = interp.root(Root::Global);
    interp.stack.push(g)?;
    Ok(())
}

/// `(env -- )`: replaces GLOBAL with the environment on top of the stack.
fn global_bang(interp: &mut Interpreter) -> Result<(), Fault> {
    if interp.stack.len() < 1 {
        return Err(Fault::Core(lispr_core::Fault::StackUnderflow));
    }
    let env = interp.stack.pop()?;
    interp.set_root(Root::Global, env);
    Ok(())
}

/// `( -- expr)`: reads the next expression off the interpreter's remaining
/// input. Pushes the NIL root if input is exhausted, matching the reader's
/// "clean EOF" convention (§4.H) rather than raising a fault.
fn parse(interp: &mut Interpreter) -> Result<(), Fault> {
    match reader::read_expr(interp)? {
        Some(expr) => interp.stack.push(expr)?,
        None => {
            let n = interp.root(Root::Nil);
            interp.stack.push(n)?;
        }
    }
    Ok(())
}

/// `(env expr -- value)`
fn eval_primitive(interp: &mut Interpreter) -> Result<(), Fault> {
    if interp.stack.len() < 2 {
        return Err(Fault::Core(lispr_core::Fault::StackUnderflow));
    }
    let expr = interp.stack.pop()?;
    let env = interp.stack.pop()?;
    let value = eval::eval(interp, env, expr)?;
    interp.stack.push(value)?;
    Ok(())
}

/// `(a -- nil)`: prints the printed form of the top of stack to stdout,
/// then pops it and pushes NIL in its place (§4.I) — matching the
/// ground-truth `print` rather than returning `a`, so a bare top-level
/// `(print cons)` evaluates to NIL and is not auto-executed by the driver.
fn print(interp: &mut Interpreter) -> Result<(), Fault> {
    if interp.stack.len() < 1 {
        return Err(Fault::Core(lispr_core::Fault::StackUnderflow));
    }
    let v = interp.stack.pop()?;
    println!("{}", printer::print_value(interp, v));
    let n = interp.root(Root::Nil);
    interp.stack.push(n)?;
    Ok(())
}

/// `(natfun -- ...)`: looks up the NATFUN on top of stack and invokes it by
/// table index, letting it reshuffle the stack underneath its own effect.
fn execute(interp: &mut Interpreter) -> Result<(), Fault> {
    if interp.stack.len() < 1 {
        return Err(Fault::Core(lispr_core::Fault::StackUnderflow));
    }
    let f = interp.stack.pop()?;
    if interp.heap.tag_of(f) != tag::NATFUN {
        return Err(Fault::TypeError {
            expected: "native-function".to_string(),
            found: tag::name(interp.heap.tag_of(f)).to_string(),
        });
    }
    let index = constructors::read_natfun_index(interp, f)?;
    execute_index(interp, index)
}
