//! End-to-end evaluation scenarios.
//!
//! Each test drives the full read/eval/print path the way the CLI shell
//! does, exercising lexical capture and garbage collection together
//! rather than in isolation: a closure is defined, a pile of unrelated
//! garbage is forced onto the heap through repeated collection, and the
//! closure is applied afterward to confirm its captured bindings survived
//! relocation.

use lispr_core::Root;
use lispr_runtime::globals::bootstrap;
use lispr_runtime::interpreter::Interpreter;
use lispr_runtime::reader::read_expr;
use lispr_runtime::{constructors, eval};

fn fresh(heap_bytes: usize) -> Interpreter {
    let mut interp = Interpreter::new(heap_bytes, heap_bytes * 64, 1024);
    bootstrap(&mut interp).unwrap();
    interp
}

fn run_all(interp: &mut Interpreter, src: &str) -> Vec<lispr_core::Ref> {
    interp.load_source(src);
    let mut results = Vec::new();
    while let Some(expr) = read_expr(interp).unwrap() {
        let env = interp.root(Root::Global);
        results.push(eval(interp, env, expr).unwrap());
    }
    results
}

#[test]
fn arithmetic_expression_evaluates_to_the_expected_integer() {
    let mut interp = fresh(1 << 14);
    let results = run_all(&mut interp, "(+ 1 2)");
    assert_eq!(
        constructors::read_integer(&interp, *results.last().unwrap()).unwrap(),
        3
    );
}

#[test]
fn defined_lambda_is_callable_by_name() {
    let mut interp = fresh(1 << 14);
    let results = run_all(&mut interp, "(define id (lambda (x) x)) (id 42)");
    assert_eq!(
        constructors::read_integer(&interp, *results.last().unwrap()).unwrap(),
        42
    );
}

#[test]
fn append_concatenates_two_quoted_lists() {
    let mut interp = fresh(1 << 14);
    let results = run_all(&mut interp, "(++ (quote (1 2)) (quote (3 4)))");
    let list = *results.last().unwrap();
    // walk the resulting spine and confirm it holds 1 2 3 4 in order
    let mut values = Vec::new();
    let mut cur = list;
    while interp.heap.tag_of(cur) == lispr_core::header::tag::CONS {
        let head = interp.heap.ref_slot(cur, 0);
        values.push(constructors::read_integer(&interp, head).unwrap());
        cur = interp.heap.ref_slot(cur, 1);
    }
    assert_eq!(values, vec![1, 2, 3, 4]);
}

#[test]
fn if_with_true_condition_evaluates_the_yes_branch() {
    let mut interp = fresh(1 << 14);
    let results = run_all(
        &mut interp,
        "(if (= 1 1) (quote yes) (quote no))",
    );
    let sym = *results.last().unwrap();
    assert_eq!(constructors::read_symbol(&interp, sym).unwrap(), "yes");
}

#[test]
fn nested_lambda_currying_captures_the_outer_argument() {
    let mut interp = fresh(1 << 14);
    let results = run_all(
        &mut interp,
        "(define k (lambda (x) (lambda (y) x))) ((k 7) 99)",
    );
    assert_eq!(
        constructors::read_integer(&interp, *results.last().unwrap()).unwrap(),
        7
    );
}

#[test]
fn closure_survives_many_forced_collections_before_use() {
    // A tiny initial heap forces frequent collection as garbage
    // accumulates between defining the closure and calling it.
    let mut interp = fresh(1 << 9);
    run_all(&mut interp, "(define k (lambda (x) (lambda (y) x)))");
    run_all(&mut interp, "(define held (k 11))");

    // Generate unrelated garbage, forcing the collector to run many times
    // and relocate everything still live, including `held`'s captured
    // environment.
    for i in 0..500 {
        run_all(&mut interp, &format!("(+ {i} {i})"));
    }
    interp.collect();

    let results = run_all(&mut interp, "(held 0)");
    assert_eq!(
        constructors::read_integer(&interp, *results.last().unwrap()).unwrap(),
        11
    );
}

#[test]
fn print_primitive_renders_to_stdout_and_evaluates_to_nil() {
    let mut interp = fresh(1 << 14);
    let results = run_all(&mut interp, "(print (+ 1 2))");
    assert_eq!(
        interp.heap.tag_of(*results.last().unwrap()),
        lispr_core::header::tag::NIL
    );
}

#[test]
fn global_bang_replaces_the_environment_wholesale() {
    let mut interp = fresh(1 << 14);
    run_all(
        &mut interp,
        "(define x 1) (define snapshot (global)) (define x 2)",
    );
    run_all(&mut interp, "(global! snapshot)");
    let results = run_all(&mut interp, "x");
    assert_eq!(
        constructors::read_integer(&interp, *results.last().unwrap()).unwrap(),
        1
    );
}

#[test]
fn unbound_symbol_reference_is_a_fatal_error() {
    let mut interp = fresh(1 << 14);
    interp.load_source("undefined-name");
    let expr = read_expr(&mut interp).unwrap().unwrap();
    let env = interp.root(Root::Global);
    assert!(eval(&mut interp, env, expr).is_err());
}
