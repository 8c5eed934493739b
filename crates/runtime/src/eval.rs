//! The tree-walking evaluator (§4.F).
//!
//! `eval` has the conceptual stack effect `(env expr -- value)`, but it is
//! implemented as an ordinary recursive Rust function rather than a
//! primitive, since it needs to recurse on sub-expressions and dispatch on
//! special forms before anything is pushed. It anchors `env` and `expr` at
//! absolute stack slots for its own duration: every nested call that might
//! allocate (a special form's own evaluation, an application's argument
//! evaluation, a `cons`) could trigger a collection, and a bare `Ref` local
//! held across such a call would go stale. Anywhere this function needs an
//! expr/env pair again after a nested call, it re-reads it from its anchor
//! slot rather than trusting a value captured earlier.

use lispr_core::header::tag;
use lispr_core::Ref;

use crate::constructors;
use crate::environment;
use crate::error::Fault;
use crate::globals;
use crate::interpreter::Interpreter;

pub fn eval(interp: &mut Interpreter, env: Ref, expr: Ref) -> Result<Ref, Fault> {
    let base = interp.stack.top_index();
    interp.stack.push(env)?;
    interp.stack.push(expr)?;
    let result = eval_anchored(interp, base, base + 1);
    // Pop the anchor slots regardless of outcome, leaving the stack as it
    // was found (plus, on success, the one result value).
    match result {
        Ok(value) => {
            while interp.stack.top_index() > base {
                interp.stack.pop()?;
            }
            interp.stack.push(value)?;
            Ok(value)
        }
        Err(e) => {
            while interp.stack.top_index() > base {
                interp.stack.pop()?;
            }
            Err(e)
        }
    }
}

/// `env_idx`/`expr_idx` are absolute stack indices holding the live
/// env/expr pair for this call. Re-read via `Stack::get` rather than held
/// as locals, since anything evaluated recursively beneath this call may
/// relocate the heap.
fn eval_anchored(interp: &mut Interpreter, env_idx: usize, expr_idx: usize) -> Result<Ref, Fault> {
    let expr = interp.stack.get(expr_idx)?;
    match interp.heap.tag_of(expr) {
        tag::INTEGER | tag::REAL | tag::STRING | tag::BOOL | tag::NIL | tag::NATFUN
        | tag::LAMBDA => Ok(expr),
        tag::SYMBOL => {
            let env = interp.stack.get(env_idx)?;
            let name = constructors::read_symbol(interp, expr)?.to_string();
            match environment::lookup(interp, env, expr)? {
                Some(value) => Ok(value),
                None => Err(Fault::UnboundSymbol { name }),
            }
        }
        tag::CONS => eval_cons(interp, env_idx, expr_idx),
        other => Err(Fault::TypeError {
            expected: "evaluable expression".to_string(),
            found: tag::name(other).to_string(),
        }),
    }
}

/// `expr` is a non-empty list: `(head . rest)`. `head` is either a special
/// form keyword (`quote`, `if`, `lambda`, `define`) or an operator
/// expression to evaluate and apply.
fn eval_cons(interp: &mut Interpreter, env_idx: usize, expr_idx: usize) -> Result<Ref, Fault> {
    let expr = interp.stack.get(expr_idx)?;
    let head = interp.heap.ref_slot(expr, 0);
    let rest = interp.heap.ref_slot(expr, 1);

    if interp.heap.tag_of(head) == tag::SYMBOL {
        let name = constructors::read_symbol(interp, head)?.to_string();
        match name.as_str() {
            "quote" => return eval_quote(interp, rest),
            "if" => return eval_if(interp, env_idx, rest),
            "lambda" => return eval_lambda(interp, env_idx, rest),
            "define" => return eval_define(interp, env_idx, rest),
            _ => {}
        }
    }

    eval_application(interp, env_idx, expr_idx)
}

fn list_part(interp: &Interpreter, list: Ref, index: usize) -> Result<Ref, Fault> {
    let mut cur = list;
    for _ in 0..index {
        if interp.heap.tag_of(cur) != tag::CONS {
            return Err(Fault::MalformedForm {
                form: "special form".to_string(),
            });
        }
        cur = interp.heap.ref_slot(cur, 1);
    }
    if interp.heap.tag_of(cur) != tag::CONS {
        return Err(Fault::MalformedForm {
            form: "special form".to_string(),
        });
    }
    Ok(interp.heap.ref_slot(cur, 0))
}

/// `(quote x)`: returns `x` unevaluated. No allocation, so no anchoring.
fn eval_quote(interp: &mut Interpreter, rest: Ref) -> Result<Ref, Fault> {
    list_part(interp, rest, 0)
}

/// `(if cond then else)`. The branch not taken is never evaluated. `cond`
/// must be anchored while it is evaluated (it may allocate), but `then`/
/// `else` are only read from the still-anchored `rest` list *after* that
/// evaluation returns, never cached across it.
fn eval_if(interp: &mut Interpreter, env_idx: usize, rest: Ref) -> Result<Ref, Fault> {
    let cond_expr = list_part(interp, rest, 0)?;
    let base = interp.stack.top_index();
    interp.stack.push(rest)?;
    let rest_idx = base;
    interp.stack.push(cond_expr)?;
    let cond_val = eval_anchored(interp, env_idx, base + 1)?;
    let truthy = constructors::read_bool(interp, cond_val)?;

    // Re-fetch rest from its anchor: the cond evaluation above may have
    // moved the heap, invalidating the `rest` Ref captured before the call.
    let rest = interp.stack.get(rest_idx)?;
    let branch_expr = if truthy {
        list_part(interp, rest, 1)?
    } else {
        list_part(interp, rest, 2)?
    };
    let result = {
        let branch_base = interp.stack.top_index();
        interp.stack.push(branch_expr)?;
        eval_anchored(interp, env_idx, branch_base)
    };
    while interp.stack.top_index() > base {
        interp.stack.pop()?;
    }
    result
}

/// `(lambda formals body)`. The closure captures the environment it was
/// created in, so `env` (re-read from its anchor) becomes the closure's
/// third field.
fn eval_lambda(interp: &mut Interpreter, env_idx: usize, rest: Ref) -> Result<Ref, Fault> {
    let formals = list_part(interp, rest, 0)?;
    let body = list_part(interp, rest, 1)?;
    let base = interp.stack.top_index();
    interp.stack.push(formals)?;
    interp.stack.push(body)?;
    let env = interp.stack.get(env_idx)?;
    interp.stack.push(env)?;
    let closure = constructors::lambda(interp, base, base + 1, base + 2)?;
    while interp.stack.top_index() > base {
        interp.stack.pop()?;
    }
    Ok(closure)
}

/// `(define name expr)`: binds `name` to the evaluated `expr` in the
/// current GLOBAL environment (top-level only; this language has no
/// internal-define form), and returns NIL — the new binding, not the bound
/// value, is the observable effect (§4.F).
fn eval_define(interp: &mut Interpreter, env_idx: usize, rest: Ref) -> Result<Ref, Fault> {
    let name_sym = list_part(interp, rest, 0)?;
    let value_expr = list_part(interp, rest, 1)?;
    let base = interp.stack.top_index();
    interp.stack.push(name_sym)?;
    let name_idx = base;
    interp.stack.push(value_expr)?;
    let value = eval_anchored(interp, env_idx, base + 1)?;

    let name = interp.stack.get(name_idx)?;
    let value_base = interp.stack.top_index();
    interp.stack.push(value)?;
    let value_idx = value_base;
    let global_env = interp.root(lispr_core::Root::Global);
    let updated = environment::extend(interp, global_env, name, interp.stack.get(value_idx)?)?;
    interp.set_root(lispr_core::Root::Global, updated);

    let result = interp.root(lispr_core::Root::Nil);
    while interp.stack.top_index() > base {
        interp.stack.pop()?;
    }
    Ok(result)
}

/// Evaluates the operator then each operand left to right, applying a
/// LAMBDA by extending its captured environment with a formals/argument
/// binding per pair (strict arity, §9) and evaluating its body in that
/// environment, or invoking a NATFUN directly against the operand stack.
fn eval_application(interp: &mut Interpreter, env_idx: usize, expr_idx: usize) -> Result<Ref, Fault> {
    let expr = interp.stack.get(expr_idx)?;
    let op_expr = interp.heap.ref_slot(expr, 0);
    let args_list = interp.heap.ref_slot(expr, 1);

    let base = interp.stack.top_index();
    interp.stack.push(args_list)?;
    let args_list_idx = base;
    interp.stack.push(op_expr)?;
    let op_val = eval_anchored(interp, env_idx, base + 1)?;
    interp.stack.push(op_val)?;
    let op_val_idx = interp.stack.top_index() - 1;

    // Phase 1: walk the args list collecting each argument *expression*
    // (unevaluated) contiguously on the stack. This walk does no
    // allocation of its own, so the bare `cur` cursor cannot go stale
    // between reads.
    let exprs_base = interp.stack.top_index();
    let mut cur = interp.stack.get(args_list_idx)?;
    let mut n = 0usize;
    loop {
        match interp.heap.tag_of(cur) {
            tag::NIL => break,
            tag::CONS => {
                interp.stack.push(interp.heap.ref_slot(cur, 0))?;
                cur = interp.heap.ref_slot(cur, 1);
                n += 1;
            }
            other => {
                while interp.stack.top_index() > base {
                    interp.stack.pop()?;
                }
                return Err(Fault::TypeError {
                    expected: "proper list".to_string(),
                    found: tag::name(other).to_string(),
                });
            }
        }
    }

    // Phase 2: evaluate each collected expression in order, pushing
    // results into a second contiguous region above the expressions. Each
    // `eval_anchored` call reads its expr from a stable `exprs_base + i`
    // slot, so an allocation triggered by evaluating argument `i` cannot
    // invalidate the still-unevaluated expressions queued behind it.
    let args_base = interp.stack.top_index();
    for i in 0..n {
        let val = eval_anchored(interp, env_idx, exprs_base + i)?;
        interp.stack.push(val)?;
    }
    let arg_count = n;

    let op_val = interp.stack.get(op_val_idx)?;
    let result = match interp.heap.tag_of(op_val) {
        tag::LAMBDA => apply_lambda(interp, op_val, args_base, arg_count),
        tag::NATFUN => apply_natfun(interp, op_val, args_base),
        other => Err(Fault::NotCallable {
            found: tag::name(other).to_string(),
        }),
    };

    let value = match result {
        Ok(v) => v,
        Err(e) => {
            while interp.stack.top_index() > base {
                interp.stack.pop()?;
            }
            return Err(e);
        }
    };
    while interp.stack.top_index() > base {
        interp.stack.pop()?;
    }
    interp.stack.push(value)?;
    Ok(value)
}

/// Binds each formal in `closure`'s formals list to the corresponding
/// argument already sitting on the stack at `[args_base, args_base +
/// arg_count)`, extending the closure's captured environment one binding
/// at a time, then evaluates the body in the resulting environment.
/// `closure` itself is re-read from the stack (pushed as an anchor)
/// rather than trusted as a bare local across the `extend` calls below.
fn apply_lambda(
    interp: &mut Interpreter,
    closure: Ref,
    args_base: usize,
    arg_count: usize,
) -> Result<Ref, Fault> {
    let anchor_base = interp.stack.top_index();
    interp.stack.push(closure)?;
    let closure_idx = anchor_base;

    let formals0 = interp.heap.ref_slot(interp.stack.get(closure_idx)?, 0);
    let env0 = interp.heap.ref_slot(interp.stack.get(closure_idx)?, 2);
    interp.stack.push(formals0)?;
    let mut formals_idx = closure_idx + 1;
    interp.stack.push(env0)?;
    let mut env_idx = closure_idx + 2;

    let mut bound = 0usize;
    loop {
        let formals = interp.stack.get(formals_idx)?;
        match interp.heap.tag_of(formals) {
            tag::NIL => break,
            tag::CONS => {
                if bound >= arg_count {
                    let remaining = count_remaining(interp, formals)?;
                    return Err(Fault::Arity {
                        expected: bound + remaining,
                        found: arg_count,
                    });
                }
                let name = interp.heap.ref_slot(formals, 0);
                let tail = interp.heap.ref_slot(formals, 1);
                let value = interp.stack.get(args_base + bound)?;

                // Anchor `tail` before `extend` allocates, since it is a
                // bare Ref that must survive the three conses extend runs.
                interp.stack.push(tail)?;
                let new_formals_idx = interp.stack.top_index() - 1;
                let env = interp.stack.get(env_idx)?;
                let new_env = environment::extend(interp, env, name, value)?;
                interp.stack.push(new_env)?;
                let new_env_idx = interp.stack.top_index() - 1;

                formals_idx = new_formals_idx;
                env_idx = new_env_idx;
                bound += 1;
            }
            other => {
                return Err(Fault::TypeError {
                    expected: "formals list".to_string(),
                    found: tag::name(other).to_string(),
                })
            }
        }
    }
    if bound != arg_count {
        return Err(Fault::Arity {
            expected: bound,
            found: arg_count,
        });
    }

    let closure = interp.stack.get(closure_idx)?;
    let body = interp.heap.ref_slot(closure, 1);
    let body_base = interp.stack.top_index();
    interp.stack.push(body)?;
    let value = eval_anchored(interp, env_idx, body_base)?;
    while interp.stack.top_index() > anchor_base {
        interp.stack.pop()?;
    }
    Ok(value)
}

fn count_remaining(interp: &Interpreter, mut formals: Ref) -> Result<usize, Fault> {
    let mut n = 0;
    while interp.heap.tag_of(formals) == tag::CONS {
        n += 1;
        formals = interp.heap.ref_slot(formals, 1);
    }
    Ok(n)
}

fn apply_natfun(interp: &mut Interpreter, natfun: Ref, args_base: usize) -> Result<Ref, Fault> {
    let index = constructors::read_natfun_index(interp, natfun)?;
    globals::execute_index(interp, index)?;
    // Normalize the primitive's own stack effect down to the single result
    // value `eval`'s contract promises: pop one value if the primitive left
    // anything above `args_base`, else substitute NIL (an ambient primitive
    // like `global!` has an empty net stack effect).
    let top = interp.stack.top_index();
    let value = if top > args_base {
        interp.stack.pop()?
    } else {
        interp.root(lispr_core::Root::Nil)
    };
    while interp.stack.top_index() > args_base {
        interp.stack.pop()?;
    }
    Ok(value)
}
