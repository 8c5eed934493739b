//! `lispr`: the command-line shell for the interpreter (§4.G, §4.J).
//!
//! Reads a program from a file argument if given, or from stdin otherwise,
//! and evaluates top-level forms one at a time until input runs out. Every
//! fatal condition — a malformed form, an unbound symbol, a heap or stack
//! discipline violation — surfaces as a `lispr_runtime::error::Fault`; this
//! binary's only job once the interpreter is built is to read, evaluate,
//! and translate that `Result` into an exit code.

use std::io::Read as _;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use lispr_core::Root;
use lispr_runtime::error::Fault;
use lispr_runtime::interpreter::Interpreter;
use lispr_runtime::{globals, printer, reader};

/// The lispr interpreter: a garbage-collected stack-machine Lisp.
#[derive(Parser)]
#[command(name = "lispr")]
#[command(about = "Run a lispr program", long_about = None)]
struct Cli {
    /// Source file to evaluate. Reads stdin if omitted.
    input: Option<PathBuf>,

    /// Initial heap size in bytes.
    #[arg(long, default_value_t = 1 << 20)]
    heap_bytes: usize,

    /// Maximum heap size in bytes; the collector grows toward this ceiling
    /// before reporting out-of-memory.
    #[arg(long, default_value_t = 1 << 26)]
    max_heap_bytes: usize,

    /// Operand stack capacity, in slots.
    #[arg(long, default_value_t = lispr_core::stack::DEFAULT_CAPACITY)]
    stack_size: usize,

    /// Increase log verbosity. Repeatable; also honors `RUST_LOG`.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default_directive = match verbose {
        0 => "lispr=warn",
        1 => "lispr=info",
        2 => "lispr=debug",
        _ => "lispr=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn read_input(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => std::fs::read_to_string(p).unwrap_or_else(|e| {
            eprintln!("error: could not read {}: {e}", p.display());
            process::exit(1);
        }),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .unwrap_or_else(|e| {
                    eprintln!("error: could not read stdin: {e}");
                    process::exit(1);
                });
            text
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut interp = Interpreter::new(cli.heap_bytes, cli.max_heap_bytes, cli.stack_size);
    if let Err(e) = globals::bootstrap(&mut interp) {
        eprintln!("error: {e}");
        process::exit(1);
    }

    let source = read_input(&cli.input);
    interp.load_source(&source);

    if let Err(e) = run(&mut interp) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

/// The read-eval loop proper (§4.G): parse one top-level form, evaluate it
/// in GLOBAL, and if the result is itself a NATFUN, execute it — this is
/// how typing a bare primitive name like `print` or `global` at the top
/// level has an effect rather than just handing back an inert value.
fn run(interp: &mut Interpreter) -> Result<(), Fault> {
    loop {
        let expr = match reader::read_expr(interp)? {
            Some(expr) => expr,
            None => return Ok(()),
        };
        let env = interp.root(Root::Global);
        tracing::trace!(form = %printer::print_value(interp, expr), "evaluating top-level form");
        let value = lispr_runtime::eval(interp, env, expr)?;
        if reader::is_natfun(interp, value) {
            let index = lispr_runtime::constructors::read_natfun_index(interp, value)?;
            globals::execute_index(interp, index)?;
        }
    }
}
