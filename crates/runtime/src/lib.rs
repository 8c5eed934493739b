//! Lispr Runtime: constructors, primitives, evaluator, reader, and printer.
//!
//! Builds the actual language on top of `lispr-core`'s untyped heap: this
//! crate is where byte offsets start meaning "integer" or "cons cell".
//!
//! # Modules
//!
//! - `interpreter`: the owned `Interpreter` bundle (heap + stack + roots + source)
//! - `constructors`: one typed factory per semantic type
//! - `environment`: association-list `lookup`/`extend`
//! - `equality`: structural `=`
//! - `primitives`: stack-reshuffling and value primitives
//! - `globals`: the primitive table and bootstrap sequence
//! - `eval`: the tree-walking evaluator
//! - `reader`: the expression reader
//! - `printer`: printed-form rendering
//! - `error`: evaluator-level fatal error conditions (`Fault`)

pub mod constructors;
pub mod environment;
pub mod equality;
pub mod error;
pub mod eval;
pub mod globals;
pub mod interpreter;
pub mod primitives;
pub mod printer;
pub mod reader;

pub use error::Fault;
pub use eval::eval;
pub use globals::{bootstrap, execute_index, PrimFn, PRIMITIVE_TABLE};
pub use interpreter::Interpreter;
pub use printer::print_value;
pub use reader::read_expr;
