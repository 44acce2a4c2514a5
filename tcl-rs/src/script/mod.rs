//! Tcl command tokenizer and expression evaluator.
//!
//! The pieces, bottom up:
//!
//! - [`chars`] / [`backslash`]: character classes and escape decoding
//! - [`parser`]: splits a script into commands and words ([`token`])
//! - [`subst`]: turns parsed words into strings and runs commands
//! - [`number`] / [`value`]: literal scanning and typed operands
//! - [`expr`] / [`mathfunc`]: the `expr` language and its functions
//! - [`interp`]: an [`Interpreter`] that ties them together
//!
//! # Quick start
//!
//! ```rust
//! use tcl::script::Interpreter;
//!
//! let mut interp = Interpreter::new();
//! let result = interp.eval("set x 6; expr {$x * 7}").unwrap();
//! assert_eq!(result, "42");
//! ```

pub mod backslash;
pub mod chars;
pub mod expr;
pub mod interp;
pub mod list;
pub mod mathfunc;
pub mod number;
pub mod parser;
pub mod stack;
pub mod subst;
pub mod token;
pub mod value;

// Re-exports for convenience.
pub use expr::EvalContext;
pub use interp::Interpreter;
pub use value::{ExprValue, Value};
