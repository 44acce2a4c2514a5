//! A Tcl-compatible command tokenizer and `expr` evaluator.

pub mod cli;
pub mod config;
pub mod error;
pub mod script;

pub use error::{TclError, TclResult};
