//! StreamLanguage execution core
//!
//! AST evaluation with block scoping, a static type pass, user and builtin
//! functions with arity overloads, and try/catch/finally over a registry of
//! exception types.

pub mod ast;
pub mod config;
pub mod error;
pub mod interp;
pub mod types;

pub use ast::Program;
pub use config::InterpreterConfig;
pub use error::{Error, Result};
pub use interp::{Interpreter, Outcome};
