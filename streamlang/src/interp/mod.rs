//! Tree-walking interpreter for StreamLanguage programs
//!
//! [`Program::evaluate`](crate::ast::Program::evaluate) is the single entry
//! point; [`Interpreter`] wraps it with the optional static pass and maps the
//! final signal to an [`Outcome`].

mod analysis;
mod builtins;
mod context;
mod error;
mod eval;
mod function;
mod ops;
mod scope;
mod signal;
mod typeck;

pub use analysis::{has_termination_path, is_self_recursive};
pub use context::{CallFrame, Context};
pub use error::{ErrorKind, InterpResult, RuntimeError};
pub use eval::{apply_closure, call_overload, LAMBDA_NAME};
pub use function::{Callable, FunctionBody, FunctionMetadata, Overload, ParamSpec};
pub use scope::{Binding, BlockKind, ScopeRef, SymbolEntry, SymbolTable};
pub use signal::Signal;
pub use typeck::ReturnSlot;

use tracing::debug;

use crate::ast::Program;
use crate::config::InterpreterConfig;
use crate::types::{ExceptionValue, TypeDescriptor, TypeRegistry, Value};

/// How a program run ended, when it did not fault
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Root `return` value, or the last statement's value
    Completed(Option<Value>),
    /// A user exception no handler caught
    Uncaught(ExceptionValue),
}

/// Owns a [`Context`] and runs programs against it
#[derive(Debug)]
pub struct Interpreter {
    ctx: Context,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        Interpreter { ctx: Context::new(config) }
    }

    /// Use a registry prepared by the embedder (extra exception types).
    pub fn with_registry(config: InterpreterConfig, registry: TypeRegistry) -> Self {
        Interpreter { ctx: Context::with_registry(config, registry) }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }

    /// Run the static pass on a scratch context sharing this registry.
    ///
    /// Leaves the interpreter's own scopes untouched.
    pub fn check(&self, program: &Program) -> InterpResult<TypeDescriptor> {
        let mut scratch = Context::with_registry(self.ctx.config().clone(), self.ctx.registry().clone());
        program.type_of(&mut scratch)
    }

    /// Type-check (if configured) and evaluate `program`.
    pub fn run(&mut self, program: &Program) -> InterpResult<Outcome> {
        if self.ctx.config().type_check {
            let ty = self.check(program)?;
            debug!(%ty, "static pass");
        }
        match program.evaluate(&mut self.ctx)? {
            Signal::Normal(value) => Ok(Outcome::Completed(value)),
            Signal::Return(value) => Ok(Outcome::Completed(Some(value))),
            Signal::Raised(exc) => {
                debug!(exception = %exc, "uncaught");
                Ok(Outcome::Uncaught(exc))
            }
            Signal::Break => Err(RuntimeError::break_outside_loop()),
            Signal::Continue => Err(RuntimeError::continue_outside_loop()),
        }
    }

    /// Lines printed so far in capture mode
    pub fn output(&self) -> &[String] {
        self.ctx.output()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
