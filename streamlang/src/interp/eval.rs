//! Tree-walking evaluator
//!
//! Every node evaluates to a [`Signal`]. Faults travel as `Err`; user-level
//! exceptions travel as `Signal::Raised` and are caught by `TryCatch`.

use std::rc::Rc;

use tracing::{debug, warn};

use super::analysis;
use super::ops::{eval_binary, eval_unary};
use super::scope::{Binding, BlockKind, SymbolEntry};
use super::{
    Context, FunctionBody, FunctionMetadata, InterpResult, Overload, ParamSpec, RuntimeError,
    Signal,
};
use crate::ast::{BinOp, CatchClause, FnDecl, LambdaDef, Node, Param, Program, TypeExpr};
use crate::config::TerminationCheck;
use crate::types::{collect_items, Closure, Collection, ExceptionValue, TypeDescriptor, Value};

/// Stack growth parameters for deep recursion
pub(super) const STACK_RED_ZONE: usize = 128 * 1024; // 128KB remaining triggers growth
pub(super) const STACK_GROW_SIZE: usize = 4 * 1024 * 1024; // Grow by 4MB each time

/// Name lambdas are tracked under by the recursion guard and call stack
pub const LAMBDA_NAME: &str = "<lambda>";

/// Evaluate an operand; any signal other than `Normal` leaves the enclosing
/// function with that signal.
macro_rules! operand {
    ($node:expr, $ctx:expr) => {
        match $node.evaluate($ctx)? {
            Signal::Normal(value) => value.unwrap_or(Value::Void),
            other => return Ok(other),
        }
    };
}

/// Evaluate a branch or loop condition, which must be a `Boolean`.
macro_rules! condition {
    ($node:expr, $ctx:expr) => {
        match operand!($node, $ctx) {
            Value::Boolean(b) => b,
            other => return Err(RuntimeError::type_error("Boolean", other.type_name())),
        }
    };
}

impl Program {
    /// Evaluate the program in the context's global scope.
    ///
    /// A `Return` at the root is the program's result.
    pub fn evaluate(&self, ctx: &mut Context) -> InterpResult<Signal> {
        match eval_block(&self.body, ctx)? {
            Signal::Break => Err(RuntimeError::break_outside_loop()),
            Signal::Continue => Err(RuntimeError::continue_outside_loop()),
            other => Ok(other),
        }
    }
}

/// Evaluate a statement sequence, stopping at the first non-`Normal` signal.
pub(crate) fn eval_block(body: &[Node], ctx: &mut Context) -> InterpResult<Signal> {
    let mut last = Signal::unit();
    for node in body {
        last = node.evaluate(ctx)?;
        if !last.is_normal() {
            break;
        }
    }
    Ok(last)
}

impl Node {
    /// Evaluate this node against `ctx`
    pub fn evaluate(&self, ctx: &mut Context) -> InterpResult<Signal> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.evaluate_inner(ctx))
    }

    fn evaluate_inner(&self, ctx: &mut Context) -> InterpResult<Signal> {
        match self {
            Node::Int(n) => Ok(Signal::value(Value::Integer(*n))),
            Node::Float(x) => Ok(Signal::value(Value::Float(*x))),
            Node::Str(s) => Ok(Signal::value(Value::string(s))),
            Node::Bool(b) => Ok(Signal::value(Value::Boolean(*b))),

            Node::ArrayLit(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(operand!(item, ctx));
                }
                let (elem, values) = collect_items(&values)?;
                Ok(Signal::value(Value::Array(Collection::new(elem, values))))
            }

            Node::Var(name) => Ok(Signal::value(ctx.lookup(name)?)),

            Node::VarDecl { name, ty, value, constant } => {
                eval_var_decl(name, ty.as_ref(), value.as_deref(), *constant, ctx)
            }

            Node::Assign { name, value } => {
                let value = operand!(value, ctx);
                Ok(Signal::value(ctx.assign(name, value)?))
            }

            Node::Nonlocal(names) => {
                for name in names {
                    ctx.declare_nonlocal(name)?;
                }
                Ok(Signal::unit())
            }

            Node::Global(names) => {
                for name in names {
                    ctx.declare_global(name);
                }
                Ok(Signal::unit())
            }

            Node::Binary { left, op: op @ (BinOp::And | BinOp::Or), right } => {
                match (*op, operand!(left, ctx)) {
                    (BinOp::And, Value::Boolean(false)) => return Ok(Signal::value(Value::Boolean(false))),
                    (BinOp::Or, Value::Boolean(true)) => return Ok(Signal::value(Value::Boolean(true))),
                    (_, Value::Boolean(_)) => {}
                    (_, other) => return Err(RuntimeError::type_error("Boolean", other.type_name())),
                }
                match operand!(right, ctx) {
                    Value::Boolean(b) => Ok(Signal::value(Value::Boolean(b))),
                    other => Err(RuntimeError::type_error("Boolean", other.type_name())),
                }
            }

            Node::Binary { left, op, right } => {
                let left = operand!(left, ctx);
                let right = operand!(right, ctx);
                eval_binary(*op, left, right, ctx.registry())
            }

            Node::Unary { op, operand } => {
                let value = operand!(operand, ctx);
                Ok(Signal::value(eval_unary(*op, value)?))
            }

            Node::Index { target, index } => eval_index(target, index, ctx),

            Node::Block(body) => ctx.scoped(BlockKind::Block, |ctx| eval_block(body, ctx)),

            Node::If { cond, then_branch, else_branch } => {
                if condition!(cond, ctx) {
                    ctx.scoped(BlockKind::If, |ctx| eval_block(then_branch, ctx))
                } else if let Some(branch) = else_branch {
                    ctx.scoped(BlockKind::Else, |ctx| eval_block(branch, ctx))
                } else {
                    Ok(Signal::unit())
                }
            }

            Node::While { cond, body } => {
                loop {
                    if !condition!(cond, ctx) {
                        break;
                    }
                    match ctx.scoped(BlockKind::Loop, |ctx| eval_block(body, ctx))? {
                        Signal::Break => break,
                        Signal::Continue | Signal::Normal(_) => {}
                        other => return Ok(other),
                    }
                }
                Ok(Signal::unit())
            }

            Node::For { init, cond, step, body } => ctx.scoped(BlockKind::Loop, |ctx| {
                operand!(init, ctx);
                loop {
                    if !condition!(cond, ctx) {
                        break;
                    }
                    match ctx.scoped(BlockKind::Loop, |ctx| eval_block(body, ctx))? {
                        Signal::Break => break,
                        Signal::Continue | Signal::Normal(_) => {}
                        other => return Ok(other),
                    }
                    operand!(step, ctx);
                }
                Ok(Signal::unit())
            }),

            Node::Break => Ok(Signal::Break),
            Node::Continue => Ok(Signal::Continue),

            Node::Return(value) => {
                let value = match value {
                    Some(value) => operand!(value, ctx),
                    None => Value::Void,
                };
                Ok(Signal::Return(value))
            }

            Node::FnDecl(decl) => {
                let overload = user_overload(decl, ctx)?;
                check_termination(decl, ctx)?;
                ctx.declare_function(FunctionMetadata::with_overload(decl.name.as_str(), overload))?;
                Ok(Signal::unit())
            }

            Node::Call { func, args } => eval_call(func, args, ctx),

            Node::Lambda(def) => {
                let params = resolve_params(&def.params, ctx)?
                    .iter()
                    .map(ParamSpec::descriptor)
                    .collect();
                let closure = Closure {
                    def: Rc::new(def.clone()),
                    params,
                    scope: ctx.current_scope(),
                };
                Ok(Signal::value(Value::Lambda(Rc::new(closure))))
            }

            Node::Apply { callee, args } => {
                let closure = match operand!(callee, ctx) {
                    Value::Lambda(closure) => closure,
                    other => return Err(RuntimeError::type_error("a lambda", other.type_name())),
                };
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(operand!(arg, ctx));
                }
                apply_closure(&closure, values, ctx)
            }

            Node::TryCatch { body, handlers, finally } => {
                eval_try(body, handlers, finally.as_deref(), ctx)
            }

            Node::Throw(value) => match operand!(value, ctx) {
                Value::Exception(exc) => {
                    debug!(exception = %exc, "raise");
                    Ok(Signal::Raised(exc))
                }
                other => Err(RuntimeError::type_error("an exception", other.type_name())),
            },

            Node::Construct { ty, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(operand!(arg, ctx));
                }
                let target = ctx.registry().descriptor(ty)?;
                if let ([single], true) = (values.as_slice(), target.is_primitive()) {
                    return convert_or_raise(single, &target, ctx);
                }
                Ok(Signal::value(ctx.registry().construct(ty, &values)?))
            }

            Node::Convert { value, target } => {
                let value = operand!(value, ctx);
                let target = ctx.registry().resolve(target)?;
                convert_or_raise(&value, &target, ctx)
            }
        }
    }
}

fn eval_var_decl(
    name: &str,
    ty: Option<&TypeExpr>,
    value: Option<&Node>,
    constant: bool,
    ctx: &mut Context,
) -> InterpResult<Signal> {
    if ctx.is_declared_locally(name) {
        return Err(RuntimeError::redeclaration(name));
    }
    let declared = ty.map(|ty| ctx.registry().resolve(ty)).transpose()?;
    let value = match value {
        Some(node) => {
            let value = operand!(node, ctx);
            Some(match &declared {
                Some(ty) => ctx.coerce(value, ty)?,
                None => value,
            })
        }
        None => None,
    };
    let ty = declared.or_else(|| value.as_ref().map(Value::type_descriptor));
    ctx.declare_variable(name, SymbolEntry { ty, value, constant })?;
    Ok(Signal::unit())
}

fn eval_index(target: &Node, index: &Node, ctx: &mut Context) -> InterpResult<Signal> {
    let target = operand!(target, ctx);
    let index = match operand!(index, ctx) {
        Value::Integer(i) => i,
        other => return Err(RuntimeError::type_error("Integer", other.type_name())),
    };
    let position = usize::try_from(index).ok();
    let item = match &target {
        Value::String(s) => position
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::string(c.encode_utf8(&mut [0; 4]))),
        Value::Stream(items) => position.and_then(|i| items.get(i).cloned()),
        other => match other.as_collection() {
            Some(collection) => position.and_then(|i| collection.items.get(i).cloned()),
            None => return Err(RuntimeError::type_error("an indexable value", other.type_name())),
        },
    };
    match item {
        Some(item) => Ok(Signal::value(item)),
        None => {
            let message = format!("index {index} out of range");
            Ok(Signal::Raised(ctx.registry().exception("IndexError", message)?))
        }
    }
}

/// Apply a registered conversion, raising `TypeConversionError` when the
/// value cannot be converted.
fn convert_or_raise(value: &Value, target: &TypeDescriptor, ctx: &Context) -> InterpResult<Signal> {
    match ctx.registry().convert(value, target) {
        Some(converted) => Ok(Signal::value(converted)),
        None => {
            let message = format!("cannot convert {} {value} to {target}", value.type_name());
            Ok(Signal::Raised(ctx.registry().exception("TypeConversionError", message)?))
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

pub(crate) fn resolve_params(params: &[Param], ctx: &Context) -> InterpResult<Vec<ParamSpec>> {
    params
        .iter()
        .map(|param| {
            let ty = param.ty.as_ref().map(|ty| ctx.registry().resolve(ty)).transpose()?;
            Ok(ParamSpec { name: param.name.clone(), ty })
        })
        .collect()
}

/// Build the overload for a user declaration, bound to the current scope.
pub(crate) fn user_overload(decl: &FnDecl, ctx: &Context) -> InterpResult<Overload> {
    let params = resolve_params(&decl.params, ctx)?;
    let return_type = decl.ret_ty.as_ref().map(|ty| ctx.registry().resolve(ty)).transpose()?;
    Ok(Overload {
        params,
        return_type,
        body: FunctionBody::User {
            decl: Rc::new(decl.clone()),
            scope: Rc::downgrade(&ctx.current_scope()),
        },
    })
}

fn check_termination(decl: &FnDecl, ctx: &Context) -> InterpResult<()> {
    let policy = ctx.config().termination_check;
    if policy == TerminationCheck::Off
        || !analysis::is_self_recursive(decl)
        || analysis::has_termination_path(decl)
    {
        return Ok(());
    }
    match policy {
        TerminationCheck::Deny => Err(RuntimeError::possible_infinite_recursion(&decl.name)),
        _ => {
            warn!(function = %decl.name, "function calls itself but has no path that returns");
            Ok(())
        }
    }
}

enum Callee {
    Function(FunctionMetadata),
    Lambda(Rc<Closure>),
}

fn eval_call(func: &str, args: &[Node], ctx: &mut Context) -> InterpResult<Signal> {
    let callee = match ctx.binding(func) {
        Some(Binding::Function(meta)) => Callee::Function(meta),
        Some(Binding::Variable(SymbolEntry { value: Some(Value::Lambda(closure)), .. })) => {
            Callee::Lambda(closure)
        }
        Some(Binding::Variable(entry)) => {
            let got = entry.value.as_ref().map_or("an unassigned variable", Value::type_name);
            return Err(RuntimeError::type_error("a function", got));
        }
        None => return Err(RuntimeError::undefined_function_with_hint(func, ctx.visible_names())),
    };

    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(operand!(arg, ctx));
    }

    match callee {
        Callee::Lambda(closure) => apply_closure(&closure, values, ctx),
        Callee::Function(meta) => {
            let overload = meta
                .find_overload(values.len())
                .ok_or_else(|| RuntimeError::arity_mismatch(func, &meta.arities(), values.len()))?;
            call_overload(func, overload, values, ctx)
        }
    }
}

/// Invoke one overload with evaluated arguments.
///
/// Completes with `Normal(result)` or `Raised`; the frame and the function
/// scope are popped on every path.
pub fn call_overload(
    name: &str,
    overload: &Overload,
    args: Vec<Value>,
    ctx: &mut Context,
) -> InterpResult<Signal> {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
        call_overload_inner(name, overload, args, ctx)
    })
}

fn call_overload_inner(
    name: &str,
    overload: &Overload,
    args: Vec<Value>,
    ctx: &mut Context,
) -> InterpResult<Signal> {
    match &overload.body {
        FunctionBody::Builtin(callable) => {
            let global = ctx.global_scope();
            ctx.enter_call(name, args.clone(), global)?;
            let result = callable
                .invoke(&args, ctx)
                .map_err(|err| err.with_trace(ctx.stack_trace()));
            ctx.exit_call(name);
            match result? {
                Signal::Normal(value) => Ok(Signal::value(value.unwrap_or(Value::Void))),
                Signal::Raised(exc) => Ok(Signal::Raised(exc)),
                other => Err(RuntimeError::unsupported(&format!(
                    "builtin {name} completed with {other:?}"
                ))),
            }
        }
        FunctionBody::User { decl, scope } => {
            let parent = scope.upgrade().unwrap_or_else(|| ctx.global_scope());
            ctx.push_scope_with_parent(BlockKind::Function, parent);
            let frame_scope = ctx.current_scope();
            if let Err(err) = ctx.enter_call(name, args.clone(), frame_scope) {
                ctx.pop_scope();
                return Err(err);
            }
            let result = run_user_body(overload, decl, args, ctx)
                .map_err(|err| err.with_trace(ctx.stack_trace()));
            ctx.exit_call(name);
            ctx.pop_scope();
            result
        }
    }
}

fn run_user_body(
    overload: &Overload,
    decl: &FnDecl,
    args: Vec<Value>,
    ctx: &mut Context,
) -> InterpResult<Signal> {
    for (param, arg) in overload.params.iter().zip(args) {
        let arg = match &param.ty {
            Some(ty) => ctx.coerce(arg, ty)?,
            None => arg,
        };
        let ty = param.ty.clone().unwrap_or_else(|| arg.type_descriptor());
        ctx.declare_variable(&param.name, SymbolEntry::variable(Some(ty), Some(arg)))?;
    }
    let value = match eval_block(&decl.body, ctx)? {
        Signal::Return(value) => value,
        Signal::Normal(_) => Value::Void,
        Signal::Break => return Err(RuntimeError::break_outside_loop()),
        Signal::Continue => return Err(RuntimeError::continue_outside_loop()),
        Signal::Raised(exc) => return Ok(Signal::Raised(exc)),
    };
    let value = match &overload.return_type {
        Some(ret) => ctx.coerce(value, ret)?,
        None => value,
    };
    Ok(Signal::value(value))
}

/// Apply a lambda to evaluated arguments in a scope under its captured one.
pub fn apply_closure(closure: &Closure, args: Vec<Value>, ctx: &mut Context) -> InterpResult<Signal> {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
        apply_closure_inner(closure, args, ctx)
    })
}

fn apply_closure_inner(closure: &Closure, args: Vec<Value>, ctx: &mut Context) -> InterpResult<Signal> {
    let arity = closure.def.params.len();
    if args.len() != arity {
        return Err(RuntimeError::arity_mismatch(LAMBDA_NAME, &[arity], args.len()));
    }
    ctx.push_scope_with_parent(BlockKind::Lambda, Rc::clone(&closure.scope));
    let frame_scope = ctx.current_scope();
    if let Err(err) = ctx.enter_call(LAMBDA_NAME, args.clone(), frame_scope) {
        ctx.pop_scope();
        return Err(err);
    }
    let result = run_lambda_body(closure, args, ctx).map_err(|err| err.with_trace(ctx.stack_trace()));
    ctx.exit_call(LAMBDA_NAME);
    ctx.pop_scope();
    result
}

fn run_lambda_body(closure: &Closure, args: Vec<Value>, ctx: &mut Context) -> InterpResult<Signal> {
    let LambdaDef { params, body } = closure.def.as_ref();
    for ((param, ty), arg) in params.iter().zip(&closure.params).zip(args) {
        let arg = ctx.coerce(arg, ty)?;
        let ty = if ty.is_any() { arg.type_descriptor() } else { ty.clone() };
        ctx.declare_variable(&param.name, SymbolEntry::variable(Some(ty), Some(arg)))?;
    }
    match eval_block(body, ctx)? {
        Signal::Normal(value) => Ok(Signal::value(value.unwrap_or(Value::Void))),
        Signal::Raised(exc) => Ok(Signal::Raised(exc)),
        Signal::Return(_) => Err(RuntimeError::return_outside_function()),
        Signal::Break => Err(RuntimeError::break_outside_loop()),
        Signal::Continue => Err(RuntimeError::continue_outside_loop()),
    }
}

// ============================================================================
// Exceptions
// ============================================================================

fn eval_try(
    body: &[Node],
    handlers: &[CatchClause],
    finally: Option<&[Node]>,
    ctx: &mut Context,
) -> InterpResult<Signal> {
    let mut signal = ctx.scoped(BlockKind::Try, |ctx| eval_block(body, ctx))?;
    if let Signal::Raised(exc) = signal {
        signal = handle_raised(exc, handlers, ctx)?;
    }
    if let Some(finally) = finally {
        let after = ctx.scoped(BlockKind::Finally, |ctx| eval_block(finally, ctx))?;
        if !after.is_normal() {
            return Ok(after);
        }
    }
    Ok(signal)
}

/// Run the first handler whose type the exception is a subtype of.
fn handle_raised(exc: ExceptionValue, handlers: &[CatchClause], ctx: &mut Context) -> InterpResult<Signal> {
    for handler in handlers {
        let handled = ctx.registry().exception_type(&handler.exception)?;
        if exc.ty.is_subtype_of(&handled) {
            debug!(exception = %exc, handler = %handled, "catch");
            return ctx.scoped(BlockKind::Catch, |ctx| {
                let ty = TypeDescriptor::Exception(exc.ty.clone());
                let entry = SymbolEntry::constant(Some(ty), Some(Value::Exception(exc)));
                ctx.declare_variable(&handler.binding, entry)?;
                eval_block(&handler.body, ctx)
            });
        }
    }
    Ok(Signal::Raised(exc))
}
