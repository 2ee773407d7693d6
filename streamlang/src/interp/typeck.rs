//! Static pass: `type_of` for programs and nodes
//!
//! Mirrors `evaluate` without computing values. Type bindings are written
//! into the context's scopes, so the pass runs on a scratch context (see
//! [`Interpreter::check`](super::Interpreter::check)).
//!
//! Function signatures in a statement list are registered before any
//! statement is checked. A body is checked where it is declared; one that
//! refers to a name declared later in the list is checked again once the
//! whole list has been typed.

use std::mem;

use super::eval::{resolve_params, user_overload, LAMBDA_NAME, STACK_GROW_SIZE, STACK_RED_ZONE};
use super::scope::{Binding, BlockKind, SymbolEntry};
use super::{
    Context, ErrorKind, FunctionBody, FunctionMetadata, InterpResult, ParamSpec,
    RuntimeError,
};
use crate::ast::{BinOp, CatchClause, FnDecl, LambdaDef, Node, Program, TypeExpr, UnOp};
use crate::types::{unify_all, TypeDescriptor};

/// Return target of the body currently being checked
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnSlot {
    /// Function body (or program root); collects the types returned
    Function {
        declared: Option<TypeDescriptor>,
        seen: Vec<TypeDescriptor>,
    },
    /// Lambda body, where `return` is not allowed
    Lambda,
}

impl Program {
    /// Static type of the program's result.
    ///
    /// The join of root-level returns and, unless the body ends in a
    /// transfer, the type of the last statement.
    pub fn type_of(&self, ctx: &mut Context) -> InterpResult<TypeDescriptor> {
        ctx.returns.push(ReturnSlot::Function { declared: None, seen: Vec::new() });
        let last = type_block(&self.body, ctx);
        let slot = ctx.returns.pop();
        let last = last?;
        Ok(body_result(&self.body, seen_returns(slot), last))
    }
}

/// The type every one of `types` has, `Any` when they differ.
///
/// No widening: evaluation hands back the value of whichever branch or
/// return ran, so `Integer` next to `Float` is not `Float`.
fn join(types: &[TypeDescriptor]) -> TypeDescriptor {
    match types.split_first() {
        Some((first, rest)) if rest.iter().all(|ty| ty == first) => first.clone(),
        Some(_) => TypeDescriptor::Any,
        None => TypeDescriptor::Void,
    }
}

fn seen_returns(slot: Option<ReturnSlot>) -> Vec<TypeDescriptor> {
    match slot {
        Some(ReturnSlot::Function { seen, .. }) => seen,
        _ => Vec::new(),
    }
}

/// Result type of a body from its `return` types and the type it has when
/// control falls off the end.
fn body_result(body: &[Node], mut returns: Vec<TypeDescriptor>, fallthrough: TypeDescriptor) -> TypeDescriptor {
    if !matches!(body.last(), Some(Node::Return(_) | Node::Throw(_))) {
        returns.push(fallthrough);
    }
    join(&returns)
}

fn type_block(body: &[Node], ctx: &mut Context) -> InterpResult<TypeDescriptor> {
    for node in body {
        if let Node::FnDecl(decl) = node {
            declare_signature(decl, ctx)?;
        }
    }
    let mut deferred = Vec::new();
    let mut last = TypeDescriptor::Void;
    for node in body {
        last = match node {
            Node::FnDecl(decl) => {
                match check_function_body(decl, ctx) {
                    Ok(()) => {}
                    Err(err) if is_forward_reference(&err) => deferred.push(decl),
                    Err(err) => return Err(err),
                }
                TypeDescriptor::Void
            }
            other => other.type_of(ctx)?,
        };
    }
    for decl in deferred {
        check_function_body(decl, ctx)?;
    }
    Ok(last)
}

fn is_forward_reference(err: &RuntimeError) -> bool {
    matches!(err.kind, ErrorKind::UndefinedVariable | ErrorKind::UndefinedFunction)
}

impl Node {
    /// Static type of this node
    pub fn type_of(&self, ctx: &mut Context) -> InterpResult<TypeDescriptor> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.type_of_inner(ctx))
    }

    fn type_of_inner(&self, ctx: &mut Context) -> InterpResult<TypeDescriptor> {
        use TypeDescriptor as T;
        match self {
            Node::Int(_) => Ok(T::Integer),
            Node::Float(_) => Ok(T::Float),
            Node::Str(_) => Ok(T::String),
            Node::Bool(_) => Ok(T::Boolean),

            Node::ArrayLit(items) => {
                let mut types = Vec::with_capacity(items.len());
                for item in items {
                    types.push(item.type_of(ctx)?);
                }
                Ok(T::array(unify_all(&types)?))
            }

            Node::Var(name) => ctx.lookup_type(name),

            Node::VarDecl { name, ty, value, constant } => {
                type_var_decl(name, ty.as_ref(), value.as_deref(), *constant, ctx)
            }

            Node::Assign { name, value } => {
                let ty = value.type_of(ctx)?;
                ctx.assign_type(name, ty)
            }

            Node::Nonlocal(names) => {
                for name in names {
                    ctx.declare_nonlocal(name)?;
                }
                Ok(T::Void)
            }

            Node::Global(names) => {
                for name in names {
                    ctx.declare_global(name);
                }
                Ok(T::Void)
            }

            Node::Binary { left, op, right } => {
                let left = left.type_of(ctx)?;
                let right = right.type_of(ctx)?;
                binary_type(*op, &left, &right)
            }

            Node::Unary { op, operand } => {
                let ty = operand.type_of(ctx)?;
                match (op, &ty) {
                    (_, T::Any) => Ok(T::Any),
                    (UnOp::Not, T::Boolean) => Ok(T::Boolean),
                    (UnOp::Not, _) => Err(RuntimeError::type_error("Boolean", &ty.to_string())),
                    (_, ty) if ty.is_numeric() => Ok(ty.clone()),
                    _ => Err(RuntimeError::type_error("numeric", &ty.to_string())),
                }
            }

            Node::Index { target, index } => {
                let target = target.type_of(ctx)?;
                let index = index.type_of(ctx)?;
                if !T::Integer.accepts(&index) {
                    return Err(RuntimeError::type_error("Integer", &index.to_string()));
                }
                match &target {
                    T::Any | T::Stream => Ok(T::Any),
                    T::String => Ok(T::String),
                    other => other.element().cloned().ok_or_else(|| {
                        RuntimeError::type_error("an indexable value", &other.to_string())
                    }),
                }
            }

            Node::Block(body) => ctx.scoped(BlockKind::Block, |ctx| type_block(body, ctx)),

            Node::If { cond, then_branch, else_branch } => {
                expect_condition(cond, ctx)?;
                let then_ty = ctx.scoped(BlockKind::If, |ctx| type_block(then_branch, ctx))?;
                // a missing else completes with no value
                let else_ty = match else_branch {
                    Some(branch) => ctx.scoped(BlockKind::Else, |ctx| type_block(branch, ctx))?,
                    None => T::Void,
                };
                Ok(join(&[then_ty, else_ty]))
            }

            Node::While { cond, body } => {
                expect_condition(cond, ctx)?;
                in_loop(ctx, |ctx| ctx.scoped(BlockKind::Loop, |ctx| type_block(body, ctx)))?;
                Ok(T::Void)
            }

            Node::For { init, cond, step, body } => {
                ctx.scoped(BlockKind::Loop, |ctx| {
                    init.type_of(ctx)?;
                    expect_condition(cond, ctx)?;
                    in_loop(ctx, |ctx| ctx.scoped(BlockKind::Loop, |ctx| type_block(body, ctx)))?;
                    step.type_of(ctx)
                })?;
                Ok(T::Void)
            }

            Node::Break if ctx.loop_depth == 0 => Err(RuntimeError::break_outside_loop()),
            Node::Continue if ctx.loop_depth == 0 => Err(RuntimeError::continue_outside_loop()),
            Node::Break | Node::Continue => Ok(T::Void),

            Node::Return(value) => {
                let ty = match value {
                    Some(value) => value.type_of(ctx)?,
                    None => T::Void,
                };
                match ctx.returns.last_mut() {
                    Some(ReturnSlot::Lambda) => Err(RuntimeError::return_outside_function()),
                    Some(ReturnSlot::Function { declared, seen }) => {
                        if let Some(declared) = declared {
                            if !declared.accepts(&ty) {
                                return Err(RuntimeError::type_error(&declared.to_string(), &ty.to_string()));
                            }
                        }
                        seen.push(ty);
                        Ok(T::Void)
                    }
                    None => Ok(T::Void),
                }
            }

            // statement lists check their declarations themselves
            Node::FnDecl(decl) => {
                declare_signature(decl, ctx)?;
                check_function_body(decl, ctx)?;
                Ok(T::Void)
            }

            Node::Call { func, args } => call_type(func, args, ctx),

            Node::Lambda(def) => lambda_type(def, ctx),

            Node::Apply { callee, args } => {
                let callee = callee.type_of(ctx)?;
                let mut arg_types = Vec::with_capacity(args.len());
                for arg in args {
                    arg_types.push(arg.type_of(ctx)?);
                }
                apply_type(LAMBDA_NAME, &callee, &arg_types)
            }

            Node::TryCatch { body, handlers, finally } => {
                try_type(body, handlers, finally.as_deref(), ctx)
            }

            Node::Throw(value) => match value.type_of(ctx)? {
                T::Exception(_) | T::Any => Ok(T::Void),
                other => Err(RuntimeError::type_error("an exception", &other.to_string())),
            },

            Node::Construct { ty, args } => {
                let mut arg_types = Vec::with_capacity(args.len());
                for arg in args {
                    arg_types.push(arg.type_of(ctx)?);
                }
                ctx.registry().constructed_type(ty, &arg_types)
            }

            Node::Convert { value, target } => convert_type(value, target, ctx),
        }
    }
}

fn expect_condition(cond: &Node, ctx: &mut Context) -> InterpResult<()> {
    let ty = cond.type_of(ctx)?;
    if TypeDescriptor::Boolean.accepts(&ty) {
        Ok(())
    } else {
        Err(RuntimeError::type_error("Boolean", &ty.to_string()))
    }
}

fn in_loop<T>(ctx: &mut Context, f: impl FnOnce(&mut Context) -> InterpResult<T>) -> InterpResult<T> {
    ctx.loop_depth += 1;
    let result = f(ctx);
    ctx.loop_depth -= 1;
    result
}

fn type_var_decl(
    name: &str,
    ty: Option<&TypeExpr>,
    value: Option<&Node>,
    constant: bool,
    ctx: &mut Context,
) -> InterpResult<TypeDescriptor> {
    if ctx.is_declared_locally(name) {
        return Err(RuntimeError::redeclaration(name));
    }
    let declared = ty.map(|ty| ctx.registry().resolve(ty)).transpose()?;
    let value_ty = value.map(|value| value.type_of(ctx)).transpose()?;
    if let (Some(declared), Some(value_ty)) = (&declared, &value_ty) {
        if !declared.accepts(value_ty) {
            return Err(RuntimeError::type_error(&declared.to_string(), &value_ty.to_string()));
        }
    }
    let ty = declared.or(value_ty);
    ctx.declare_variable(name, SymbolEntry { ty, value: None, constant })?;
    Ok(TypeDescriptor::Void)
}

fn binary_type(op: BinOp, left: &TypeDescriptor, right: &TypeDescriptor) -> InterpResult<TypeDescriptor> {
    use TypeDescriptor as T;
    let mismatch = |expected: &str| RuntimeError::type_error(expected, &format!("{left} {op} {right}"));

    if op.is_stream() {
        return match (left, right) {
            (T::Stream | T::Any, T::Stream | T::Any) => Ok(T::Stream),
            _ => Err(mismatch("Stream")),
        };
    }
    if op.is_logical() {
        if T::Boolean.accepts(left) && T::Boolean.accepts(right) {
            return Ok(T::Boolean);
        }
        return Err(mismatch("Boolean"));
    }
    if op.is_comparison() {
        let orderable = |ty: &T| ty.is_numeric() || matches!(ty, T::String | T::Boolean | T::Any);
        let equality = matches!(op, BinOp::Eq | BinOp::Ne);
        if !left.is_compatible_with(right) {
            return Err(mismatch(if equality { "comparable operands" } else { "numeric or String" }));
        }
        if !equality && !(orderable(left) && orderable(right)) {
            return Err(mismatch("numeric or String"));
        }
        return Ok(T::Boolean);
    }
    match (left, right) {
        (T::Any, _) | (_, T::Any) => Ok(T::Any),
        (T::String, T::String) if op == BinOp::Add => Ok(T::String),
        (T::Integer, T::Integer) if op == BinOp::Div => Ok(T::Float),
        (T::Integer, T::Integer) => Ok(T::Integer),
        (l, r) if l.is_numeric() && r.is_numeric() => Ok(T::Float),
        _ => Err(mismatch(if op == BinOp::Add { "numeric or String" } else { "numeric" })),
    }
}

// ============================================================================
// Functions
// ============================================================================

fn declare_signature(decl: &FnDecl, ctx: &mut Context) -> InterpResult<()> {
    let overload = user_overload(decl, ctx)?;
    ctx.declare_function(FunctionMetadata::with_overload(decl.name.as_str(), overload))
}

/// Check a function body in a restricted scope under the declaring scope,
/// then record the inferred return type if none was declared.
fn check_function_body(decl: &FnDecl, ctx: &mut Context) -> InterpResult<()> {
    let overload = user_overload(decl, ctx)?;
    let declared = overload.return_type.clone();
    let parent = ctx.current_scope();

    let saved_loops = mem::take(&mut ctx.loop_depth);
    ctx.returns.push(ReturnSlot::Function { declared: declared.clone(), seen: Vec::new() });
    let body = ctx.scoped_with_parent(BlockKind::Function, parent, |ctx| {
        for param in &overload.params {
            let entry = SymbolEntry::variable(Some(param.descriptor()), None);
            ctx.declare_variable(&param.name, entry)?;
        }
        type_block(&decl.body, ctx)
    });
    let slot = ctx.returns.pop();
    ctx.loop_depth = saved_loops;
    body?;

    if declared.is_none() {
        let inferred = body_result(&decl.body, seen_returns(slot), TypeDescriptor::Void);
        ctx.set_return_type(&decl.name, decl.params.len(), inferred);
    }
    Ok(())
}

fn lambda_type(def: &LambdaDef, ctx: &mut Context) -> InterpResult<TypeDescriptor> {
    let params = resolve_params(&def.params, ctx)?;
    let saved_loops = mem::take(&mut ctx.loop_depth);
    ctx.returns.push(ReturnSlot::Lambda);
    let ret = ctx.scoped(BlockKind::Lambda, |ctx| {
        for param in &params {
            let entry = SymbolEntry::variable(Some(param.descriptor()), None);
            ctx.declare_variable(&param.name, entry)?;
        }
        type_block(&def.body, ctx)
    });
    ctx.returns.pop();
    ctx.loop_depth = saved_loops;
    let params = params.iter().map(ParamSpec::descriptor).collect();
    Ok(TypeDescriptor::function(params, ret?))
}

fn check_arguments(params: &[TypeDescriptor], args: &[TypeDescriptor]) -> InterpResult<()> {
    for (param, arg) in params.iter().zip(args) {
        if !param.accepts(arg) {
            return Err(RuntimeError::type_error(&param.to_string(), &arg.to_string()));
        }
    }
    Ok(())
}

fn apply_type(name: &str, callee: &TypeDescriptor, args: &[TypeDescriptor]) -> InterpResult<TypeDescriptor> {
    match callee {
        TypeDescriptor::Any => Ok(TypeDescriptor::Any),
        TypeDescriptor::Function { params, ret } => {
            if params.len() != args.len() {
                return Err(RuntimeError::arity_mismatch(name, &[params.len()], args.len()));
            }
            check_arguments(params, args)?;
            Ok(ret.as_ref().clone())
        }
        other => Err(RuntimeError::type_error("a function", &other.to_string())),
    }
}

fn call_type(func: &str, args: &[Node], ctx: &mut Context) -> InterpResult<TypeDescriptor> {
    let Some(binding) = ctx.binding(func) else {
        return Err(RuntimeError::undefined_function_with_hint(func, ctx.visible_names()));
    };
    let mut arg_types = Vec::with_capacity(args.len());
    for arg in args {
        arg_types.push(arg.type_of(ctx)?);
    }
    match binding {
        Binding::Function(meta) => {
            let overload = meta.find_overload(arg_types.len()).ok_or_else(|| {
                RuntimeError::arity_mismatch(func, &meta.arities(), arg_types.len())
            })?;
            check_arguments(&overload.param_types(), &arg_types)?;
            Ok(match &overload.body {
                FunctionBody::Builtin(callable) => callable.result_type(&arg_types),
                FunctionBody::User { .. } => {
                    overload.return_type.clone().unwrap_or(TypeDescriptor::Any)
                }
            })
        }
        Binding::Variable(entry) => {
            let callee = entry.ty.unwrap_or(TypeDescriptor::Any);
            apply_type(func, &callee, &arg_types)
        }
    }
}

// ============================================================================
// Exceptions and conversions
// ============================================================================

fn try_type(
    body: &[Node],
    handlers: &[CatchClause],
    finally: Option<&[Node]>,
    ctx: &mut Context,
) -> InterpResult<TypeDescriptor> {
    let mut types = vec![ctx.scoped(BlockKind::Try, |ctx| type_block(body, ctx))?];
    for handler in handlers {
        let exception = ctx.registry().exception_type(&handler.exception)?;
        let handled = ctx.scoped(BlockKind::Catch, |ctx| {
            let entry = SymbolEntry::constant(Some(TypeDescriptor::Exception(exception)), None);
            ctx.declare_variable(&handler.binding, entry)?;
            type_block(&handler.body, ctx)
        })?;
        types.push(handled);
    }
    if let Some(finally) = finally {
        ctx.scoped(BlockKind::Finally, |ctx| type_block(finally, ctx))?;
    }
    Ok(join(&types))
}

fn convert_type(value: &Node, target: &TypeExpr, ctx: &mut Context) -> InterpResult<TypeDescriptor> {
    let from = value.type_of(ctx)?;
    let target = ctx.registry().resolve(target)?;
    if !ctx.registry().has_conversion(&from, &target) {
        return Err(RuntimeError::type_mismatch(format!("no conversion from {from} to {target}")));
    }
    Ok(target)
}
