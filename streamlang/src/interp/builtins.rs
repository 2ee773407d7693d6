//! Builtin functions registered in the global scope

use std::rc::Rc;

use super::{Callable, Context, FunctionMetadata, InterpResult, Overload, RuntimeError, Signal, SymbolTable};
use crate::types::{Collection, TypeDescriptor, Value};

type BuiltinFn = fn(&[Value], &mut Context) -> InterpResult<Signal>;
type ResultTypeFn = fn(&[TypeDescriptor]) -> TypeDescriptor;

/// Table-driven builtin; every parameter accepts `Any`.
#[derive(Debug)]
struct Builtin {
    name: &'static str,
    arity: usize,
    ret: TypeDescriptor,
    result: Option<ResultTypeFn>,
    func: BuiltinFn,
}

impl Callable for Builtin {
    fn name(&self) -> &str {
        self.name
    }

    fn param_types(&self) -> Vec<TypeDescriptor> {
        vec![TypeDescriptor::Any; self.arity]
    }

    fn return_type(&self) -> TypeDescriptor {
        self.ret.clone()
    }

    fn result_type(&self, args: &[TypeDescriptor]) -> TypeDescriptor {
        match self.result {
            Some(result) => result(args),
            None => self.return_type(),
        }
    }

    fn invoke(&self, args: &[Value], ctx: &mut Context) -> InterpResult<Signal> {
        (self.func)(args, ctx)
    }
}

fn builtins() -> Vec<Builtin> {
    vec![
        Builtin { name: "print", arity: 1, ret: TypeDescriptor::Void, result: None, func: builtin_print },
        Builtin { name: "len", arity: 1, ret: TypeDescriptor::Integer, result: None, func: builtin_len },
        Builtin { name: "str", arity: 1, ret: TypeDescriptor::String, result: None, func: builtin_str },
        Builtin { name: "push", arity: 2, ret: TypeDescriptor::Any, result: Some(same_as_first), func: builtin_push },
        Builtin { name: "pop", arity: 1, ret: TypeDescriptor::Any, result: Some(same_as_first), func: builtin_pop },
        Builtin { name: "peek", arity: 1, ret: TypeDescriptor::Any, result: Some(element_of_first), func: builtin_peek },
        Builtin { name: "enqueue", arity: 2, ret: TypeDescriptor::Any, result: Some(same_as_first), func: builtin_enqueue },
        Builtin { name: "dequeue", arity: 1, ret: TypeDescriptor::Any, result: Some(same_as_first), func: builtin_dequeue },
    ]
}

/// Register every builtin in `table` (the global scope).
pub fn install(table: &mut SymbolTable) {
    for builtin in builtins() {
        let name = builtin.name;
        let overload = Overload::builtin(Rc::new(builtin));
        table.define_builtin(FunctionMetadata::with_overload(name, overload));
    }
}

fn same_as_first(args: &[TypeDescriptor]) -> TypeDescriptor {
    args.first().cloned().unwrap_or(TypeDescriptor::Any)
}

fn element_of_first(args: &[TypeDescriptor]) -> TypeDescriptor {
    args.first()
        .and_then(TypeDescriptor::element)
        .cloned()
        .unwrap_or(TypeDescriptor::Any)
}

fn raise(ctx: &Context, exception: &str, message: &str) -> InterpResult<Signal> {
    Ok(Signal::Raised(ctx.registry().exception(exception, message)?))
}

fn builtin_print(args: &[Value], ctx: &mut Context) -> InterpResult<Signal> {
    ctx.write_line(&args[0].to_string());
    Ok(Signal::value(Value::Void))
}

fn builtin_len(args: &[Value], _ctx: &mut Context) -> InterpResult<Signal> {
    let len = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::Stream(items) => items.len(),
        other => match other.as_collection() {
            Some(collection) => collection.len(),
            None => return Err(RuntimeError::type_error("a collection or String", other.type_name())),
        },
    };
    Ok(Signal::value(Value::Integer(len as i64)))
}

fn builtin_str(args: &[Value], _ctx: &mut Context) -> InterpResult<Signal> {
    Ok(Signal::value(Value::string(&args[0].to_string())))
}

/// Append `value`, checking it against (and widening it to) the element type.
/// An untyped empty collection takes the type of its first element.
fn appended(collection: &Collection, value: &Value, ctx: &Context) -> InterpResult<Collection> {
    let value_ty = value.type_descriptor();
    if collection.elem.is_any() {
        let mut next = collection.pushed(value.clone());
        if collection.is_empty() {
            next.elem = value_ty;
        }
        return Ok(next);
    }
    let value = ctx.coerce(value.clone(), &collection.elem)?;
    Ok(collection.pushed(value))
}

fn builtin_push(args: &[Value], ctx: &mut Context) -> InterpResult<Signal> {
    let pushed = match &args[0] {
        Value::Array(c) => Value::Array(appended(c, &args[1], ctx)?),
        Value::Stack(c) => Value::Stack(appended(c, &args[1], ctx)?),
        Value::Queue(c) => Value::Queue(appended(c, &args[1], ctx)?),
        other => return Err(RuntimeError::type_error("Array, Stack or Queue", other.type_name())),
    };
    Ok(Signal::value(pushed))
}

fn builtin_pop(args: &[Value], ctx: &mut Context) -> InterpResult<Signal> {
    let (rest, wrap): (Option<Collection>, fn(Collection) -> Value) = match &args[0] {
        Value::Stack(c) => (c.without_last().map(|(rest, _)| rest), Value::Stack),
        Value::Array(c) => (c.without_last().map(|(rest, _)| rest), Value::Array),
        other => return Err(RuntimeError::type_error("Stack or Array", other.type_name())),
    };
    match rest {
        Some(rest) => Ok(Signal::value(wrap(rest))),
        None => raise(ctx, "IndexError", "pop from empty collection"),
    }
}

fn builtin_peek(args: &[Value], ctx: &mut Context) -> InterpResult<Signal> {
    let top = match &args[0] {
        Value::Stack(c) | Value::Array(c) => c.items.last().cloned(),
        other => return Err(RuntimeError::type_error("Stack or Array", other.type_name())),
    };
    match top {
        Some(top) => Ok(Signal::value(top)),
        None => raise(ctx, "IndexError", "peek at empty collection"),
    }
}

fn builtin_enqueue(args: &[Value], ctx: &mut Context) -> InterpResult<Signal> {
    match &args[0] {
        Value::Queue(c) => Ok(Signal::value(Value::Queue(appended(c, &args[1], ctx)?))),
        other => Err(RuntimeError::type_error("Queue", other.type_name())),
    }
}

fn builtin_dequeue(args: &[Value], ctx: &mut Context) -> InterpResult<Signal> {
    match &args[0] {
        Value::Queue(c) => match c.without_first() {
            Some((rest, _)) => Ok(Signal::value(Value::Queue(rest))),
            None => raise(ctx, "IndexError", "dequeue from empty queue"),
        },
        other => Err(RuntimeError::type_error("Queue", other.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InterpreterConfig, OutputMode};
    use crate::interp::{Binding, ErrorKind};

    fn ctx() -> Context {
        Context::new(InterpreterConfig::new().output(OutputMode::Capture))
    }

    fn ints(items: &[i64]) -> Collection {
        Collection::new(TypeDescriptor::Integer, items.iter().map(|n| Value::Integer(*n)).collect())
    }

    fn value(signal: Signal) -> Value {
        match signal {
            Signal::Normal(Some(v)) => v,
            other => panic!("expected a value, got {other:?}"),
        }
    }

    fn raised_type(signal: Signal) -> String {
        match signal {
            Signal::Raised(exc) => exc.type_name().to_string(),
            other => panic!("expected a raise, got {other:?}"),
        }
    }

    #[test]
    fn test_install_binds_each_builtin_once() {
        let mut table = SymbolTable::global();
        install(&mut table);
        let names: Vec<String> = builtins().iter().map(|b| b.name.to_string()).collect();
        assert_eq!(table.names(), names.as_slice());
        for name in &names {
            match table.get(name) {
                Some(Binding::Function(meta)) => assert_eq!(meta.list_overloads().len(), 1, "{name}"),
                other => panic!("{name} bound as {other:?}"),
            }
        }
    }

    #[test]
    fn test_print_writes_display_form() {
        let mut ctx = ctx();
        builtin_print(&[Value::Float(2.0)], &mut ctx).unwrap();
        builtin_print(&[Value::Stack(ints(&[1, 2]))], &mut ctx).unwrap();
        assert_eq!(ctx.output(), ["2.0".to_string(), "Stack[1, 2]".to_string()]);
    }

    #[test]
    fn test_len() {
        let mut ctx = ctx();
        assert_eq!(value(builtin_len(&[Value::string("héllo")], &mut ctx).unwrap()), Value::Integer(5));
        assert_eq!(value(builtin_len(&[Value::Queue(ints(&[1]))], &mut ctx).unwrap()), Value::Integer(1));
        let err = builtin_len(&[Value::Integer(3)], &mut ctx).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
    }

    #[test]
    fn test_stack_push_pop_peek() {
        let mut ctx = ctx();
        let stack = value(builtin_push(&[Value::Stack(ints(&[1])), Value::Integer(2)], &mut ctx).unwrap());
        assert_eq!(value(builtin_peek(&[stack.clone()], &mut ctx).unwrap()), Value::Integer(2));
        let rest = value(builtin_pop(&[stack], &mut ctx).unwrap());
        assert_eq!(rest, Value::Stack(ints(&[1])));
    }

    #[test]
    fn test_push_checks_element_type() {
        let mut ctx = ctx();
        let err = builtin_push(&[Value::Stack(ints(&[])), Value::string("x")], &mut ctx).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
    }

    #[test]
    fn test_push_into_untyped_empty_fixes_element() {
        let mut ctx = ctx();
        let empty = Value::Stack(Collection::empty(TypeDescriptor::Any));
        let stack = value(builtin_push(&[empty, Value::Integer(1)], &mut ctx).unwrap());
        assert_eq!(stack.type_descriptor(), TypeDescriptor::stack(TypeDescriptor::Integer));
    }

    #[test]
    fn test_empty_pops_raise_index_error() {
        let mut ctx = ctx();
        let empty_stack = Value::Stack(ints(&[]));
        let empty_queue = Value::Queue(ints(&[]));
        assert_eq!(raised_type(builtin_pop(&[empty_stack.clone()], &mut ctx).unwrap()), "IndexError");
        assert_eq!(raised_type(builtin_peek(&[empty_stack], &mut ctx).unwrap()), "IndexError");
        assert_eq!(raised_type(builtin_dequeue(&[empty_queue], &mut ctx).unwrap()), "IndexError");
    }

    #[test]
    fn test_queue_is_fifo() {
        let mut ctx = ctx();
        let queue = value(builtin_enqueue(&[Value::Queue(ints(&[1])), Value::Integer(2)], &mut ctx).unwrap());
        let rest = value(builtin_dequeue(&[queue], &mut ctx).unwrap());
        assert_eq!(rest, Value::Queue(ints(&[2])));
    }

    #[test]
    fn test_result_types() {
        let peek = builtins().into_iter().find(|b| b.name == "peek").unwrap();
        assert_eq!(
            peek.result_type(&[TypeDescriptor::stack(TypeDescriptor::String)]),
            TypeDescriptor::String
        );
        let len = builtins().into_iter().find(|b| b.name == "len").unwrap();
        assert_eq!(len.result_type(&[TypeDescriptor::Any]), TypeDescriptor::Integer);
    }
}
