//! Type registry: names to descriptors, constructors and conversions

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::TypeExpr;
use crate::interp::{InterpResult, RuntimeError};

use super::{Collection, ExceptionType, ExceptionValue, TypeDescriptor, Value};

/// Builds a value of a registered type from constructor arguments.
pub type Constructor = Rc<dyn Fn(&[Value]) -> InterpResult<Value>>;

/// Explicit conversion between two registered types. `None` means the value
/// cannot be represented in the target type.
pub type Conversion = fn(&Value) -> Option<Value>;

#[derive(Clone)]
struct TypeEntry {
    descriptor: TypeDescriptor,
    constructor: Constructor,
}

/// Registry of every type a program can name.
///
/// Owned by the execution context; built-in types and the built-in
/// exception hierarchy are registered on creation.
#[derive(Clone)]
pub struct TypeRegistry {
    types: HashMap<String, TypeEntry>,
    conversions: HashMap<(String, String), Conversion>,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("TypeRegistry")
            .field("types", &names)
            .field("conversions", &self.conversions.len())
            .finish()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut registry = TypeRegistry { types: HashMap::new(), conversions: HashMap::new() };
        registry.register_builtin_types();
        registry.register_builtin_exceptions();
        registry.register_builtin_conversions();
        registry
    }

    fn register_builtin_types(&mut self) {
        self.register("Integer", TypeDescriptor::Integer, default_value(Value::Integer(0)));
        self.register("Float", TypeDescriptor::Float, default_value(Value::Float(0.0)));
        self.register("String", TypeDescriptor::String, default_value(Value::string("")));
        self.register("Boolean", TypeDescriptor::Boolean, default_value(Value::Boolean(false)));
        self.register("Void", TypeDescriptor::Void, default_value(Value::Void));
        self.register("Any", TypeDescriptor::Any, not_constructible("Any"));
        self.register(
            "Function",
            TypeDescriptor::function(Vec::new(), TypeDescriptor::Any),
            not_constructible("Function"),
        );
        self.register(
            "Array",
            TypeDescriptor::array(TypeDescriptor::Any),
            collection_constructor(Value::Array),
        );
        self.register(
            "Stack",
            TypeDescriptor::stack(TypeDescriptor::Any),
            collection_constructor(Value::Stack),
        );
        self.register(
            "Queue",
            TypeDescriptor::queue(TypeDescriptor::Any),
            collection_constructor(Value::Queue),
        );
        self.register(
            "Stream",
            TypeDescriptor::Stream,
            Rc::new(|args: &[Value]| Ok(Value::Stream(Rc::new(args.to_vec())))),
        );
    }

    fn register_builtin_exceptions(&mut self) {
        let root = ExceptionType::root();
        self.register_exception_type(root.clone());
        let arithmetic = ExceptionType::derived("ArithmeticError", root.clone());
        self.register_exception_type(arithmetic.clone());
        self.register_exception_type(ExceptionType::derived("DivisionByZeroError", arithmetic));
        for name in ["IndexError", "ValueError", "TypeConversionError"] {
            self.register_exception_type(ExceptionType::derived(name, root.clone()));
        }
    }

    fn register_builtin_conversions(&mut self) {
        self.register_conversion("Integer", "Float", |v| match v {
            Value::Integer(n) => Some(Value::Float(*n as f64)),
            _ => None,
        });
        self.register_conversion("Float", "Integer", |v| match v {
            Value::Float(x) if x.is_finite() => Some(Value::Integer(x.trunc() as i64)),
            _ => None,
        });
        self.register_conversion("String", "Integer", |v| {
            v.as_str()?.trim().parse().ok().map(Value::Integer)
        });
        self.register_conversion("String", "Float", |v| {
            v.as_str()?.trim().parse().ok().map(Value::Float)
        });
        self.register_conversion("String", "Boolean", |v| match v.as_str()?.trim() {
            "true" => Some(Value::Boolean(true)),
            "false" => Some(Value::Boolean(false)),
            _ => None,
        });
        for from in ["Integer", "Float", "Boolean"] {
            self.register_conversion(from, "String", |v| Some(Value::string(&v.to_string())));
        }
        self.register_conversion("Array", "Stack", |v| v.as_collection().cloned().map(Value::Stack));
        self.register_conversion("Array", "Queue", |v| v.as_collection().cloned().map(Value::Queue));
        self.register_conversion("Stack", "Array", |v| v.as_collection().cloned().map(Value::Array));
        self.register_conversion("Queue", "Array", |v| v.as_collection().cloned().map(Value::Array));
        self.register_conversion("Array", "Stream", |v| {
            v.as_collection().map(|c| Value::Stream(Rc::new(c.items.as_ref().clone())))
        });
    }

    /// Register (or replace) a type under `name`.
    pub fn register(&mut self, name: &str, descriptor: TypeDescriptor, constructor: Constructor) {
        self.types.insert(name.to_string(), TypeEntry { descriptor, constructor });
    }

    pub fn register_conversion(&mut self, from: &str, to: &str, conversion: Conversion) {
        self.conversions.insert((from.to_string(), to.to_string()), conversion);
    }

    fn register_exception_type(&mut self, ty: ExceptionType) {
        let name = ty.name().to_string();
        let exc = ty.clone();
        let constructor: Constructor = Rc::new(move |args: &[Value]| match args {
            [] => Ok(Value::Exception(ExceptionValue::new(exc.clone(), ""))),
            [Value::String(message)] => {
                Ok(Value::Exception(ExceptionValue::new(exc.clone(), &**message)))
            }
            [other] => Err(RuntimeError::type_error("String", other.type_name())),
            _ => Err(RuntimeError::arity_mismatch(exc.name(), &[0, 1], args.len())),
        });
        self.register(&name, TypeDescriptor::Exception(ty), constructor);
    }

    /// Register a user exception type deriving from `base`.
    pub fn register_exception(&mut self, name: &str, base: &str) -> InterpResult<TypeDescriptor> {
        if self.types.contains_key(name) {
            return Err(RuntimeError::redeclaration(name));
        }
        let base = self.exception_type(base)?;
        let ty = ExceptionType::derived(name, base);
        self.register_exception_type(ty.clone());
        Ok(TypeDescriptor::Exception(ty))
    }

    pub fn get_meta_type_by_name(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name).map(|entry| &entry.descriptor)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    fn entry(&self, name: &str) -> InterpResult<&TypeEntry> {
        self.types
            .get(name)
            .ok_or_else(|| RuntimeError::unknown_type(name, self.types.keys()))
    }

    /// Descriptor registered under `name`.
    pub fn descriptor(&self, name: &str) -> InterpResult<TypeDescriptor> {
        self.entry(name).map(|entry| entry.descriptor.clone())
    }

    /// Exception type registered under `name`.
    pub fn exception_type(&self, name: &str) -> InterpResult<ExceptionType> {
        match &self.entry(name)?.descriptor {
            TypeDescriptor::Exception(exc) => Ok(exc.clone()),
            other => Err(RuntimeError::type_error("an exception type", &other.to_string())),
        }
    }

    /// Build an exception value of a registered exception type.
    pub fn exception(&self, name: &str, message: impl Into<String>) -> InterpResult<ExceptionValue> {
        Ok(ExceptionValue::new(self.exception_type(name)?, message))
    }

    /// Resolve a source type annotation.
    pub fn resolve(&self, expr: &TypeExpr) -> InterpResult<TypeDescriptor> {
        let base = self.descriptor(&expr.name)?;
        if expr.args.is_empty() {
            return Ok(base);
        }
        let mut args = expr
            .args
            .iter()
            .map(|arg| self.resolve(arg))
            .collect::<InterpResult<Vec<_>>>()?;
        match base {
            TypeDescriptor::Function { .. } => {
                let ret = args.pop().unwrap_or(TypeDescriptor::Void);
                Ok(TypeDescriptor::function(args, ret))
            }
            ref collection if collection.element().is_some() => {
                if args.len() != 1 {
                    return Err(RuntimeError::type_mismatch(format!(
                        "{} takes exactly one type parameter, got {}",
                        expr.name,
                        args.len()
                    )));
                }
                let elem = args.remove(0);
                Ok(collection.with_element(elem).unwrap_or(TypeDescriptor::Any))
            }
            _ => Err(RuntimeError::type_mismatch(format!(
                "{} takes no type parameters",
                expr.name
            ))),
        }
    }

    /// Invoke the constructor registered under `name`.
    pub fn construct(&self, name: &str, args: &[Value]) -> InterpResult<Value> {
        (self.entry(name)?.constructor)(args)
    }

    /// Static result type of `name(args)` given the argument types.
    pub fn constructed_type(&self, name: &str, args: &[TypeDescriptor]) -> InterpResult<TypeDescriptor> {
        let descriptor = self.descriptor(name)?;
        match &descriptor {
            TypeDescriptor::Void if args.is_empty() => Ok(descriptor),
            ty if ty.is_primitive() => match args {
                [] => Ok(descriptor),
                [arg] if self.has_conversion(arg, ty) => Ok(descriptor),
                [arg] => Err(RuntimeError::type_mismatch(format!(
                    "no conversion from {arg} to {ty}"
                ))),
                _ => Err(RuntimeError::arity_mismatch(name, &[0, 1], args.len())),
            },
            ty if ty.element().is_some() => {
                let elem = unify_all(args)?;
                Ok(ty.with_element(elem).unwrap_or(TypeDescriptor::Any))
            }
            TypeDescriptor::Stream => Ok(descriptor),
            TypeDescriptor::Exception(_) => match args {
                [] => Ok(descriptor),
                [arg] if TypeDescriptor::String.accepts(arg) => Ok(descriptor),
                [arg] => Err(RuntimeError::type_error("String", &arg.to_string())),
                _ => Err(RuntimeError::arity_mismatch(name, &[0, 1], args.len())),
            },
            _ => Err(RuntimeError::unsupported(&format!("constructing {name}"))),
        }
    }

    /// Is there a conversion from `from` to `to` (including identity)?
    pub fn has_conversion(&self, from: &TypeDescriptor, to: &TypeDescriptor) -> bool {
        from.is_any()
            || to.is_any()
            || from == to
            || self
                .conversions
                .contains_key(&(from.name().to_string(), to.name().to_string()))
    }

    /// Apply the registered conversion from the value's type to `target`.
    pub fn convert(&self, value: &Value, target: &TypeDescriptor) -> Option<Value> {
        let from = value.type_descriptor();
        if target.is_any() || &from == target {
            return Some(value.clone());
        }
        let conversion = self
            .conversions
            .get(&(from.name().to_string(), target.name().to_string()))?;
        conversion(value)
    }

    /// Widen `value` into a slot of type `target` when the slot accepts it
    /// only through widening (Integer into Float).
    pub fn widen(&self, value: Value, target: &TypeDescriptor) -> Value {
        match (&value, target) {
            (Value::Integer(_), TypeDescriptor::Float) => self.convert(&value, target).unwrap_or(value),
            _ => value,
        }
    }
}

fn default_value(value: Value) -> Constructor {
    Rc::new(move |args: &[Value]| match args {
        [] => Ok(value.clone()),
        [arg] if arg.type_descriptor() == value.type_descriptor() => Ok(arg.clone()),
        _ => Err(RuntimeError::arity_mismatch(value.type_name(), &[0], args.len())),
    })
}

fn collection_constructor(wrap: fn(Collection) -> Value) -> Constructor {
    Rc::new(move |args: &[Value]| {
        let (elem, items) = collect_items(args)?;
        Ok(wrap(Collection::new(elem, items)))
    })
}

fn not_constructible(name: &'static str) -> Constructor {
    Rc::new(move |_: &[Value]| Err(RuntimeError::unsupported(&format!("constructing {name}"))))
}

pub(crate) fn unify_all(types: &[TypeDescriptor]) -> InterpResult<TypeDescriptor> {
    types.iter().try_fold(TypeDescriptor::Any, |acc, ty| {
        acc.unify(ty).ok_or_else(|| {
            RuntimeError::type_mismatch(format!("mixed element types {acc} and {ty}"))
        })
    })
}

/// Element type and (widened) items of a homogeneous collection.
pub(crate) fn collect_items(args: &[Value]) -> InterpResult<(TypeDescriptor, Vec<Value>)> {
    let types: Vec<TypeDescriptor> = args.iter().map(Value::type_descriptor).collect();
    let elem = unify_all(&types)?;
    let items = args
        .iter()
        .map(|item| match (item, &elem) {
            (Value::Integer(n), TypeDescriptor::Float) => Value::Float(*n as f64),
            _ => item.clone(),
        })
        .collect();
    Ok((elem, items))
}
