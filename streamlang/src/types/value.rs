//! Runtime values for the interpreter

use std::fmt;
use std::rc::Rc;

use crate::ast::LambdaDef;
use crate::interp::ScopeRef;

use super::{ExceptionType, TypeDescriptor};

/// Runtime value. Values are immutable; operations build new ones.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(Rc<str>),
    Boolean(bool),
    /// Unit value
    Void,
    Array(Collection),
    Stack(Collection),
    Queue(Collection),
    /// Stream placeholder buffer
    Stream(Rc<Vec<Value>>),
    Lambda(Rc<Closure>),
    Exception(ExceptionValue),
}

/// Homogeneous element buffer shared by Array, Stack and Queue.
///
/// Stacks keep their top at the end of `items`; queues keep their front at
/// index 0.
#[derive(Debug, Clone)]
pub struct Collection {
    pub elem: TypeDescriptor,
    pub items: Rc<Vec<Value>>,
}

/// A lambda together with the scope it was created in.
pub struct Closure {
    pub def: Rc<LambdaDef>,
    pub params: Vec<TypeDescriptor>,
    pub scope: ScopeRef,
}

/// A user-level exception: its type and message.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionValue {
    pub ty: ExceptionType,
    pub message: String,
}

impl ExceptionValue {
    pub fn new(ty: ExceptionType, message: impl Into<String>) -> Self {
        ExceptionValue { ty, message: message.into() }
    }

    pub fn type_name(&self) -> &str {
        self.ty.name()
    }
}

impl Collection {
    pub fn new(elem: TypeDescriptor, items: Vec<Value>) -> Self {
        Collection { elem, items: Rc::new(items) }
    }

    pub fn empty(elem: TypeDescriptor) -> Self {
        Collection::new(elem, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// New collection with `value` appended.
    pub fn pushed(&self, value: Value) -> Self {
        let mut items = self.items.as_ref().clone();
        items.push(value);
        Collection { elem: self.elem.clone(), items: Rc::new(items) }
    }

    /// New collection without the last element, plus that element.
    pub fn without_last(&self) -> Option<(Self, Value)> {
        let mut items = self.items.as_ref().clone();
        let last = items.pop()?;
        Some((Collection { elem: self.elem.clone(), items: Rc::new(items) }, last))
    }

    /// New collection without the first element, plus that element.
    pub fn without_first(&self) -> Option<(Self, Value)> {
        let first = self.items.first()?.clone();
        let rest = self.items[1..].to_vec();
        Some((Collection { elem: self.elem.clone(), items: Rc::new(rest) }, first))
    }
}

impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("params", &self.def.params.len())
            .finish_non_exhaustive()
    }
}

impl Value {
    pub fn string(s: &str) -> Self {
        Value::String(Rc::from(s))
    }

    /// Descriptor of this value's runtime type.
    pub fn type_descriptor(&self) -> TypeDescriptor {
        match self {
            Value::Integer(_) => TypeDescriptor::Integer,
            Value::Float(_) => TypeDescriptor::Float,
            Value::String(_) => TypeDescriptor::String,
            Value::Boolean(_) => TypeDescriptor::Boolean,
            Value::Void => TypeDescriptor::Void,
            Value::Array(c) => TypeDescriptor::array(c.elem.clone()),
            Value::Stack(c) => TypeDescriptor::stack(c.elem.clone()),
            Value::Queue(c) => TypeDescriptor::queue(c.elem.clone()),
            Value::Stream(_) => TypeDescriptor::Stream,
            Value::Lambda(closure) => {
                TypeDescriptor::function(closure.params.clone(), TypeDescriptor::Any)
            }
            Value::Exception(exc) => TypeDescriptor::Exception(exc.ty.clone()),
        }
    }

    /// Get type name for error messages
    pub fn type_name(&self) -> &str {
        match self {
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Boolean(_) => "Boolean",
            Value::Void => "Void",
            Value::Array(_) => "Array",
            Value::Stack(_) => "Stack",
            Value::Queue(_) => "Queue",
            Value::Stream(_) => "Stream",
            Value::Lambda(_) => "Function",
            Value::Exception(exc) => exc.type_name(),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(&**s),
            _ => None,
        }
    }

    /// Element buffer of an Array, Stack or Queue.
    pub fn as_collection(&self) -> Option<&Collection> {
        match self {
            Value::Array(c) | Value::Stack(c) | Value::Queue(c) => Some(c),
            _ => None,
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        match item {
            Value::String(s) => write!(f, "\"{s}\"")?,
            other => write!(f, "{other}")?,
        }
    }
    write!(f, "]")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{x:.1}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Void => write!(f, "void"),
            Value::Array(c) => write_items(f, &c.items),
            Value::Stack(c) => {
                write!(f, "Stack")?;
                write_items(f, &c.items)
            }
            Value::Queue(c) => {
                write!(f, "Queue")?;
                write_items(f, &c.items)
            }
            Value::Stream(items) => {
                write!(f, "Stream")?;
                write_items(f, items)
            }
            Value::Lambda(closure) => write!(f, "<lambda/{}>", closure.def.params.len()),
            Value::Exception(exc) => write!(f, "{exc}"),
        }
    }
}

impl fmt::Display for ExceptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.ty)
        } else {
            write!(f, "{}: {}", self.ty, self.message)
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Void, Value::Void) => true,
            (Value::Array(a), Value::Array(b))
            | (Value::Stack(a), Value::Stack(b))
            | (Value::Queue(a), Value::Queue(b)) => a == b,
            (Value::Stream(a), Value::Stream(b)) => a == b,
            (Value::Lambda(a), Value::Lambda(b)) => Rc::ptr_eq(a, b),
            (Value::Exception(a), Value::Exception(b)) => a == b,
            _ => false,
        }
    }
}
