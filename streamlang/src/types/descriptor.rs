//! Type descriptors

use std::fmt;

/// Static description of a StreamLanguage type.
///
/// Equality is structural, except that exception types compare by name.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    Integer,
    Float,
    String,
    Boolean,
    Void,
    /// Type not yet known; compatible with every descriptor
    Any,
    Array(Box<TypeDescriptor>),
    Stack(Box<TypeDescriptor>),
    Queue(Box<TypeDescriptor>),
    Stream,
    Function {
        params: Vec<TypeDescriptor>,
        ret: Box<TypeDescriptor>,
    },
    Exception(ExceptionType),
}

/// A named exception type with an optional base.
#[derive(Debug, Clone)]
pub struct ExceptionType {
    name: String,
    base: Option<Box<ExceptionType>>,
}

impl ExceptionType {
    /// The root of the exception hierarchy.
    pub fn root() -> Self {
        ExceptionType { name: "Exception".to_string(), base: None }
    }

    pub fn derived(name: impl Into<String>, base: ExceptionType) -> Self {
        ExceptionType { name: name.into(), base: Some(Box::new(base)) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Option<&ExceptionType> {
        self.base.as_deref()
    }

    /// True if `self` is `other` or inherits from it.
    pub fn is_subtype_of(&self, other: &ExceptionType) -> bool {
        let mut current = Some(self);
        while let Some(ty) = current {
            if ty.name == other.name {
                return true;
            }
            current = ty.base();
        }
        false
    }
}

impl PartialEq for ExceptionType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl TypeDescriptor {
    pub fn array(elem: TypeDescriptor) -> Self {
        TypeDescriptor::Array(Box::new(elem))
    }

    pub fn stack(elem: TypeDescriptor) -> Self {
        TypeDescriptor::Stack(Box::new(elem))
    }

    pub fn queue(elem: TypeDescriptor) -> Self {
        TypeDescriptor::Queue(Box::new(elem))
    }

    pub fn function(params: Vec<TypeDescriptor>, ret: TypeDescriptor) -> Self {
        TypeDescriptor::Function { params, ret: Box::new(ret) }
    }

    /// Registry name of the type constructor (`Array` for `Array<Integer>`).
    pub fn name(&self) -> &str {
        match self {
            TypeDescriptor::Integer => "Integer",
            TypeDescriptor::Float => "Float",
            TypeDescriptor::String => "String",
            TypeDescriptor::Boolean => "Boolean",
            TypeDescriptor::Void => "Void",
            TypeDescriptor::Any => "Any",
            TypeDescriptor::Array(_) => "Array",
            TypeDescriptor::Stack(_) => "Stack",
            TypeDescriptor::Queue(_) => "Queue",
            TypeDescriptor::Stream => "Stream",
            TypeDescriptor::Function { .. } => "Function",
            TypeDescriptor::Exception(exc) => exc.name(),
        }
    }

    /// Element type of a collection descriptor.
    pub fn element(&self) -> Option<&TypeDescriptor> {
        match self {
            TypeDescriptor::Array(elem)
            | TypeDescriptor::Stack(elem)
            | TypeDescriptor::Queue(elem) => Some(elem),
            _ => None,
        }
    }

    /// Rebuild a collection descriptor of the same kind around `elem`.
    pub fn with_element(&self, elem: TypeDescriptor) -> Option<TypeDescriptor> {
        match self {
            TypeDescriptor::Array(_) => Some(TypeDescriptor::array(elem)),
            TypeDescriptor::Stack(_) => Some(TypeDescriptor::stack(elem)),
            TypeDescriptor::Queue(_) => Some(TypeDescriptor::queue(elem)),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeDescriptor::Integer | TypeDescriptor::Float)
    }

    pub fn is_any(&self) -> bool {
        matches!(self, TypeDescriptor::Any)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            TypeDescriptor::Integer
                | TypeDescriptor::Float
                | TypeDescriptor::String
                | TypeDescriptor::Boolean
        )
    }

    /// Can a value of type `value` be stored in a slot of type `self`?
    ///
    /// Covers `Any` on either side, Integer-to-Float widening, element-wise
    /// collection acceptance and exception subtyping.
    pub fn accepts(&self, value: &TypeDescriptor) -> bool {
        use TypeDescriptor as T;
        match (self, value) {
            (T::Any, _) | (_, T::Any) => true,
            (T::Float, T::Integer) => true,
            (T::Array(a), T::Array(b)) | (T::Stack(a), T::Stack(b)) | (T::Queue(a), T::Queue(b)) => {
                a.accepts(b)
            }
            (T::Exception(slot), T::Exception(exc)) => exc.is_subtype_of(slot),
            (
                T::Function { params: p1, ret: r1 },
                T::Function { params: p2, ret: r2 },
            ) => {
                p1.len() == p2.len()
                    && p1.iter().zip(p2).all(|(a, b)| a.accepts(b) || b.accepts(a))
                    && r1.accepts(r2)
            }
            (a, b) => a == b,
        }
    }

    /// Symmetric compatibility: either side accepts the other.
    pub fn is_compatible_with(&self, other: &TypeDescriptor) -> bool {
        self.accepts(other) || other.accepts(self)
    }

    /// Common type of two compatible descriptors (the wider one).
    pub fn unify(&self, other: &TypeDescriptor) -> Option<TypeDescriptor> {
        if self.is_any() {
            return Some(other.clone());
        }
        if other.is_any() || self == other {
            return Some(self.clone());
        }
        if self.accepts(other) {
            Some(self.clone())
        } else if other.accepts(self) {
            Some(other.clone())
        } else {
            None
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Array(elem) => write!(f, "Array<{elem}>"),
            TypeDescriptor::Stack(elem) => write!(f, "Stack<{elem}>"),
            TypeDescriptor::Queue(elem) => write!(f, "Queue<{elem}>"),
            TypeDescriptor::Function { params, ret } => {
                let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                write!(f, "Function({}) -> {ret}", params.join(", "))
            }
            other => write!(f, "{}", other.name()),
        }
    }
}

impl fmt::Display for ExceptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
