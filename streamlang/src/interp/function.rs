//! Function metadata: arity-distinguished overload sets

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::{Context, InterpResult, RuntimeError, Signal, SymbolTable};
use crate::ast::FnDecl;
use crate::types::{TypeDescriptor, Value};

/// A host-implemented function.
///
/// `invoke` completes with `Signal::Normal` carrying the result, or
/// `Signal::Raised` for a user-level exception. Faults are returned as `Err`.
pub trait Callable: fmt::Debug {
    fn name(&self) -> &str;

    fn param_types(&self) -> Vec<TypeDescriptor>;

    fn return_type(&self) -> TypeDescriptor;

    /// Static result type for the given argument types.
    fn result_type(&self, args: &[TypeDescriptor]) -> TypeDescriptor {
        let _ = args;
        self.return_type()
    }

    fn invoke(&self, args: &[Value], ctx: &mut Context) -> InterpResult<Signal>;
}

/// A declared parameter; `ty` is `None` when unannotated.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub ty: Option<TypeDescriptor>,
}

impl ParamSpec {
    pub fn descriptor(&self) -> TypeDescriptor {
        self.ty.clone().unwrap_or(TypeDescriptor::Any)
    }
}

#[derive(Clone)]
pub enum FunctionBody {
    /// User declaration plus the scope it was declared in
    User {
        decl: Rc<FnDecl>,
        scope: Weak<RefCell<SymbolTable>>,
    },
    Builtin(Rc<dyn Callable>),
}

impl fmt::Debug for FunctionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionBody::User { decl, .. } => write!(f, "User({})", decl.name),
            FunctionBody::Builtin(callable) => write!(f, "Builtin({})", callable.name()),
        }
    }
}

/// One implementation of a named function
#[derive(Debug, Clone)]
pub struct Overload {
    pub params: Vec<ParamSpec>,
    pub return_type: Option<TypeDescriptor>,
    pub body: FunctionBody,
}

impl Overload {
    pub fn builtin(callable: Rc<dyn Callable>) -> Self {
        let params = callable
            .param_types()
            .into_iter()
            .enumerate()
            .map(|(i, ty)| ParamSpec { name: format!("arg{i}"), ty: Some(ty) })
            .collect();
        Overload {
            params,
            return_type: Some(callable.return_type()),
            body: FunctionBody::Builtin(callable),
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn param_types(&self) -> Vec<TypeDescriptor> {
        self.params.iter().map(ParamSpec::descriptor).collect()
    }

    /// Descriptor of this overload as a first-class function type.
    pub fn descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::function(
            self.param_types(),
            self.return_type.clone().unwrap_or(TypeDescriptor::Any),
        )
    }
}

/// Every overload registered under one name. No two share an arity.
#[derive(Debug, Clone)]
pub struct FunctionMetadata {
    name: String,
    overloads: Vec<Overload>,
}

impl FunctionMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        FunctionMetadata { name: name.into(), overloads: Vec::new() }
    }

    pub fn with_overload(name: impl Into<String>, overload: Overload) -> Self {
        FunctionMetadata { name: name.into(), overloads: vec![overload] }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_overload(&mut self, overload: Overload) -> InterpResult<()> {
        if self.has_overload(overload.arity()) {
            return Err(RuntimeError::overload_redeclaration(&self.name, overload.arity()));
        }
        self.overloads.push(overload);
        Ok(())
    }

    pub fn has_overload(&self, arity: usize) -> bool {
        self.find_overload(arity).is_some()
    }

    pub fn find_overload(&self, arity: usize) -> Option<&Overload> {
        self.overloads.iter().find(|o| o.arity() == arity)
    }

    pub fn find_overload_mut(&mut self, arity: usize) -> Option<&mut Overload> {
        self.overloads.iter_mut().find(|o| o.arity() == arity)
    }

    pub fn remove_overload(&mut self, arity: usize) -> Option<Overload> {
        let index = self.overloads.iter().position(|o| o.arity() == arity)?;
        Some(self.overloads.remove(index))
    }

    /// Overloads in registration order
    pub fn list_overloads(&self) -> &[Overload] {
        &self.overloads
    }

    pub fn arities(&self) -> Vec<usize> {
        let mut arities: Vec<usize> = self.overloads.iter().map(Overload::arity).collect();
        arities.sort_unstable();
        arities
    }

    /// Fold `other`'s overloads into this set. Nothing is added unless every
    /// overload fits.
    pub fn merge(&mut self, other: FunctionMetadata) -> InterpResult<()> {
        if other.name != self.name {
            return Err(RuntimeError::overload_name_mismatch(&self.name, &other.name));
        }
        if let Some(clash) = other.overloads.iter().find(|o| self.has_overload(o.arity())) {
            return Err(RuntimeError::overload_redeclaration(&self.name, clash.arity()));
        }
        self.overloads.extend(other.overloads);
        Ok(())
    }
}
