//! Symbol tables and the name lookup policy
//!
//! Scopes form an `Rc<RefCell<_>>` parent chain. A function scope is
//! *restricted*: lookup from inside it sees its own table and the global
//! table only, unless a name was declared `nonlocal`. A name declared
//! `global` resolves straight to the global table.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use super::{FunctionMetadata, InterpResult, RuntimeError};
use crate::types::{TypeDescriptor, Value};

/// Shared reference to a symbol table
pub type ScopeRef = Rc<RefCell<SymbolTable>>;

/// The construct that pushed a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Program,
    Function,
    Block,
    If,
    Else,
    Loop,
    Try,
    Catch,
    Finally,
    Lambda,
}

impl BlockKind {
    /// Function declarations may appear directly in these blocks only.
    pub fn allows_functions(self) -> bool {
        matches!(self, BlockKind::Program | BlockKind::Function | BlockKind::Block)
    }

    pub fn is_restricted(self) -> bool {
        self == BlockKind::Function
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockKind::Program => "program",
            BlockKind::Function => "function",
            BlockKind::Block => "plain",
            BlockKind::If => "if",
            BlockKind::Else => "else",
            BlockKind::Loop => "loop",
            BlockKind::Try => "try",
            BlockKind::Catch => "catch",
            BlockKind::Finally => "finally",
            BlockKind::Lambda => "lambda",
        };
        write!(f, "{name}")
    }
}

/// A variable binding
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolEntry {
    /// `None` until the first assignment fixes it
    pub ty: Option<TypeDescriptor>,
    pub value: Option<Value>,
    pub constant: bool,
}

impl SymbolEntry {
    pub fn variable(ty: Option<TypeDescriptor>, value: Option<Value>) -> Self {
        SymbolEntry { ty, value, constant: false }
    }

    pub fn constant(ty: Option<TypeDescriptor>, value: Option<Value>) -> Self {
        SymbolEntry { ty, value, constant: true }
    }
}

/// What a name is bound to. Variables and functions share one namespace.
#[derive(Debug, Clone)]
pub enum Binding {
    Variable(SymbolEntry),
    Function(FunctionMetadata),
}

/// One scope's bindings
#[derive(Debug)]
pub struct SymbolTable {
    kind: BlockKind,
    bindings: HashMap<String, Binding>,
    /// Declaration order of `bindings`
    order: Vec<String>,
    nonlocals: HashSet<String>,
    globals: HashSet<String>,
    parent: Option<ScopeRef>,
}

impl SymbolTable {
    /// Create the global (program root) table
    pub fn global() -> Self {
        Self::new(BlockKind::Program, None)
    }

    pub fn new(kind: BlockKind, parent: Option<ScopeRef>) -> Self {
        SymbolTable {
            kind,
            bindings: HashMap::new(),
            order: Vec::new(),
            nonlocals: HashSet::new(),
            globals: HashSet::new(),
            parent,
        }
    }

    /// Wrap in Rc<RefCell<>>
    pub fn into_ref(self) -> ScopeRef {
        Rc::new(RefCell::new(self))
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn is_restricted(&self) -> bool {
        self.kind.is_restricted()
    }

    pub fn parent(&self) -> Option<ScopeRef> {
        self.parent.clone()
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Binding> {
        self.bindings.get_mut(name)
    }

    /// Names bound here, in declaration order
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Bind a new variable; a name may be declared once per scope.
    pub fn define(&mut self, name: &str, entry: SymbolEntry) -> InterpResult<()> {
        if self.bindings.contains_key(name) {
            return Err(RuntimeError::redeclaration(name));
        }
        self.insert(name, Binding::Variable(entry));
        Ok(())
    }

    /// Bind a function, merging into an existing overload set of that name.
    pub fn define_function(&mut self, metadata: FunctionMetadata) -> InterpResult<()> {
        let name = metadata.name().to_string();
        match self.bindings.get_mut(&name) {
            Some(Binding::Function(existing)) => existing.merge(metadata),
            Some(Binding::Variable(_)) => Err(RuntimeError::redeclaration(&name)),
            None => {
                self.insert(&name, Binding::Function(metadata));
                Ok(())
            }
        }
    }

    /// Bind a builtin into a fresh global table. Builtin names are distinct,
    /// so there is nothing to merge with.
    pub(crate) fn define_builtin(&mut self, metadata: FunctionMetadata) {
        let name = metadata.name().to_string();
        self.insert(&name, Binding::Function(metadata));
    }

    fn insert(&mut self, name: &str, binding: Binding) {
        self.order.push(name.to_string());
        self.bindings.insert(name.to_string(), binding);
    }

    pub fn declare_nonlocal(&mut self, name: &str) {
        self.nonlocals.insert(name.to_string());
    }

    pub fn declare_global(&mut self, name: &str) {
        self.globals.insert(name.to_string());
    }

    pub fn is_global(&self, name: &str) -> bool {
        self.globals.contains(name)
    }
}

/// Create a child scope from a parent reference
pub fn child_scope(kind: BlockKind, parent: &ScopeRef) -> ScopeRef {
    SymbolTable::new(kind, Some(Rc::clone(parent))).into_ref()
}

enum Step {
    Found,
    Global,
    Parent(ScopeRef),
}

/// Find the scope binding `name`, starting at `start`, under the lookup
/// policy: walk outward, jumping from a restricted table straight to
/// `global` unless the name was declared nonlocal on the way.
pub fn resolve(start: &ScopeRef, global: &ScopeRef, name: &str) -> Option<ScopeRef> {
    let mut current = Rc::clone(start);
    let mut escaping = false;
    loop {
        let step = {
            let table = current.borrow();
            if table.globals.contains(name) {
                Step::Global
            } else if table.bindings.contains_key(name) {
                Step::Found
            } else {
                escaping |= table.nonlocals.contains(name);
                match &table.parent {
                    _ if table.is_restricted() && !escaping => Step::Global,
                    Some(parent) => Step::Parent(Rc::clone(parent)),
                    None => return None,
                }
            }
        };
        match step {
            Step::Found => return Some(current),
            Step::Global => {
                return global.borrow().contains_local(name).then(|| Rc::clone(global));
            }
            Step::Parent(parent) => current = parent,
        }
    }
}

/// Every name visible from `start` under the lookup policy, nearest first.
pub fn visible_names(start: &ScopeRef, global: &ScopeRef) -> Vec<String> {
    let mut names = Vec::new();
    let mut reached_global = false;
    let mut current = Some(Rc::clone(start));
    while let Some(scope) = current {
        reached_global |= Rc::ptr_eq(&scope, global);
        let table = scope.borrow();
        names.extend(table.order.iter().rev().cloned());
        current = if table.is_restricted() { None } else { table.parent() };
    }
    if !reached_global {
        names.extend(global.borrow().order.iter().rev().cloned());
    }
    names
}
