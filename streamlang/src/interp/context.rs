//! Execution context threaded through `evaluate` and `type_of`

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace};

use super::scope::{self, Binding, BlockKind, ScopeRef, SymbolEntry, SymbolTable};
use super::typeck::ReturnSlot;
use super::{builtins, FunctionMetadata, InterpResult, RuntimeError};
use crate::config::{InterpreterConfig, OutputMode};
use crate::types::{TypeDescriptor, TypeRegistry, Value};

/// One active function invocation
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub function_name: String,
    pub arguments: Vec<Value>,
    pub scope: ScopeRef,
}

/// Execution environment for one program run.
///
/// Owns the scope stack (bottom = global), the call stack, the recursion
/// counters, the type registry and the configuration. Not `Send`.
#[derive(Debug)]
pub struct Context {
    global: ScopeRef,
    scopes: Vec<ScopeRef>,
    call_stack: Vec<CallFrame>,
    recursion: HashMap<String, usize>,
    registry: TypeRegistry,
    config: InterpreterConfig,
    captured: Vec<String>,
    /// Static pass: loops enclosing the current statement in this body
    pub(crate) loop_depth: usize,
    /// Static pass: innermost function or lambda body last
    pub(crate) returns: Vec<ReturnSlot>,
}

impl Context {
    pub fn new(config: InterpreterConfig) -> Self {
        Self::with_registry(config, TypeRegistry::new())
    }

    /// Create a context around an existing registry (e.g. one with
    /// embedder-registered exception types).
    pub fn with_registry(config: InterpreterConfig, registry: TypeRegistry) -> Self {
        let global = SymbolTable::global().into_ref();
        builtins::install(&mut global.borrow_mut());
        Context {
            scopes: vec![Rc::clone(&global)],
            global,
            call_stack: Vec::new(),
            recursion: HashMap::new(),
            registry,
            config,
            captured: Vec::new(),
            loop_depth: 0,
            returns: Vec::new(),
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    // ---- scopes ----

    pub fn global_scope(&self) -> ScopeRef {
        Rc::clone(&self.global)
    }

    pub fn current_scope(&self) -> ScopeRef {
        self.scopes.last().map(Rc::clone).unwrap_or_else(|| self.global_scope())
    }

    pub fn current_kind(&self) -> BlockKind {
        self.current_scope().borrow().kind()
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// Push a child of the current scope
    pub fn push_scope(&mut self, kind: BlockKind) {
        let parent = self.current_scope();
        self.push_scope_with_parent(kind, parent);
    }

    /// Push a scope under an explicit parent (function and lambda bodies)
    pub fn push_scope_with_parent(&mut self, kind: BlockKind, parent: ScopeRef) {
        self.scopes.push(scope::child_scope(kind, &parent));
        trace!(%kind, depth = self.scopes.len(), "push scope");
    }

    /// Pop the current scope; the global scope is never popped
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            if let Some(scope) = self.scopes.pop() {
                trace!(kind = %scope.borrow().kind(), depth = self.scopes.len(), "pop scope");
            }
        }
    }

    /// Run `f` inside a fresh child scope, popping it whatever `f` returns.
    pub fn scoped<T>(
        &mut self,
        kind: BlockKind,
        f: impl FnOnce(&mut Self) -> InterpResult<T>,
    ) -> InterpResult<T> {
        self.push_scope(kind);
        let result = f(self);
        self.pop_scope();
        result
    }

    pub fn scoped_with_parent<T>(
        &mut self,
        kind: BlockKind,
        parent: ScopeRef,
        f: impl FnOnce(&mut Self) -> InterpResult<T>,
    ) -> InterpResult<T> {
        self.push_scope_with_parent(kind, parent);
        let result = f(self);
        self.pop_scope();
        result
    }

    // ---- bindings ----

    fn resolve(&self, name: &str) -> Option<ScopeRef> {
        scope::resolve(&self.current_scope(), &self.global, name)
    }

    /// Names visible from the current scope, for suggestions
    pub fn visible_names(&self) -> Vec<String> {
        scope::visible_names(&self.current_scope(), &self.global)
    }

    fn undefined_variable(&self, name: &str) -> RuntimeError {
        RuntimeError::undefined_variable_with_hint(name, self.visible_names())
    }

    /// Binding for `name` under the lookup policy
    pub fn binding(&self, name: &str) -> Option<Binding> {
        let scope = self.resolve(name)?;
        let table = scope.borrow();
        table.get(name).cloned()
    }

    pub fn declare_variable(&mut self, name: &str, entry: SymbolEntry) -> InterpResult<()> {
        self.current_scope().borrow_mut().define(name, entry)
    }

    /// True if `name` is already bound in the current scope itself
    pub fn is_declared_locally(&self, name: &str) -> bool {
        self.current_scope().borrow().contains_local(name)
    }

    /// Register a function in the current scope, merging overloads.
    pub fn declare_function(&mut self, metadata: FunctionMetadata) -> InterpResult<()> {
        let kind = self.current_kind();
        if !kind.allows_functions() {
            return Err(RuntimeError::function_declaration_not_allowed(
                metadata.name(),
                &kind.to_string(),
            ));
        }
        debug!(name = metadata.name(), arities = ?metadata.arities(), "declare function");
        self.current_scope().borrow_mut().define_function(metadata)
    }

    /// Current value of a variable
    pub fn lookup(&self, name: &str) -> InterpResult<Value> {
        match self.binding(name) {
            Some(Binding::Variable(entry)) => {
                entry.value.ok_or_else(|| RuntimeError::unassigned_variable(name))
            }
            Some(Binding::Function(_)) => Err(RuntimeError::type_mismatch(format!(
                "function {name} cannot be used as a value"
            ))),
            None => Err(self.undefined_variable(name)),
        }
    }

    /// Static type of a binding; `Any` while unknown
    pub fn lookup_type(&self, name: &str) -> InterpResult<TypeDescriptor> {
        match self.binding(name) {
            Some(Binding::Variable(entry)) => Ok(entry.ty.unwrap_or(TypeDescriptor::Any)),
            Some(Binding::Function(meta)) => match meta.list_overloads() {
                [single] => Ok(single.descriptor()),
                _ => Ok(TypeDescriptor::Any),
            },
            None => Err(self.undefined_variable(name)),
        }
    }

    /// Store `value` into an existing variable.
    ///
    /// The first assignment to an untyped entry fixes its type; later ones
    /// must be compatible and are widened to the slot type.
    pub fn assign(&mut self, name: &str, value: Value) -> InterpResult<Value> {
        let scope = self.resolve(name).ok_or_else(|| self.undefined_variable(name))?;
        let mut table = scope.borrow_mut();
        let Some(Binding::Variable(entry)) = table.get_mut(name) else {
            return Err(RuntimeError::type_mismatch(format!(
                "cannot assign to function {name}"
            )));
        };
        if entry.constant && entry.value.is_some() {
            return Err(RuntimeError::constant_reassignment(name));
        }
        let value = match &entry.ty {
            Some(slot) => {
                let value_ty = value.type_descriptor();
                if !slot.accepts(&value_ty) {
                    return Err(RuntimeError::type_error(&slot.to_string(), &value_ty.to_string()));
                }
                self.registry.widen(value, slot)
            }
            None => {
                entry.ty = Some(value.type_descriptor());
                value
            }
        };
        entry.value = Some(value.clone());
        Ok(value)
    }

    /// Static counterpart of [`assign`](Self::assign): fixes or checks the
    /// slot type and returns it.
    pub fn assign_type(&mut self, name: &str, ty: TypeDescriptor) -> InterpResult<TypeDescriptor> {
        let scope = self.resolve(name).ok_or_else(|| self.undefined_variable(name))?;
        let mut table = scope.borrow_mut();
        let Some(Binding::Variable(entry)) = table.get_mut(name) else {
            return Err(RuntimeError::type_mismatch(format!(
                "cannot assign to function {name}"
            )));
        };
        match &entry.ty {
            Some(slot) if !slot.is_any() => {
                if !slot.accepts(&ty) {
                    return Err(RuntimeError::type_error(&slot.to_string(), &ty.to_string()));
                }
                Ok(slot.clone())
            }
            _ => {
                entry.ty = Some(ty.clone());
                Ok(ty)
            }
        }
    }

    /// Record the inferred return type of a user overload (static pass).
    pub fn set_return_type(&mut self, name: &str, arity: usize, ty: TypeDescriptor) {
        let Some(scope) = self.resolve(name) else { return };
        let mut table = scope.borrow_mut();
        if let Some(Binding::Function(meta)) = table.get_mut(name) {
            if let Some(overload) = meta.find_overload_mut(arity) {
                overload.return_type = Some(ty);
            }
        }
    }

    /// Mark `name` nonlocal in the current scope; it must resolve afterwards.
    pub fn declare_nonlocal(&mut self, name: &str) -> InterpResult<()> {
        self.current_scope().borrow_mut().declare_nonlocal(name);
        if self.resolve(name).is_none() {
            return Err(self.undefined_variable(name));
        }
        Ok(())
    }

    pub fn declare_global(&mut self, name: &str) {
        self.current_scope().borrow_mut().declare_global(name);
    }

    /// Check `value` against a declared type, widening if needed.
    pub fn coerce(&self, value: Value, target: &TypeDescriptor) -> InterpResult<Value> {
        let value_ty = value.type_descriptor();
        if !target.accepts(&value_ty) {
            return Err(RuntimeError::type_error(&target.to_string(), &value_ty.to_string()));
        }
        Ok(self.registry.widen(value, target))
    }

    // ---- calls ----

    /// Enter a call of `name`: bump its recursion counter and push a frame.
    ///
    /// Fails without side effects if the counter would exceed the cap.
    pub fn enter_call(&mut self, name: &str, arguments: Vec<Value>, scope: ScopeRef) -> InterpResult<()> {
        let limit = self.config.max_recursion_depth;
        let depth = self.recursion.entry(name.to_string()).or_insert(0);
        if *depth >= limit {
            if *depth == 0 {
                self.recursion.remove(name);
            }
            return Err(RuntimeError::recursion_limit(name, limit));
        }
        *depth += 1;
        debug!(name, depth = *depth, "enter call");
        self.call_stack.push(CallFrame { function_name: name.to_string(), arguments, scope });
        Ok(())
    }

    /// Leave the innermost call of `name`
    pub fn exit_call(&mut self, name: &str) {
        self.call_stack.pop();
        if let Some(depth) = self.recursion.get_mut(name) {
            *depth -= 1;
            if *depth == 0 {
                self.recursion.remove(name);
            }
        }
        debug!(name, "exit call");
    }

    /// Active invocations of `name`
    pub fn recursion_depth(&self, name: &str) -> usize {
        self.recursion.get(name).copied().unwrap_or(0)
    }

    pub fn call_stack(&self) -> &[CallFrame] {
        &self.call_stack
    }

    /// Rendered call stack, outermost frame first
    pub fn stack_trace(&self) -> Vec<String> {
        self.call_stack
            .iter()
            .map(|frame| {
                let args: Vec<String> = frame.arguments.iter().map(|a| a.to_string()).collect();
                format!("{}({})", frame.function_name, args.join(", "))
            })
            .collect()
    }

    // ---- output ----

    /// Write one line to the configured sink
    pub fn write_line(&mut self, line: &str) {
        match self.config.output {
            OutputMode::Stdout => println!("{line}"),
            OutputMode::Capture => self.captured.push(line.to_string()),
        }
    }

    /// Lines collected in capture mode
    pub fn output(&self) -> &[String] {
        &self.captured
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(InterpreterConfig::default())
    }
}
