//! Runtime errors for the interpreter
//!
//! These are interpreter faults: they abort evaluation outward and are never
//! visible to user `catch` clauses. User-level exceptions travel as
//! [`Signal::Raised`](super::Signal::Raised) instead.

use std::fmt;

/// Runtime error during interpretation
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    /// Call stack at the point of failure, innermost frame last
    pub trace: Vec<String>,
}

/// Kinds of runtime errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Undefined variable
    UndefinedVariable,
    /// Name declared twice in one scope, or overload arity collision
    Redeclaration,
    /// Undefined function
    UndefinedFunction,
    /// Argument count mismatch
    ArityMismatch,
    /// Type mismatch
    TypeError,
    /// Recursion depth cap exceeded
    RecursionLimit,
    BreakOutsideLoop,
    ContinueOutsideLoop,
    ReturnOutsideFunction,
    /// Write to an initialized constant
    ConstantReassignment,
    /// Function declared inside a block kind that forbids it
    FunctionDeclarationNotAllowed,
    /// Unregistered type name
    UnknownType,
    /// Operation with no runtime semantics (stream operators)
    UnsupportedOperation,
    /// Self-recursive function without a termination path
    PossibleInfiniteRecursion,
}

impl RuntimeError {
    fn new(kind: ErrorKind, message: String) -> Self {
        RuntimeError { kind, message, trace: Vec::new() }
    }

    pub fn undefined_variable(name: &str) -> Self {
        Self::new(ErrorKind::UndefinedVariable, format!("undefined variable: {name}"))
    }

    /// Undefined variable with a "did you mean" hint over the names in scope.
    pub fn undefined_variable_with_hint<S: AsRef<str>>(name: &str, in_scope: impl IntoIterator<Item = S>) -> Self {
        let hint = did_you_mean(name, in_scope);
        Self::new(ErrorKind::UndefinedVariable, format!("undefined variable: {name}{hint}"))
    }

    pub fn unassigned_variable(name: &str) -> Self {
        Self::new(
            ErrorKind::UndefinedVariable,
            format!("variable {name} is used before being assigned"),
        )
    }

    pub fn redeclaration(name: &str) -> Self {
        Self::new(
            ErrorKind::Redeclaration,
            format!("{name} is already declared in this scope"),
        )
    }

    pub fn overload_redeclaration(name: &str, arity: usize) -> Self {
        Self::new(
            ErrorKind::Redeclaration,
            format!("function {name} already has an overload taking {arity} argument(s)"),
        )
    }

    pub fn overload_name_mismatch(name: &str, other: &str) -> Self {
        Self::new(
            ErrorKind::Redeclaration,
            format!("cannot merge overloads of {other} into {name}"),
        )
    }

    pub fn undefined_function_with_hint<S: AsRef<str>>(name: &str, in_scope: impl IntoIterator<Item = S>) -> Self {
        let hint = did_you_mean(name, in_scope);
        Self::new(ErrorKind::UndefinedFunction, format!("undefined function: {name}{hint}"))
    }

    pub fn arity_mismatch(name: &str, expected: &[usize], got: usize) -> Self {
        let expected: Vec<String> = expected.iter().map(|n| n.to_string()).collect();
        Self::new(
            ErrorKind::ArityMismatch,
            format!(
                "function {name} expects {} argument(s), got {got}",
                expected.join(" or ")
            ),
        )
    }

    pub fn type_error(expected: &str, got: &str) -> Self {
        Self::new(ErrorKind::TypeError, format!("type error: expected {expected}, got {got}"))
    }

    /// Type error with a free-form message
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, format!("type error: {}", message.into()))
    }

    pub fn recursion_limit(name: &str, limit: usize) -> Self {
        Self::new(
            ErrorKind::RecursionLimit,
            format!("maximum recursion depth {limit} exceeded in {name}"),
        )
    }

    pub fn break_outside_loop() -> Self {
        Self::new(ErrorKind::BreakOutsideLoop, "break outside of a loop".to_string())
    }

    pub fn continue_outside_loop() -> Self {
        Self::new(ErrorKind::ContinueOutsideLoop, "continue outside of a loop".to_string())
    }

    pub fn return_outside_function() -> Self {
        Self::new(
            ErrorKind::ReturnOutsideFunction,
            "return outside of a function body".to_string(),
        )
    }

    pub fn constant_reassignment(name: &str) -> Self {
        Self::new(
            ErrorKind::ConstantReassignment,
            format!("cannot assign twice to constant {name}"),
        )
    }

    pub fn function_declaration_not_allowed(name: &str, block: &str) -> Self {
        Self::new(
            ErrorKind::FunctionDeclarationNotAllowed,
            format!("function {name} cannot be declared inside a {block} block"),
        )
    }

    pub fn unknown_type<S: AsRef<str>>(name: &str, registered: impl IntoIterator<Item = S>) -> Self {
        let hint = did_you_mean(name, registered);
        Self::new(ErrorKind::UnknownType, format!("unknown type: {name}{hint}"))
    }

    pub fn unsupported(what: &str) -> Self {
        Self::new(ErrorKind::UnsupportedOperation, format!("unsupported operation: {what}"))
    }

    pub fn possible_infinite_recursion(name: &str) -> Self {
        Self::new(
            ErrorKind::PossibleInfiniteRecursion,
            format!("function {name} calls itself but has no path that returns"),
        )
    }

    /// Attach a call-stack trace unless one is already recorded.
    pub fn with_trace(mut self, trace: Vec<String>) -> Self {
        if self.trace.is_empty() {
            self.trace = trace;
        }
        self
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Runtime error: {}", self.message)
    }
}

impl std::error::Error for RuntimeError {}

/// Result type for interpreter operations
pub type InterpResult<T> = Result<T, RuntimeError>;

/// Hint line naming the closest of `candidates`, empty when none is close.
///
/// Closeness allows one edit per three characters of `name`, at least one.
/// Equal distances go to the alphabetically first name so that hints over
/// hash-ordered tables stay stable.
fn did_you_mean<S: AsRef<str>>(name: &str, candidates: impl IntoIterator<Item = S>) -> String {
    let allowed = (name.chars().count() / 3).max(1);
    let best = candidates
        .into_iter()
        .filter_map(|candidate| {
            let candidate = candidate.as_ref();
            let distance = edit_distance(name, candidate);
            (distance > 0 && distance <= allowed).then(|| (distance, candidate.to_string()))
        })
        .min();
    match best {
        Some((_, closest)) => format!("\n  hint: did you mean `{closest}`?"),
        None => String::new(),
    }
}

/// Levenshtein distance over chars, one row at a time.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitute = diagonal + usize::from(ca != *cb);
            diagonal = row[j + 1];
            row[j + 1] = substitute.min(row[j] + 1).min(diagonal + 1);
        }
    }
    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_variable() {
        let err = RuntimeError::undefined_variable("foo");
        assert_eq!(err.kind, ErrorKind::UndefinedVariable);
        assert!(err.message.contains("foo"));
        assert!(err.trace.is_empty());
    }

    #[test]
    fn test_undefined_variable_hint() {
        let in_scope = vec!["total".to_string(), "counter".to_string()];
        let err = RuntimeError::undefined_variable_with_hint("countr", in_scope);
        insta::assert_snapshot!(err.to_string(), @r"
        Runtime error: undefined variable: countr
          hint: did you mean `counter`?
        ");
    }

    #[test]
    fn test_no_hint_when_nothing_in_scope_is_close() {
        let err = RuntimeError::undefined_function_with_hint("zzz", ["counter", "print"]);
        assert_eq!(err.message, "undefined function: zzz");
        let err = RuntimeError::undefined_variable_with_hint("x", Vec::<String>::new());
        assert_eq!(err.message, "undefined variable: x");
    }

    #[test]
    fn test_short_names_allow_one_edit() {
        let err = RuntimeError::undefined_variable_with_hint("ab", ["abc", "xy"]);
        assert!(err.message.ends_with("did you mean `abc`?"), "{}", err.message);
        let err = RuntimeError::undefined_variable_with_hint("ab", ["abcd"]);
        assert!(!err.message.contains("hint"));
    }

    #[test]
    fn test_unknown_type_hint() {
        let err = RuntimeError::unknown_type("Integr", ["String", "Integer", "Float"]);
        assert_eq!(err.kind, ErrorKind::UnknownType);
        assert!(err.message.ends_with("did you mean `Integer`?"), "{}", err.message);
    }

    #[test]
    fn test_hint_ties_pick_first_alphabetically() {
        let forward = RuntimeError::unknown_type("Strem", ["Stream", "Stret"]);
        let backward = RuntimeError::unknown_type("Strem", ["Stret", "Stream"]);
        assert_eq!(forward.message, backward.message);
        assert!(forward.message.ends_with("`Stream`?"));
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("flaw", "lawn"), 2);
        assert_eq!(edit_distance("café", "cafe"), 1);
    }

    #[test]
    fn test_arity_mismatch_lists_overloads() {
        let err = RuntimeError::arity_mismatch("add", &[1, 2], 3);
        assert_eq!(err.kind, ErrorKind::ArityMismatch);
        assert_eq!(err.message, "function add expects 1 or 2 argument(s), got 3");
    }

    #[test]
    fn test_type_error() {
        let err = RuntimeError::type_error("Boolean", "Integer");
        assert_eq!(err.kind, ErrorKind::TypeError);
        assert_eq!(err.message, "type error: expected Boolean, got Integer");
    }

    #[test]
    fn test_recursion_limit() {
        let err = RuntimeError::recursion_limit("loop", 1000);
        assert_eq!(err.kind, ErrorKind::RecursionLimit);
        assert!(err.message.contains("1000"));
    }

    #[test]
    fn test_with_trace_keeps_innermost() {
        let err = RuntimeError::break_outside_loop()
            .with_trace(vec!["inner".into()])
            .with_trace(vec!["outer".into()]);
        assert_eq!(err.trace, vec!["inner".to_string()]);
    }

    #[test]
    fn test_display() {
        let err = RuntimeError::constant_reassignment("PI");
        assert_eq!(format!("{}", err), "Runtime error: cannot assign twice to constant PI");
    }

    #[test]
    fn test_error_kind_ne() {
        assert_ne!(ErrorKind::BreakOutsideLoop, ErrorKind::ContinueOutsideLoop);
        assert_eq!(
            RuntimeError::redeclaration("x").kind,
            RuntimeError::overload_redeclaration("f", 2).kind
        );
    }

    #[test]
    fn test_error_is_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(RuntimeError::unsupported("stream split"));
        assert!(err.to_string().contains("stream split"));
    }
}
