//! Statement and expression nodes

use serde::{Deserialize, Serialize};

use super::{BinOp, TypeExpr, UnOp};

/// A StreamLanguage AST node.
///
/// Statements and expressions share one enum: every node evaluates to a
/// control-flow signal and type-checks to a descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    // Literals
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    ArrayLit(Vec<Node>),

    /// Variable reference
    Var(String),

    /// Variable or constant declaration: `var x: T = e` / `const x = e`
    VarDecl {
        name: String,
        ty: Option<TypeExpr>,
        value: Option<Box<Node>>,
        constant: bool,
    },

    /// Assignment to an existing binding: `x = e`
    Assign { name: String, value: Box<Node> },

    /// `nonlocal a, b`
    Nonlocal(Vec<String>),

    /// `global a, b`
    Global(Vec<String>),

    Binary {
        left: Box<Node>,
        op: BinOp,
        right: Box<Node>,
    },

    Unary { op: UnOp, operand: Box<Node> },

    /// Element access: `e[i]`
    Index { target: Box<Node>, index: Box<Node> },

    /// Plain `{ ... }` block
    Block(Vec<Node>),

    If {
        cond: Box<Node>,
        then_branch: Vec<Node>,
        else_branch: Option<Vec<Node>>,
    },

    While { cond: Box<Node>, body: Vec<Node> },

    /// `for (init; cond; step) { body }`
    For {
        init: Box<Node>,
        cond: Box<Node>,
        step: Box<Node>,
        body: Vec<Node>,
    },

    Break,
    Continue,
    Return(Option<Box<Node>>),

    FnDecl(FnDecl),

    /// Call by name: `f(a, b)`
    Call { func: String, args: Vec<Node> },

    Lambda(LambdaDef),

    /// Call of a computed callee: `(e)(a, b)`
    Apply { callee: Box<Node>, args: Vec<Node> },

    TryCatch {
        body: Vec<Node>,
        handlers: Vec<CatchClause>,
        finally: Option<Vec<Node>>,
    },

    Throw(Box<Node>),

    /// Registry constructor call: `Stack()`, `ValueError("bad")`
    Construct { ty: String, args: Vec<Node> },

    /// Explicit conversion: `e as T`
    Convert { value: Box<Node>, target: TypeExpr },
}

/// Function declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FnDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub ret_ty: Option<TypeExpr>,
    pub body: Vec<Node>,
}

/// Function or lambda parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Option<TypeExpr>,
}

/// Anonymous function literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaDef {
    pub params: Vec<Param>,
    pub body: Vec<Node>,
}

/// `catch (T binding) { body }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    pub exception: String,
    pub binding: String,
    pub body: Vec<Node>,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Param { name: name.into(), ty: None }
    }

    pub fn typed(name: impl Into<String>, ty: TypeExpr) -> Self {
        Param { name: name.into(), ty: Some(ty) }
    }
}

impl Node {
    pub fn int(n: i64) -> Self {
        Node::Int(n)
    }

    pub fn float(f: f64) -> Self {
        Node::Float(f)
    }

    pub fn string(s: impl Into<String>) -> Self {
        Node::Str(s.into())
    }

    pub fn var(name: impl Into<String>) -> Self {
        Node::Var(name.into())
    }

    pub fn var_decl(name: impl Into<String>, value: Node) -> Self {
        Node::VarDecl {
            name: name.into(),
            ty: None,
            value: Some(Box::new(value)),
            constant: false,
        }
    }

    pub fn typed_decl(name: impl Into<String>, ty: TypeExpr, value: Option<Node>) -> Self {
        Node::VarDecl {
            name: name.into(),
            ty: Some(ty),
            value: value.map(Box::new),
            constant: false,
        }
    }

    pub fn const_decl(name: impl Into<String>, value: Node) -> Self {
        Node::VarDecl {
            name: name.into(),
            ty: None,
            value: Some(Box::new(value)),
            constant: true,
        }
    }

    pub fn assign(name: impl Into<String>, value: Node) -> Self {
        Node::Assign { name: name.into(), value: Box::new(value) }
    }

    pub fn binary(left: Node, op: BinOp, right: Node) -> Self {
        Node::Binary { left: Box::new(left), op, right: Box::new(right) }
    }

    pub fn unary(op: UnOp, operand: Node) -> Self {
        Node::Unary { op, operand: Box::new(operand) }
    }

    pub fn ret(value: Node) -> Self {
        Node::Return(Some(Box::new(value)))
    }

    pub fn call(func: impl Into<String>, args: Vec<Node>) -> Self {
        Node::Call { func: func.into(), args }
    }

    pub fn if_else(cond: Node, then_branch: Vec<Node>, else_branch: Option<Vec<Node>>) -> Self {
        Node::If { cond: Box::new(cond), then_branch, else_branch }
    }

    pub fn while_loop(cond: Node, body: Vec<Node>) -> Self {
        Node::While { cond: Box::new(cond), body }
    }

    pub fn throw(value: Node) -> Self {
        Node::Throw(Box::new(value))
    }

    pub fn construct(ty: impl Into<String>, args: Vec<Node>) -> Self {
        Node::Construct { ty: ty.into(), args }
    }

    /// Direct children, in evaluation order.
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Int(_)
            | Node::Float(_)
            | Node::Str(_)
            | Node::Bool(_)
            | Node::Var(_)
            | Node::Nonlocal(_)
            | Node::Global(_)
            | Node::Break
            | Node::Continue => Vec::new(),
            Node::ArrayLit(items) | Node::Block(items) => items.iter().collect(),
            Node::VarDecl { value, .. } => value.iter().map(|v| v.as_ref()).collect(),
            Node::Assign { value, .. } => vec![value.as_ref()],
            Node::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Node::Unary { operand, .. } => vec![operand.as_ref()],
            Node::Index { target, index } => vec![target.as_ref(), index.as_ref()],
            Node::If { cond, then_branch, else_branch } => {
                let mut out = vec![cond.as_ref()];
                out.extend(then_branch);
                if let Some(branch) = else_branch {
                    out.extend(branch);
                }
                out
            }
            Node::While { cond, body } => {
                let mut out = vec![cond.as_ref()];
                out.extend(body);
                out
            }
            Node::For { init, cond, step, body } => {
                let mut out = vec![init.as_ref(), cond.as_ref(), step.as_ref()];
                out.extend(body);
                out
            }
            Node::Return(value) => value.iter().map(|v| v.as_ref()).collect(),
            Node::FnDecl(decl) => decl.body.iter().collect(),
            Node::Call { args, .. } | Node::Construct { args, .. } => args.iter().collect(),
            Node::Lambda(def) => def.body.iter().collect(),
            Node::Apply { callee, args } => {
                let mut out = vec![callee.as_ref()];
                out.extend(args);
                out
            }
            Node::TryCatch { body, handlers, finally } => {
                let mut out: Vec<&Node> = body.iter().collect();
                for handler in handlers {
                    out.extend(&handler.body);
                }
                if let Some(finally) = finally {
                    out.extend(finally);
                }
                out
            }
            Node::Throw(value) => vec![value.as_ref()],
            Node::Convert { value, .. } => vec![value.as_ref()],
        }
    }

    /// Short node label for diagnostics and traces.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Int(_) => "integer literal",
            Node::Float(_) => "float literal",
            Node::Str(_) => "string literal",
            Node::Bool(_) => "boolean literal",
            Node::ArrayLit(_) => "array literal",
            Node::Var(_) => "variable",
            Node::VarDecl { .. } => "declaration",
            Node::Assign { .. } => "assignment",
            Node::Nonlocal(_) => "nonlocal",
            Node::Global(_) => "global",
            Node::Binary { .. } => "binary expression",
            Node::Unary { .. } => "unary expression",
            Node::Index { .. } => "index",
            Node::Block(_) => "block",
            Node::If { .. } => "if",
            Node::While { .. } => "while",
            Node::For { .. } => "for",
            Node::Break => "break",
            Node::Continue => "continue",
            Node::Return(_) => "return",
            Node::FnDecl(_) => "function declaration",
            Node::Call { .. } => "call",
            Node::Lambda(_) => "lambda",
            Node::Apply { .. } => "apply",
            Node::TryCatch { .. } => "try",
            Node::Throw(_) => "throw",
            Node::Construct { .. } => "constructor",
            Node::Convert { .. } => "conversion",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_children_empty() {
        assert!(Node::int(1).children().is_empty());
        assert!(Node::Break.children().is_empty());
        assert!(Node::Global(vec!["x".into()]).children().is_empty());
    }

    #[test]
    fn test_if_children_order() {
        let node = Node::if_else(
            Node::Bool(true),
            vec![Node::int(1)],
            Some(vec![Node::int(2)]),
        );
        let children = node.children();
        assert_eq!(children, vec![&Node::Bool(true), &Node::int(1), &Node::int(2)]);
    }

    #[test]
    fn test_try_children_include_handlers_and_finally() {
        let node = Node::TryCatch {
            body: vec![Node::int(1)],
            handlers: vec![CatchClause {
                exception: "ValueError".into(),
                binding: "e".into(),
                body: vec![Node::int(2)],
            }],
            finally: Some(vec![Node::int(3)]),
        };
        assert_eq!(node.children().len(), 3);
    }

    #[test]
    fn test_decl_without_value_has_no_children() {
        let node = Node::typed_decl("x", TypeExpr::named("Integer"), None);
        assert!(node.children().is_empty());
    }

    #[test]
    fn test_kind_name() {
        assert_eq!(Node::call("f", vec![]).kind_name(), "call");
        assert_eq!(Node::Return(None).kind_name(), "return");
    }
}
