//! Termination heuristic for self-recursive functions
//!
//! Best effort. A `return` guarded by a condition that never holds still
//! counts as a termination path, and a function that only ends by raising
//! from inside a callee is reported as non-terminating.

use crate::ast::{FnDecl, Node};

/// Does `decl` call itself anywhere in its own body?
pub fn is_self_recursive(decl: &FnDecl) -> bool {
    decl.body.iter().any(|node| calls(node, &decl.name))
}

fn calls(node: &Node, name: &str) -> bool {
    match node {
        Node::Call { func, .. } if func == name => true,
        // nested declarations and lambdas run in their own frames
        Node::FnDecl(_) | Node::Lambda(_) => false,
        other => other.children().into_iter().any(|child| calls(child, name)),
    }
}

/// Is there a path through the body that leaves the function other than by
/// calling itself again?
pub fn has_termination_path(decl: &FnDecl) -> bool {
    any_terminates(&decl.body, &decl.name)
}

fn any_terminates(nodes: &[Node], name: &str) -> bool {
    nodes.iter().any(|node| terminates(node, name))
}

fn terminates(node: &Node, name: &str) -> bool {
    match node {
        Node::Return(_) | Node::Throw(_) => true,
        Node::If { then_branch, else_branch, .. } => {
            any_terminates(then_branch, name)
                || else_branch.as_deref().is_some_and(|branch| any_terminates(branch, name))
        }
        Node::Call { func, .. } if func == name => false,
        Node::FnDecl(_) | Node::Lambda(_) => false,
        other => other.children().into_iter().any(|child| terminates(child, name)),
    }
}
