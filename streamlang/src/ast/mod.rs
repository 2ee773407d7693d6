//! Abstract Syntax Tree definitions
//!
//! Nodes are plain data. Evaluation lives in `interp::eval`, the static pass
//! in `interp::typeck`; both are implemented as inherent methods on [`Node`]
//! and [`Program`].

mod node;
mod ops;
mod types;

pub use node::*;
pub use ops::*;
pub use types::*;

use serde::{Deserialize, Serialize};

/// A program is the top-level statement sequence
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    pub body: Vec<Node>,
}

impl Program {
    pub fn new(body: Vec<Node>) -> Self {
        Program { body }
    }

    /// Load a program from its serialized JSON form.
    pub fn from_json(source: &str) -> serde_json::Result<Self> {
        serde_json::from_str(source)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn children(&self) -> Vec<&Node> {
        self.body.iter().collect()
    }
}
