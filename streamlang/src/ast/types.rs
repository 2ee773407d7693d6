//! Type annotations as written in source

use serde::{Deserialize, Serialize};

/// Type expression: a registry name with optional parameters.
///
/// `Array<Integer>` is `TypeExpr { name: "Array", args: [Integer] }`. For
/// `Function` the last argument is the return type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeExpr {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<TypeExpr>,
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        TypeExpr { name: name.into(), args: Vec::new() }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeExpr>) -> Self {
        TypeExpr { name: name.into(), args }
    }
}

impl std::fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            let args: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
            write!(f, "<{}>", args.join(", "))?;
        }
        Ok(())
    }
}
