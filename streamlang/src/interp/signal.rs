//! Control-flow signals

use crate::types::{ExceptionValue, Value};

/// Outcome of evaluating a node.
///
/// Statement sequences stop at the first signal that is not `Normal` and
/// hand it to their parent unchanged. Only loops, calls and try/catch
/// consume signals.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Completed; carries the value of an expression, if any
    Normal(Option<Value>),
    Return(Value),
    Break,
    Continue,
    /// A user-level exception in flight
    Raised(ExceptionValue),
}

impl Signal {
    pub fn unit() -> Self {
        Signal::Normal(None)
    }

    pub fn value(value: Value) -> Self {
        Signal::Normal(Some(value))
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, Signal::Normal(_))
    }

    /// Value carried by a `Normal` completion, `Void` if it carried none.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Signal::Normal(value) => Some(value.unwrap_or(Value::Void)),
            _ => None,
        }
    }
}
