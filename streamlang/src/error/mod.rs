//! Error types and reporting

use thiserror::Error;

use crate::interp::RuntimeError;
use crate::types::ExceptionValue;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the driver
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The AST document could not be decoded
    #[error("malformed program document: {0}")]
    Document(#[from] serde_json::Error),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// A user exception reached the program root
    #[error("Uncaught exception: {0}")]
    Uncaught(ExceptionValue),
}

impl Error {
    pub fn message(&self) -> String {
        match self {
            Self::Runtime(err) => err.message.clone(),
            other => other.to_string(),
        }
    }

    /// Call-stack trace for runtime faults raised inside a call
    pub fn trace(&self) -> &[String] {
        match self {
            Self::Runtime(err) => &err.trace,
            _ => &[],
        }
    }
}

/// Render an error for the terminal, innermost frame last.
pub fn render_error(error: &Error) -> String {
    let mut out = format!("error: {error}");
    let trace = error.trace();
    if !trace.is_empty() {
        out.push_str("\ncall stack:");
        for frame in trace {
            out.push_str("\n  at ");
            out.push_str(frame);
        }
    }
    out
}
