//! CLI support for bindexpr
//!
//! Provides programmatic access to the `bindexpr` commands so other tools
//! can evaluate and inspect binding expressions without spawning a process.

mod convert;
mod eval;
mod inspect;

pub use convert::json_to_value;
pub use eval::{EvalOptions, execute_eval};
pub use inspect::{describe_bindings, execute_tokens};

use std::io;

use crate::BindingError;

/// Errors that can occur during CLI operations
#[derive(Debug)]
pub enum CliError {
    /// Tokenizing, parsing, compiling or evaluating failed
    Binding(BindingError),
    /// JSON parsing error
    Json(serde_json::Error),
    /// IO error
    Io(io::Error),
    /// No input provided
    NoInput,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Binding(e) => write!(f, "Error: {}", e),
            CliError::Json(e) => write!(f, "Invalid JSON: {}", e),
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::NoInput => write!(f, "No input provided. Use --input or pipe JSON to stdin."),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Binding(e) => Some(e),
            CliError::Json(e) => Some(e),
            CliError::Io(e) => Some(e),
            CliError::NoInput => None,
        }
    }
}

impl From<BindingError> for CliError {
    fn from(e: BindingError) -> Self {
        CliError::Binding(e)
    }
}

impl From<crate::error::LexicalError> for CliError {
    fn from(e: crate::error::LexicalError) -> Self {
        CliError::Binding(e.into())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}
