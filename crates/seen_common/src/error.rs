//! Top-level error types for the language toolchain.

use crate::Diagnostic;
use thiserror::Error;

/// Fatal problems raised while an interpretation is in progress. Unlike
/// `Diagnostic`s these abort immediately — there is no recovery once the
/// interpreter has started mutating the heap or register stack.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("modulo by zero")]
    ModuloByZero,
    #[error("array index {index} out of range (length {length})")]
    ArrayIndexOutOfRange { index: u64, length: usize },
    #[error("struct has no field '{field}'")]
    StructFieldMissing { field: String },
    #[error("invalid call target (block {label})")]
    InvalidCallTarget { label: usize },
    #[error("invalid array handle {id}")]
    InvalidArrayHandle { id: u64 },
    #[error("invalid struct handle {id}")]
    InvalidStructHandle { id: u64 },
    #[error("invalid pointer handle {id}")]
    InvalidPointerHandle { id: u64 },
    #[error("no function named '{name}'")]
    UndefinedFunction { name: String },
    #[error("program did not terminate with a return value")]
    NoReturnValue,
}

/// The outermost error a CLI invocation can observe: the pipeline stopped
/// before producing a value, either because an earlier phase collected
/// diagnostics or because the interpreter trapped.
#[derive(Error, Debug, Clone)]
pub enum SeenError {
    #[error("{0}")]
    Diagnostics(#[from] crate::Diagnostics),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("I/O error: {0}")]
    Io(String),
}

impl SeenError {
    pub fn diagnostics(diagnostics: impl IntoIterator<Item = Diagnostic>) -> Self {
        let mut collected = crate::Diagnostics::new();
        for d in diagnostics {
            collected.push(d.kind, d.span);
        }
        Self::Diagnostics(collected)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }
}

/// Result type alias for toolchain operations.
pub type SeenResult<T> = Result<T, SeenError>;
