// quill-vm - Runtime errors for the Quill VM
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Runtime (language) errors.
//!
//! Any of these unwinds the current `execute` call and surfaces to the
//! host; the owning context remains usable afterwards.

use quill_reader::{CodeHandle, PackageError};
use thiserror::Error;

/// Runtime error during VM execution.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("stack underflow")]
    StackUnderflow,
    #[error("program counter {pc} ran off the end of block {handle}")]
    RunawayProgram { handle: CodeHandle, pc: usize },
    #[error("value is not callable: {0}")]
    NotCallable(String),
    #[error("wrong number of arguments: expected {expected}, got {got}")]
    WrongArity { expected: String, got: usize },
    #[error("type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },
    #[error("no primitive '{name}' accepting {argc} arguments")]
    PrimitiveNotFound { name: String, argc: usize },
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow in '{0}'")]
    IntegerOverflow(&'static str),
    #[error("index {index} out of bounds for length {length}")]
    IndexOutOfBounds { index: i64, length: usize },
    #[error("invalid code handle {0}")]
    InvalidHandle(CodeHandle),
    #[error("local variable ({depth}, {slot}) is out of range")]
    InvalidVarPos { depth: usize, slot: usize },
    #[error(transparent)]
    Package(#[from] PackageError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Convenience constructor for type errors.
    pub fn type_error(expected: impl Into<String>, got: impl Into<String>) -> Self {
        RuntimeError::TypeError {
            expected: expected.into(),
            got: got.into(),
        }
    }
}

/// Result type for VM operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
