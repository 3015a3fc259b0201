//! Error types for the program and value model.

use thiserror::Error;

/// Errors raised while parsing or manipulating program values.
///
/// These are model-level faults. Failures while executing a finalize scope
/// are reported as [`ExecuteError`](crate::ExecuteError) instead, which
/// carries the failing transition and instruction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    /// An identifier, program id or locator is malformed.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// A type name is not a known literal type or a valid struct name.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// Text does not parse as a literal of the requested type.
    #[error("invalid {ty} literal: {text}")]
    InvalidLiteral { ty: String, text: String },

    /// A JSON value does not match the declared plaintext type.
    #[error("invalid plaintext: {0}")]
    InvalidPlaintext(String),

    /// Two operands have different types.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Integer overflow or underflow.
    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    /// Register, operand or command text is malformed.
    #[error("invalid syntax: {0}")]
    Syntax(String),

    /// A program definition failed to decode.
    #[error("invalid program definition: {0}")]
    Definition(String),
}
