//! Profile errors

use thiserror::Error;

/// Errors that can occur while describing profile sites
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    /// Operand text is not `argN`, `locN` or `tmpN`
    #[error("Invalid operand: {0:?}")]
    InvalidOperand(String),

    /// Operand index does not fit in 32 bits
    #[error("Operand index out of range: {0:?}")]
    OperandIndexOutOfRange(String),
}

/// Result type for profile operations
pub type Result<T> = std::result::Result<T, ProfileError>;
