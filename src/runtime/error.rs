use thiserror::Error;

/// Faults raised while executing dispatch routines.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("integer divide by zero")]
    DivideByZero,

    #[error("invalid memory address or nil pointer dereference")]
    BadPointer,

    #[error("panic: {0}")]
    Panic(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },

    /// The compiled program broke a contract of the dispatch model, such as a
    /// routine compiled as non-suspending asking to suspend.
    #[error("internal runtime error: {0}")]
    Internal(String),

    #[error("tick limit of {0} exceeded")]
    TickLimit(u64),
}

impl RuntimeError {
    pub fn internal(message: impl Into<String>) -> Self {
        RuntimeError::Internal(message.into())
    }
}
