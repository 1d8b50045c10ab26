use thiserror::Error;

/// The main error type for the docscope core library.
/// Compilation errors are raised lazily, when a scope is executed, never while chaining.
#[derive(Debug, Error)]
pub enum Error {
    // Compilation errors
    #[error("Invalid order spec: {0}")]
    InvalidOrderSpec(String),

    #[error("Invalid operator: {0}")]
    InvalidOperator(String),

    // Collaborator errors, passed through unchanged
    #[error(transparent)]
    Storage(anyhow::Error),

    #[error("Model error: {0}")]
    Model(anyhow::Error),
}

impl Error {
    /// Returns true if the error was raised while compiling finder options
    pub fn is_compile_error(&self) -> bool {
        matches!(self, Error::InvalidOrderSpec(_) | Error::InvalidOperator(_))
    }

    /// Returns true if the error came from the storage collaborator
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
