//! Error types for querymap

use thiserror::Error;

/// Result type alias for querymap operations
pub type DbResult<T> = Result<T, DbError>;

/// Error types for query compilation and execution
#[derive(Debug, Error)]
pub enum DbError {
    /// Invalid connection options (unsupported dialect, malformed prefix)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed table or column name
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Malformed condition or column specification
    #[error("Compile error: {0}")]
    Compile(String),

    /// Statement rejected by the backend during prepare or execute
    #[error("Execution failure: {0}")]
    Execution(String),

    /// Transaction could not begin, commit, or roll back
    #[error("Transaction failure: {0}")]
    Transaction(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },
}

impl DbError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid-identifier error
    pub fn ident(name: impl Into<String>) -> Self {
        Self::InvalidIdentifier(name.into())
    }

    /// Create a compile error
    pub fn compile(message: impl Into<String>) -> Self {
        Self::Compile(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Check if this is an execution failure
    pub fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Check if this is a compile error
    pub fn is_compile(&self) -> bool {
        matches!(self, Self::Compile(_))
    }
}
