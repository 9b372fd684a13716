//! Error types for context sources

use thiserror::Error;

/// Errors a context source can produce; always non-fatal to the attempt
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// The source did not answer within its timeout
    #[error("context source timed out")]
    Timeout,

    /// The source failed outright
    #[error("context source failed: {0}")]
    Source(String),
}

pub type Result<T> = std::result::Result<T, ContextError>;
