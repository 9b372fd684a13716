//! Engine error types
//!
//! Expected control-path outcomes (gate rejection, cache miss, dedup
//! attach, postprocess rejection) are not errors and are modelled as enum
//! results or `Option` instead. Nothing here ever crosses the pipeline
//! boundary; `CompletionPipeline` absorbs and logs all of it.

use thiserror::Error;

/// Failures inside the streaming half of the pipeline
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Transport or provider failure mid-stream; the session is failed and
    /// any partial text discarded
    #[error("stream failure: {0}")]
    StreamFailure(String),

    /// The session was cancelled; silently dropped, never user-visible
    #[error("cancelled")]
    Cancelled,

    /// No provider registered under the requested identifier
    #[error("provider not found: {0}")]
    ProviderNotFound(String),
}
