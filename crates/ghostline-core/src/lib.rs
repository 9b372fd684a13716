//! Ghostline core - shared data model for the inline completion pipeline
//!
//! This crate holds the types that flow between the pipeline stages:
//! edit events and completion requests, context snippets, the outbound
//! suggestion, engine configuration, telemetry events, and the token
//! estimation heuristic used to enforce context budgets.
//!
//! Nothing in here performs I/O. The pipeline stages themselves live in
//! `ghostline-context`, `ghostline-cache`, and `ghostline-engine`.

pub mod config;
pub mod telemetry;
pub mod tokens;
pub mod types;

pub use config::EngineConfig;
pub use telemetry::{MemorySink, TelemetryEvent, TelemetrySink, TracingSink};
pub use tokens::TokenEstimator;
pub use types::{
    CompletionRequest, ContextSnippet, DocumentState, EditEvent, EditKind, EditorStateHint,
    ReplaceRange, SourceKind, Suggestion, SyntaxRegion, TriggerReason,
};
