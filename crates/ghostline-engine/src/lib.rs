//! Ghostline engine - from edit event to suggestion
//!
//! The engine wires the pipeline stages together:
//!
//! 1. **Gate**: debounce rapid edits and prefilter editor state.
//! 2. **Cache lookup**: serve a previous completion when the fingerprint
//!    matches.
//! 3. **Context assembly**: concurrent fan-out to the configured sources
//!    (`ghostline-context`).
//! 4. **Stream coordination**: at most one outbound model stream per
//!    fingerprint and one live session per editor session, with cooperative
//!    cancellation throughout.
//! 5. **Postprocessing**: validate and clean the raw text against the live
//!    document before surfacing it.
//!
//! Only two outcomes ever reach the caller: a [`ghostline_core::Suggestion`]
//! or nothing. Every internal failure kind is absorbed, logged, and reported
//! on the telemetry sink.

pub mod coordinator;
pub mod error;
pub mod gate;
pub mod pipeline;
pub mod postprocess;
pub mod prompt;
pub mod provider;
pub mod session;

pub use coordinator::StreamCoordinator;
pub use error::EngineError;
pub use gate::{Gate, GateDecision, PrefilterRule};
pub use pipeline::{CompletionPipeline, DocumentReader};
pub use postprocess::Postprocessor;
pub use prompt::CompletionPrompt;
pub use provider::{DeltaStream, ModelProvider, ProviderRegistry, StreamDelta, StreamOptions};
pub use session::{SessionSlot, SessionState, StreamSession};
