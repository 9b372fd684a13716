//! Ghostline context - candidate snippet sources and the budgeted assembler
//!
//! Context for a completion request is gathered from several sources
//! concurrently (recent edits, open files, diff, external retrieval,
//! clipboard), each with an independent timeout. A source that errors or
//! times out contributes nothing; the attempt degrades gracefully.
//! Selection is greedy under a token budget with a fully deterministic
//! tie-break, which keeps fingerprints and prompts reproducible.

pub mod assembler;
pub mod error;
pub mod score;
pub mod source;
pub mod sources;

pub use assembler::ContextAssembler;
pub use error::{ContextError, Result};
pub use source::ContextSource;
pub use sources::{
    ClipboardSource, DiffSource, OpenFilesSource, RecentEditsSource, RetrievalClient,
    RetrievalSource, RetrievedChunk,
};
