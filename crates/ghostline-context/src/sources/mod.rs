//! Built-in context sources

pub mod clipboard;
pub mod diff;
pub mod open_files;
pub mod recent_edits;
pub mod retrieval;

pub use clipboard::ClipboardSource;
pub use diff::DiffSource;
pub use open_files::OpenFilesSource;
pub use recent_edits::RecentEditsSource;
pub use retrieval::{RetrievalClient, RetrievalSource, RetrievedChunk};
