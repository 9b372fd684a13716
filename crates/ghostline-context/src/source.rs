//! Context source trait

use async_trait::async_trait;
use ghostline_core::{CompletionRequest, ContextSnippet, SourceKind};

use crate::error::Result;

/// A producer of candidate context snippets for one request
///
/// Sources are queried concurrently by the assembler, each under an
/// independent timeout. A failing or slow source degrades the attempt
/// gracefully; it never fails it.
#[async_trait]
pub trait ContextSource: Send + Sync {
    /// Which kind of snippets this source produces
    fn kind(&self) -> SourceKind;

    /// Collect candidate snippets for the request
    ///
    /// Each snippet carries a source-defined relevance score; the assembler
    /// handles cross-source ordering and the token budget.
    async fn collect(&self, request: &CompletionRequest) -> Result<Vec<ContextSnippet>>;
}
