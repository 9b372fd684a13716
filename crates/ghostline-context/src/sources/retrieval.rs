//! Codebase retrieval as context
//!
//! The persistent index and its embedding machinery live behind
//! [`RetrievalClient`]; this source only adapts its ranked results into
//! snippets. Slow or failing retrieval degrades the attempt, it never
//! fails it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use ghostline_core::{CompletionRequest, ContextSnippet, SourceKind, TokenEstimator};

use crate::{error::Result, score::query_window, source::ContextSource};

/// One ranked result from the retrieval collaborator
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub content: String,
    pub score: f64,
}

/// Query interface to the out-of-scope codebase index
#[async_trait]
pub trait RetrievalClient: Send + Sync {
    async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedChunk>>;
}

/// Adapter exposing the retrieval collaborator as a context source
pub struct RetrievalSource {
    client: Arc<dyn RetrievalClient>,
    k: usize,
    estimator: Arc<TokenEstimator>,
}

impl RetrievalSource {
    pub fn new(client: Arc<dyn RetrievalClient>, k: usize, estimator: Arc<TokenEstimator>) -> Self {
        Self {
            client,
            k,
            estimator,
        }
    }
}

#[async_trait]
impl ContextSource for RetrievalSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Retrieval
    }

    async fn collect(&self, request: &CompletionRequest) -> Result<Vec<ContextSnippet>> {
        let query = query_window(&request.prefix_text);
        let chunks = self.client.query(query, self.k).await?;
        let now = Utc::now();

        Ok(chunks
            .into_iter()
            .filter(|chunk| !chunk.content.trim().is_empty())
            .map(|chunk| {
                let token_count = self.estimator.count(&chunk.content);
                ContextSnippet::new(
                    SourceKind::Retrieval,
                    chunk.content,
                    chunk.score.clamp(0.0, 1.0),
                    token_count,
                    now,
                )
            })
            .collect())
    }
}
