//! Budgeted context assembly
//!
//! All configured sources are queried concurrently, each under its own
//! timeout and the caller's cancellation token. Whatever arrived in time is
//! merged, sorted with a fully deterministic tie-break, and selected
//! greedily under the token budget. Identical inputs always yield the same
//! ordered snippet list, which keeps fingerprints and prompts reproducible.

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use ghostline_core::{CompletionRequest, ContextSnippet, EngineConfig, TokenEstimator};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::source::ContextSource;

/// Gathers and selects context snippets for one request
pub struct ContextAssembler {
    sources: Vec<Arc<dyn ContextSource>>,
    token_budget: usize,
    per_source_timeout: Duration,
    estimator: Arc<TokenEstimator>,
}

impl ContextAssembler {
    pub fn new(config: &EngineConfig, estimator: Arc<TokenEstimator>) -> Self {
        Self {
            sources: Vec::new(),
            token_budget: config.token_budget,
            per_source_timeout: Duration::from_millis(config.per_source_timeout_ms),
            estimator,
        }
    }

    /// Add a source to query; assembly order does not depend on call order
    pub fn with_source(mut self, source: Arc<dyn ContextSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Assemble the ordered snippet list for `request`
    ///
    /// Suspends until every source has finished or timed out, whichever
    /// comes first per source. Cancelling the token stops all outstanding
    /// source queries; whatever has not arrived contributes nothing.
    pub async fn assemble(
        &self,
        request: &CompletionRequest,
        cancel: CancellationToken,
    ) -> Vec<ContextSnippet> {
        let queries = self.sources.iter().map(|source| {
            let source = source.clone();
            let cancel = cancel.clone();
            let request = request.clone();
            let timeout = self.per_source_timeout;
            async move {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(source = source.kind().as_str(), "context query cancelled");
                        Vec::new()
                    }
                    result = tokio::time::timeout(timeout, source.collect(&request)) => {
                        match result {
                            Ok(Ok(snippets)) => snippets,
                            Ok(Err(error)) => {
                                warn!(
                                    source = source.kind().as_str(),
                                    %error,
                                    "context source failed"
                                );
                                Vec::new()
                            }
                            Err(_) => {
                                warn!(
                                    source = source.kind().as_str(),
                                    timeout_ms = timeout.as_millis() as u64,
                                    "context source timed out"
                                );
                                Vec::new()
                            }
                        }
                    }
                }
            }
        });

        let candidates: Vec<ContextSnippet> =
            join_all(queries).await.into_iter().flatten().collect();
        self.select_within_budget(candidates)
    }

    /// Greedy selection under the token budget
    ///
    /// Sorted by `(score desc, source priority asc, recency desc)`. The
    /// first snippet that would overflow the budget is dropped whole to
    /// preserve snippet integrity, unless nothing has been accepted yet, in
    /// which case it is truncated to fit.
    fn select_within_budget(&self, mut candidates: Vec<ContextSnippet>) -> Vec<ContextSnippet> {
        candidates.sort_by(|a, b| {
            b.relevance_score
                .total_cmp(&a.relevance_score)
                .then_with(|| a.source.priority().cmp(&b.source.priority()))
                .then_with(|| b.recency.cmp(&a.recency))
        });

        let mut selected = Vec::new();
        let mut used = 0usize;
        for snippet in candidates {
            if used + snippet.token_count > self.token_budget {
                if selected.is_empty() {
                    if let Some(truncated) = self.truncate_to_budget(snippet) {
                        selected.push(truncated);
                    }
                }
                break;
            }
            used += snippet.token_count;
            selected.push(snippet);
        }
        selected
    }

    fn truncate_to_budget(&self, mut snippet: ContextSnippet) -> Option<ContextSnippet> {
        if self.token_budget == 0 {
            return None;
        }
        // ~4 bytes per token, backed off to a char boundary
        let mut end = (self.token_budget * 4).min(snippet.content.len());
        while !snippet.content.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            return None;
        }
        snippet.content.truncate(end);
        snippet.token_count = self.estimator.count(&snippet.content);
        Some(snippet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use ghostline_core::{SourceKind, TriggerReason};

    use crate::error::{ContextError, Result};

    struct FixedSource {
        kind: SourceKind,
        snippets: Vec<ContextSnippet>,
    }

    #[async_trait]
    impl ContextSource for FixedSource {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        async fn collect(&self, _request: &CompletionRequest) -> Result<Vec<ContextSnippet>> {
            Ok(self.snippets.clone())
        }
    }

    struct SlowSource {
        delay: Duration,
    }

    #[async_trait]
    impl ContextSource for SlowSource {
        fn kind(&self) -> SourceKind {
            SourceKind::Retrieval
        }

        async fn collect(&self, _request: &CompletionRequest) -> Result<Vec<ContextSnippet>> {
            tokio::time::sleep(self.delay).await;
            Ok(vec![snippet(SourceKind::Retrieval, "too late", 1.0, 4)])
        }
    }

    struct FailingSource;

    #[async_trait]
    impl ContextSource for FailingSource {
        fn kind(&self) -> SourceKind {
            SourceKind::Diff
        }

        async fn collect(&self, _request: &CompletionRequest) -> Result<Vec<ContextSnippet>> {
            Err(ContextError::Source("broken".to_string()))
        }
    }

    fn snippet(kind: SourceKind, content: &str, score: f64, tokens: usize) -> ContextSnippet {
        ContextSnippet::new(
            kind,
            content,
            score,
            tokens,
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            document_uri: "file:///main.rs".to_string(),
            cursor_offset: 8,
            prefix_text: "let x = ".to_string(),
            suffix_text: String::new(),
            trigger: TriggerReason::Automatic,
            created_at: Utc::now(),
        }
    }

    fn config(budget: usize, timeout_ms: u64) -> EngineConfig {
        EngineConfig {
            token_budget: budget,
            per_source_timeout_ms: timeout_ms,
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn snippets_are_ordered_by_score_then_priority_then_recency() {
        let older = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();

        let assembler = ContextAssembler::new(&config(100, 100), Arc::new(TokenEstimator::new()))
            .with_source(Arc::new(FixedSource {
                kind: SourceKind::Retrieval,
                snippets: vec![
                    ContextSnippet::new(SourceKind::Retrieval, "high", 0.9, 2, older),
                    ContextSnippet::new(SourceKind::Retrieval, "tie-old", 0.5, 2, older),
                ],
            }))
            .with_source(Arc::new(FixedSource {
                kind: SourceKind::OpenFile,
                snippets: vec![
                    ContextSnippet::new(SourceKind::OpenFile, "tie-priority", 0.5, 2, older),
                    ContextSnippet::new(SourceKind::OpenFile, "tie-new", 0.5, 2, newer),
                ],
            }));

        let selected = assembler.assemble(&request(), CancellationToken::new()).await;
        let contents: Vec<&str> = selected.iter().map(|s| s.content.as_str()).collect();
        // OpenFile outranks Retrieval on ties; newer outranks older within a source
        assert_eq!(contents, vec!["high", "tie-new", "tie-priority", "tie-old"]);
    }

    #[tokio::test]
    async fn overflowing_snippet_is_dropped_whole() {
        let assembler = ContextAssembler::new(&config(10, 100), Arc::new(TokenEstimator::new()))
            .with_source(Arc::new(FixedSource {
                kind: SourceKind::OpenFile,
                snippets: vec![
                    snippet(SourceKind::OpenFile, "first", 0.9, 6),
                    snippet(SourceKind::OpenFile, "second", 0.8, 8),
                ],
            }));

        let selected = assembler.assemble(&request(), CancellationToken::new()).await;
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].content, "first");
    }

    #[tokio::test]
    async fn sole_oversized_snippet_is_truncated_to_fit() {
        let big = "fn oversized() { /* lots of content here */ }".repeat(20);
        let assembler = ContextAssembler::new(&config(8, 100), Arc::new(TokenEstimator::new()))
            .with_source(Arc::new(FixedSource {
                kind: SourceKind::OpenFile,
                snippets: vec![snippet(SourceKind::OpenFile, &big, 0.9, 500)],
            }));

        let selected = assembler.assemble(&request(), CancellationToken::new()).await;
        assert_eq!(selected.len(), 1);
        assert!(selected[0].token_count <= 8);
        assert!(big.starts_with(&selected[0].content));
    }

    #[tokio::test]
    async fn timed_out_source_contributes_nothing() {
        let assembler = ContextAssembler::new(&config(100, 20), Arc::new(TokenEstimator::new()))
            .with_source(Arc::new(SlowSource {
                delay: Duration::from_millis(500),
            }))
            .with_source(Arc::new(FixedSource {
                kind: SourceKind::OpenFile,
                snippets: vec![snippet(SourceKind::OpenFile, "on time", 0.5, 2)],
            }));

        let selected = assembler.assemble(&request(), CancellationToken::new()).await;
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].content, "on time");
    }

    #[tokio::test]
    async fn failing_source_contributes_nothing() {
        let assembler = ContextAssembler::new(&config(100, 100), Arc::new(TokenEstimator::new()))
            .with_source(Arc::new(FailingSource))
            .with_source(Arc::new(FixedSource {
                kind: SourceKind::OpenFile,
                snippets: vec![snippet(SourceKind::OpenFile, "healthy", 0.5, 2)],
            }));

        let selected = assembler.assemble(&request(), CancellationToken::new()).await;
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].content, "healthy");
    }

    #[tokio::test]
    async fn cancellation_stops_outstanding_queries() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let assembler = ContextAssembler::new(&config(100, 5_000), Arc::new(TokenEstimator::new()))
            .with_source(Arc::new(SlowSource {
                delay: Duration::from_secs(60),
            }));

        // Returns promptly despite the source's long delay
        let selected = assembler.assemble(&request(), cancel).await;
        assert!(selected.is_empty());
    }

    #[tokio::test]
    async fn identical_inputs_yield_identical_output() {
        let assembler = ContextAssembler::new(&config(100, 100), Arc::new(TokenEstimator::new()))
            .with_source(Arc::new(FixedSource {
                kind: SourceKind::OpenFile,
                snippets: vec![
                    snippet(SourceKind::OpenFile, "a", 0.5, 2),
                    snippet(SourceKind::OpenFile, "b", 0.7, 2),
                    snippet(SourceKind::OpenFile, "c", 0.6, 2),
                ],
            }));

        let first = assembler.assemble(&request(), CancellationToken::new()).await;
        let second = assembler.assemble(&request(), CancellationToken::new()).await;
        let first_contents: Vec<_> = first.iter().map(|s| s.content.clone()).collect();
        let second_contents: Vec<_> = second.iter().map(|s| s.content.clone()).collect();
        assert_eq!(first_contents, second_contents);
    }
}
