//! Recently edited code as context
//!
//! Keeps a bounded ring of edit snapshots. Newer snapshots score higher;
//! identifier overlap with the text near the cursor adds to the score.

use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ghostline_core::{CompletionRequest, ContextSnippet, SourceKind, TokenEstimator};
use tokio::sync::RwLock;

use crate::{
    error::Result,
    score::{identifier_overlap, query_window},
    source::ContextSource,
};

#[derive(Debug, Clone)]
struct RecordedEdit {
    document_uri: String,
    content: String,
    recorded_at: DateTime<Utc>,
}

/// Ring buffer of recent edit snapshots
pub struct RecentEditsSource {
    edits: RwLock<VecDeque<RecordedEdit>>,
    capacity: usize,
    estimator: Arc<TokenEstimator>,
}

impl RecentEditsSource {
    pub fn new(capacity: usize, estimator: Arc<TokenEstimator>) -> Self {
        Self {
            edits: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
            estimator,
        }
    }

    /// Record an edit snapshot; the oldest snapshot falls off at capacity
    pub async fn record(&self, document_uri: impl Into<String>, content: impl Into<String>) {
        let content = content.into();
        if content.trim().is_empty() {
            return;
        }
        let mut edits = self.edits.write().await;
        edits.push_back(RecordedEdit {
            document_uri: document_uri.into(),
            content,
            recorded_at: Utc::now(),
        });
        while edits.len() > self.capacity {
            edits.pop_front();
        }
    }

    pub async fn len(&self) -> usize {
        self.edits.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.edits.read().await.is_empty()
    }
}

#[async_trait]
impl ContextSource for RecentEditsSource {
    fn kind(&self) -> SourceKind {
        SourceKind::RecentEdit
    }

    async fn collect(&self, request: &CompletionRequest) -> Result<Vec<ContextSnippet>> {
        let query = query_window(&request.prefix_text);
        let edits = self.edits.read().await;
        let total = edits.len().max(1);

        let snippets = edits
            .iter()
            .enumerate()
            .filter(|(_, edit)| {
                // A snapshot of this document already visible in the prefix
                // adds nothing to the prompt
                edit.document_uri != request.document_uri
                    || !request.prefix_text.contains(edit.content.as_str())
            })
            .map(|(index, edit)| {
                let freshness = (index + 1) as f64 / total as f64;
                let overlap = identifier_overlap(query, &edit.content);
                ContextSnippet::new(
                    SourceKind::RecentEdit,
                    edit.content.clone(),
                    0.5 * overlap + 0.5 * freshness,
                    self.estimator.count(&edit.content),
                    edit.recorded_at,
                )
            })
            .filter(|snippet| snippet.relevance_score > 0.0)
            .collect();

        Ok(snippets)
    }
}
