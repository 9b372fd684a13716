//! Clipboard contents as context
//!
//! The editor integration pushes clipboard text here when it looks like
//! code; the source contributes at most one snippet per request.

use std::sync::Arc;

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
struct ClipboardEntry {
    text: String,
    copied_at: DateTime<Utc>,
}

/// Holds the most recent clipboard text supplied by the caller
pub struct ClipboardSource {
    entry: RwLock<Option<ClipboardEntry>>,
    estimator: Arc<TokenEstimator>,
}

impl ClipboardSource {
    pub fn new(estimator: Arc<TokenEstimator>) -> Self {
        Self {
            entry: RwLock::new(None),
            estimator,
        }
    }

    /// Replace the held clipboard text
    pub async fn set_contents(&self, text: impl Into<String>) {
        let text = text.into();
        let mut entry = self.entry.write().await;
        *entry = if text.trim().is_empty() {
            None
        } else {
            Some(ClipboardEntry {
                text,
                copied_at: Utc::now(),
            })
        };
    }
}

#[async_trait]
impl ContextSource for ClipboardSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Clipboard
    }

    async fn collect(&self, request: &CompletionRequest) -> Result<Vec<ContextSnippet>> {
        let entry = self.entry.read().await;
        let Some(entry) = entry.as_ref() else {
            return Ok(Vec::new());
        };

        let score = identifier_overlap(query_window(&request.prefix_text), &entry.text);
        if score == 0.0 {
            return Ok(Vec::new());
        }

        Ok(vec![ContextSnippet::new(
            SourceKind::Clipboard,
            entry.text.clone(),
            score,
            self.estimator.count(&entry.text),
            entry.copied_at,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prefix: &str) -> CompletionRequest {
        CompletionRequest {
            document_uri: "file:///main.rs".to_string(),
            cursor_offset: prefix.len(),
            prefix_text: prefix.to_string(),
            suffix_text: String::new(),
            trigger: ghostline_core::TriggerReason::Automatic,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn empty_clipboard_contributes_nothing() {
        let source = ClipboardSource::new(Arc::new(TokenEstimator::new()));
        let snippets = source.collect(&request("let x = ")).await.unwrap();
        assert!(snippets.is_empty());
    }

    #[tokio::test]
    async fn relevant_clipboard_contributes_one_snippet() {
        let source = ClipboardSource::new(Arc::new(TokenEstimator::new()));
        source.set_contents("fn helper() { compute() }").await;

        let snippets = source.collect(&request("helper(")).await.unwrap();
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].source, SourceKind::Clipboard);
    }

    #[tokio::test]
    async fn irrelevant_clipboard_is_filtered_out() {
        let source = ClipboardSource::new(Arc::new(TokenEstimator::new()));
        source.set_contents("completely unrelated prose").await;

        let snippets = source.collect(&request("helper(")).await.unwrap();
        assert!(snippets.is_empty());
    }
}
