//! Working-tree diff as context
//!
//! An externally supplied unified diff is split per hunk. Hunks describe
//! what the user is in the middle of changing, so they carry a relevance
//! floor on top of identifier overlap.

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

/// Base relevance of any hunk, before overlap
const HUNK_BASE_SCORE: f64 = 0.4;

#[derive(Debug, Clone)]
struct DiffSnapshot {
    text: String,
    taken_at: DateTime<Utc>,
}

/// Holds the latest unified diff supplied by the caller
pub struct DiffSource {
    snapshot: RwLock<Option<DiffSnapshot>>,
    estimator: Arc<TokenEstimator>,
}

impl DiffSource {
    pub fn new(estimator: Arc<TokenEstimator>) -> Self {
        Self {
            snapshot: RwLock::new(None),
            estimator,
        }
    }

    /// Replace the current diff snapshot
    pub async fn set_diff(&self, unified_diff: impl Into<String>) {
        let mut snapshot = self.snapshot.write().await;
        *snapshot = Some(DiffSnapshot {
            text: unified_diff.into(),
            taken_at: Utc::now(),
        });
    }

    pub async fn clear(&self) {
        let mut snapshot = self.snapshot.write().await;
        *snapshot = None;
    }
}

/// Split a unified diff into hunk bodies
fn hunks(diff: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    for line in diff.lines() {
        if line.starts_with("@@") {
            if !current.trim().is_empty() {
                result.push(std::mem::take(&mut current));
            }
            continue;
        }
        if line.starts_with("diff ") || line.starts_with("index ") {
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        result.push(current);
    }
    result
}

#[async_trait]
impl ContextSource for DiffSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Diff
    }

    async fn collect(&self, request: &CompletionRequest) -> Result<Vec<ContextSnippet>> {
        let snapshot = self.snapshot.read().await;
        let Some(snapshot) = snapshot.as_ref() else {
            return Ok(Vec::new());
        };

        let query = query_window(&request.prefix_text);
        let snippets = hunks(&snapshot.text)
            .into_iter()
            .map(|hunk| {
                let overlap = identifier_overlap(query, &hunk);
                let token_count = self.estimator.count(&hunk);
                ContextSnippet::new(
                    SourceKind::Diff,
                    hunk,
                    HUNK_BASE_SCORE + (1.0 - HUNK_BASE_SCORE) * overlap,
                    token_count,
                    snapshot.taken_at,
                )
            })
            .collect();
        Ok(snippets)
    }
}
