//! Open editor documents as context
//!
//! Open files are chunked on blank lines and chunks are scored by
//! identifier overlap with the text near the cursor. The document being
//! completed is excluded; its prefix/suffix already carry that context.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ghostline_core::{CompletionRequest, ContextSnippet, SourceKind, TokenEstimator};
use tokio::sync::RwLock;

use crate::{
    error::Result,
    score::{identifier_overlap, query_window},
    source::ContextSource,
};

/// Upper bound on a single chunk, in bytes
const MAX_CHUNK_BYTES: usize = 2000;

#[derive(Debug, Clone)]
struct OpenDocument {
    content: String,
    opened_at: DateTime<Utc>,
}

/// Registry of documents currently open in the editor
pub struct OpenFilesSource {
    documents: RwLock<HashMap<String, OpenDocument>>,
    estimator: Arc<TokenEstimator>,
}

impl OpenFilesSource {
    pub fn new(estimator: Arc<TokenEstimator>) -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            estimator,
        }
    }

    /// Register or refresh an open document
    pub async fn open(&self, document_uri: impl Into<String>, content: impl Into<String>) {
        let mut documents = self.documents.write().await;
        documents.insert(
            document_uri.into(),
            OpenDocument {
                content: content.into(),
                opened_at: Utc::now(),
            },
        );
    }

    /// Forget a closed document
    pub async fn close(&self, document_uri: &str) {
        let mut documents = self.documents.write().await;
        documents.remove(document_uri);
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }
}

/// Split on blank lines, capping chunk size
fn chunk(content: &str) -> Vec<&str> {
    content
        .split("\n\n")
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| {
            if chunk.len() <= MAX_CHUNK_BYTES {
                return chunk;
            }
            let mut end = MAX_CHUNK_BYTES;
            while !chunk.is_char_boundary(end) {
                end -= 1;
            }
            &chunk[..end]
        })
        .collect()
}

#[async_trait]
impl ContextSource for OpenFilesSource {
    fn kind(&self) -> SourceKind {
        SourceKind::OpenFile
    }

    async fn collect(&self, request: &CompletionRequest) -> Result<Vec<ContextSnippet>> {
        let query = query_window(&request.prefix_text);
        let documents = self.documents.read().await;

        let mut snippets = Vec::new();
        for (uri, document) in documents.iter() {
            if uri == &request.document_uri {
                continue;
            }
            for piece in chunk(&document.content) {
                let score = identifier_overlap(query, piece);
                if score > 0.0 {
                    snippets.push(ContextSnippet::new(
                        SourceKind::OpenFile,
                        piece,
                        score,
                        self.estimator.count(piece),
                        document.opened_at,
                    ));
                }
            }
        }
        Ok(snippets)
    }
}
