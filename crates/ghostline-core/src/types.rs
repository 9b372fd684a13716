//! Data model shared across the completion pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a completion attempt was started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerReason {
    /// Triggered by the editor as the user types
    Automatic,

    /// Explicitly requested by the user (bypasses debounce and most prefilters)
    Manual,
}

/// Raw edit event received from the editor integration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditEvent {
    pub document_uri: String,
    pub cursor_offset: usize,
    pub prefix_text: String,
    pub suffix_text: String,
    pub trigger: TriggerReason,
    pub timestamp: DateTime<Utc>,
}

impl EditEvent {
    /// Create an edit event stamped with the current time
    pub fn new(
        document_uri: impl Into<String>,
        cursor_offset: usize,
        prefix_text: impl Into<String>,
        suffix_text: impl Into<String>,
        trigger: TriggerReason,
    ) -> Self {
        Self {
            document_uri: document_uri.into(),
            cursor_offset,
            prefix_text: prefix_text.into(),
            suffix_text: suffix_text.into(),
            trigger,
            timestamp: Utc::now(),
        }
    }
}

/// A single completion attempt's input, immutable once created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub document_uri: String,
    pub cursor_offset: usize,
    pub prefix_text: String,
    pub suffix_text: String,
    pub trigger: TriggerReason,
    pub created_at: DateTime<Utc>,
}

impl From<EditEvent> for CompletionRequest {
    fn from(event: EditEvent) -> Self {
        Self {
            document_uri: event.document_uri,
            cursor_offset: event.cursor_offset,
            prefix_text: event.prefix_text,
            suffix_text: event.suffix_text,
            trigger: event.trigger,
            created_at: event.timestamp,
        }
    }
}

/// Where a context snippet came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    RecentEdit,
    OpenFile,
    Diff,
    Retrieval,
    Clipboard,
}

impl SourceKind {
    /// Tie-break priority for snippet selection; lower wins
    pub fn priority(&self) -> u8 {
        match self {
            SourceKind::RecentEdit => 0,
            SourceKind::OpenFile => 1,
            SourceKind::Diff => 2,
            SourceKind::Retrieval => 3,
            SourceKind::Clipboard => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::RecentEdit => "recent-edit",
            SourceKind::OpenFile => "open-file",
            SourceKind::Diff => "diff",
            SourceKind::Retrieval => "retrieval",
            SourceKind::Clipboard => "clipboard",
        }
    }
}

/// A candidate piece of context produced for one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSnippet {
    pub source: SourceKind,
    pub content: String,
    /// Source-defined relevance, higher is better
    pub relevance_score: f64,
    pub token_count: usize,
    /// When the underlying content was produced; newer wins ties
    pub recency: DateTime<Utc>,
}

impl ContextSnippet {
    pub fn new(
        source: SourceKind,
        content: impl Into<String>,
        relevance_score: f64,
        token_count: usize,
        recency: DateTime<Utc>,
    ) -> Self {
        Self {
            source,
            content: content.into(),
            relevance_score,
            token_count,
            recency,
        }
    }
}

/// Byte range in the document the suggestion replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceRange {
    pub start: usize,
    pub end: usize,
}

impl ReplaceRange {
    /// Empty range at the cursor (pure insertion)
    pub fn at(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }
}

/// The single outbound product of the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub session_id: Uuid,
    pub text: String,
    pub replace_range: ReplaceRange,
}

/// Syntactic classification of the cursor position, supplied by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyntaxRegion {
    Code,
    StringLiteral,
    Comment,
}

/// Shape of the edit that produced the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditKind {
    Insertion,
    Deletion,
}

/// Caller-supplied editor state consumed by the gate's prefilters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorStateHint {
    pub syntax_region: SyntaxRegion,
    pub edit_kind: EditKind,
    /// The line the cursor is on, up to the cursor
    pub current_line: String,
}

impl EditorStateHint {
    /// Plain code insertion, the common case
    pub fn insertion(current_line: impl Into<String>) -> Self {
        Self {
            syntax_region: SyntaxRegion::Code,
            edit_kind: EditKind::Insertion,
            current_line: current_line.into(),
        }
    }
}

/// Live view of the document, used for staleness checks at delivery time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentState {
    pub prefix_text: String,
    pub suffix_text: String,
    pub cursor_offset: usize,
}

impl DocumentState {
    /// Snapshot matching the request exactly (document unchanged since then)
    pub fn from_request(request: &CompletionRequest) -> Self {
        Self {
            prefix_text: request.prefix_text.clone(),
            suffix_text: request.suffix_text.clone(),
            cursor_offset: request.cursor_offset,
        }
    }
}
