//! Suggestion postprocessing
//!
//! Validates and cleans the raw completion text against the live document
//! before anything reaches the caller. The whole pass is idempotent:
//! running it twice over the same document state yields the same result,
//! which keeps cached completions safe to re-clean on every delivery.

use ghostline_core::{CompletionRequest, DocumentState, ReplaceRange, Suggestion};
use similar::TextDiff;
use tracing::debug;
use uuid::Uuid;

/// Window of surrounding text compared for staleness
const STALENESS_WINDOW_BYTES: usize = 256;

/// Cleans raw completion text and rejects what cannot be salvaged
pub struct Postprocessor {
    staleness_threshold: f64,
}

impl Postprocessor {
    pub fn new(staleness_threshold: f64) -> Self {
        Self {
            staleness_threshold,
        }
    }

    /// Turn raw completion text into a deliverable suggestion
    ///
    /// Returns `None` when the text is empty, when the document has
    /// diverged too far from the request that produced it, or when nothing
    /// remains after trimming text the document already contains.
    pub fn process(
        &self,
        session_id: Uuid,
        text: &str,
        request: &CompletionRequest,
        document: &DocumentState,
    ) -> Option<Suggestion> {
        if text.trim().is_empty() {
            return None;
        }

        if self.is_stale(request, document) {
            debug!(%session_id, "document diverged from request, dropping suggestion");
            return None;
        }

        let trimmed = trim_duplicated_suffix(text, &document.suffix_text);
        if trimmed.trim().is_empty() {
            debug!(%session_id, "suggestion fully duplicated the document suffix");
            return None;
        }

        let balanced = balance_delimiters(&trimmed, &document.suffix_text);

        Some(Suggestion {
            session_id,
            text: balanced,
            replace_range: ReplaceRange::at(document.cursor_offset),
        })
    }

    /// Whether the live document no longer resembles the request's snapshot
    fn is_stale(&self, request: &CompletionRequest, document: &DocumentState) -> bool {
        let prefix_similarity = similarity(
            tail_window(&request.prefix_text, STALENESS_WINDOW_BYTES),
            tail_window(&document.prefix_text, STALENESS_WINDOW_BYTES),
        );
        let suffix_similarity = similarity(
            head_window(&request.suffix_text, STALENESS_WINDOW_BYTES),
            head_window(&document.suffix_text, STALENESS_WINDOW_BYTES),
        );
        prefix_similarity.min(suffix_similarity) < self.staleness_threshold
    }
}

fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    TextDiff::from_chars(a, b).ratio() as f64
}

fn tail_window(text: &str, window: usize) -> &str {
    if text.len() <= window {
        return text;
    }
    let mut start = text.len() - window;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

fn head_window(text: &str, window: usize) -> &str {
    if text.len() <= window {
        return text;
    }
    let mut end = window;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Repeatedly strip the longest trailing fragment of `text` that the
/// document suffix already begins with
fn trim_duplicated_suffix(text: &str, suffix: &str) -> String {
    let mut current = text.to_string();
    loop {
        let mut k = current.len().min(suffix.len());
        let mut trimmed = false;
        while k > 0 {
            if suffix.is_char_boundary(k) && current.ends_with(&suffix[..k]) {
                current.truncate(current.len() - k);
                trimmed = true;
                break;
            }
            k -= 1;
        }
        if !trimmed {
            return current;
        }
    }
}

fn is_quote(c: char) -> bool {
    matches!(c, '"' | '`')
}

/// Length in chars of a complete char literal starting at `chars[0] == '\''`,
/// or `None` when the apostrophe is a lifetime or plain text
fn char_literal_len(chars: &[char]) -> Option<usize> {
    match chars.get(1) {
        Some('\\') => (chars.get(3) == Some(&'\'')).then_some(4),
        Some(&c) if c != '\'' => (chars.get(2) == Some(&'\'')).then_some(3),
        _ => None,
    }
}

fn closer_for(opener: char) -> char {
    match opener {
        '(' => ')',
        '[' => ']',
        '{' => '}',
        quote => quote,
    }
}

/// Openers (brackets and quotes) left unclosed at the end of `text`,
/// outermost first
fn unclosed_delimiters(text: &str) -> Vec<char> {
    let chars: Vec<char> = text.chars().collect();
    let mut stack: Vec<char> = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if let Some(&top) = stack.last() {
            if is_quote(top) {
                match c {
                    '\\' => i += 1,
                    _ if c == top => {
                        stack.pop();
                    }
                    _ => {}
                }
                i += 1;
                continue;
            }
        }
        match c {
            '(' | '[' | '{' => stack.push(c),
            '"' | '`' => stack.push(c),
            '\'' => {
                // A complete char literal is opaque; otherwise the
                // apostrophe is a lifetime or plain text, not a delimiter
                if let Some(len) = char_literal_len(&chars[i..]) {
                    i += len;
                    continue;
                }
            }
            ')' | ']' | '}' => {
                // A mismatched closer closes through intervening openers
                if let Some(pos) = stack.iter().rposition(|&opener| closer_for(opener) == c) {
                    stack.truncate(pos);
                }
            }
            _ => {}
        }
        i += 1;
    }
    stack
}

/// Append the closers the text still owes, innermost first, skipping the
/// trailing run the document suffix is about to supply anyway
fn balance_delimiters(text: &str, suffix: &str) -> String {
    let needed: Vec<char> = unclosed_delimiters(text)
        .iter()
        .rev()
        .map(|&opener| closer_for(opener))
        .collect();
    let supplied: Vec<char> = suffix
        .chars()
        .filter(|c| !c.is_whitespace())
        .take(needed.len())
        .collect();

    // Appended closers come before the suffix in the document, so only a
    // tail of the needed sequence can be left to the suffix
    let mut split = needed.len();
    for j in 0..=needed.len() {
        let rest = needed.len() - j;
        if supplied.len() >= rest && needed[j..] == supplied[..rest] {
            split = j;
            break;
        }
    }

    let mut out = text.to_string();
    out.extend(&needed[..split]);
    out
}
