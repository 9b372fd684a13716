//! Relevance scoring shared by the snippet sources
//!
//! Scores are source-defined, but all of the built-in sources start from
//! identifier overlap: the fraction of identifiers near the cursor that
//! also appear in the candidate text.

use std::collections::HashSet;

/// Bytes of prefix considered "near the cursor" for scoring
pub(crate) const QUERY_WINDOW_BYTES: usize = 512;

/// Fraction of `query` identifiers present in `candidate` (0.0 to 1.0)
pub(crate) fn identifier_overlap(query: &str, candidate: &str) -> f64 {
    let query_idents = identifiers(query);
    if query_idents.is_empty() {
        return 0.0;
    }
    let candidate_idents = identifiers(candidate);
    let shared = query_idents
        .iter()
        .filter(|ident| candidate_idents.contains(*ident))
        .count();
    shared as f64 / query_idents.len() as f64
}

/// The tail of `text` used as the scoring query
pub(crate) fn query_window(text: &str) -> &str {
    if text.len() <= QUERY_WINDOW_BYTES {
        return text;
    }
    let mut start = text.len() - QUERY_WINDOW_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

fn identifiers(text: &str) -> HashSet<&str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|ident| ident.len() >= 2)
        .collect()
}
