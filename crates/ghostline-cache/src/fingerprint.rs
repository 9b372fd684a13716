//! Stable fingerprints for completion attempts
//!
//! A fingerprint is derived from the document URI, a normalized window of
//! prefix/suffix text around the cursor, and the ordered hashes of the
//! assembled context snippets. Every field is length-prefixed into the
//! hash input, so fingerprints cannot collide across different URIs or
//! field boundaries.

use ghostline_core::{CompletionRequest, ContextSnippet};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stable key identifying a semantically identical completion attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of the request alone, before context assembly
    ///
    /// Used for the pre-assembly cache lookup. Equal to [`Fingerprint::compute`]
    /// with an empty snippet list.
    pub fn provisional(request: &CompletionRequest, window_bytes: usize) -> Self {
        Self::compute(request, &[], window_bytes)
    }

    /// Final fingerprint of the request plus its assembled context
    pub fn compute(
        request: &CompletionRequest,
        snippets: &[ContextSnippet],
        window_bytes: usize,
    ) -> Self {
        let mut hasher = Sha256::new();

        hash_field(&mut hasher, request.document_uri.as_bytes());
        hash_field(
            &mut hasher,
            normalize(tail_window(&request.prefix_text, window_bytes)).as_bytes(),
        );
        hash_field(
            &mut hasher,
            normalize(head_window(&request.suffix_text, window_bytes)).as_bytes(),
        );

        hasher.update((snippets.len() as u64).to_le_bytes());
        for snippet in snippets {
            let content_hash = Sha256::digest(snippet.content.as_bytes());
            hasher.update(content_hash);
        }

        Fingerprint(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn hash_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Last `window` bytes of `text`, adjusted to a char boundary
pub(crate) fn tail_window(text: &str, window: usize) -> &str {
    if text.len() <= window {
        return text;
    }
    let mut start = text.len() - window;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

/// First `window` bytes of `text`, adjusted to a char boundary
pub(crate) fn head_window(text: &str, window: usize) -> &str {
    if text.len() <= window {
        return text;
    }
    let mut end = window;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Strip per-line trailing whitespace so cosmetic edits do not change the key
fn normalize(text: &str) -> String {
    text.lines().map(str::trim_end).collect::<Vec<_>>().join("\n")
}
