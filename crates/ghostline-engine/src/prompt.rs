//! Prompt construction
//!
//! Renders a completion request and its assembled snippets into the
//! fill-in-the-middle layout providers consume. Rendering is deterministic:
//! the same request and snippet list always produce the same string, which
//! keeps fingerprint-equal attempts provider-equal too.

use ghostline_core::{CompletionRequest, ContextSnippet};

/// Everything a provider needs to produce a completion
#[derive(Debug, Clone)]
pub struct CompletionPrompt {
    pub document_uri: String,
    pub snippets: Vec<ContextSnippet>,
    pub prefix_text: String,
    pub suffix_text: String,
}

impl CompletionPrompt {
    /// Assemble a prompt from a request and its selected snippets
    ///
    /// Snippet order is preserved as selected by the assembler.
    pub fn build(request: &CompletionRequest, snippets: Vec<ContextSnippet>) -> Self {
        Self {
            document_uri: request.document_uri.clone(),
            snippets,
            prefix_text: request.prefix_text.clone(),
            suffix_text: request.suffix_text.clone(),
        }
    }

    /// Render the fill-in-the-middle prompt text
    pub fn render(&self) -> String {
        let mut out = String::new();
        for snippet in &self.snippets {
            out.push_str("<|context:");
            out.push_str(snippet.source.as_str());
            out.push_str("|>\n");
            out.push_str(&snippet.content);
            if !snippet.content.ends_with('\n') {
                out.push('\n');
            }
        }
        out.push_str("<|fim_prefix|>");
        out.push_str(&self.prefix_text);
        out.push_str("<|fim_suffix|>");
        out.push_str(&self.suffix_text);
        out.push_str("<|fim_middle|>");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ghostline_core::{SourceKind, TriggerReason};

    fn request() -> CompletionRequest {
        CompletionRequest {
            document_uri: "file:///main.rs".to_string(),
            cursor_offset: 8,
            prefix_text: "let x = ".to_string(),
            suffix_text: ";\n".to_string(),
            trigger: TriggerReason::Automatic,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn rendering_is_deterministic() {
        let snippets = vec![ContextSnippet::new(
            SourceKind::OpenFile,
            "fn add(a: i32, b: i32) -> i32 { a + b }",
            0.9,
            12,
            Utc::now(),
        )];
        let prompt = CompletionPrompt::build(&request(), snippets);
        assert_eq!(prompt.render(), prompt.render());
    }

    #[test]
    fn snippets_precede_the_fim_markers() {
        let snippets = vec![ContextSnippet::new(
            SourceKind::Diff,
            "+ fn add()",
            0.5,
            4,
            Utc::now(),
        )];
        let rendered = CompletionPrompt::build(&request(), snippets).render();

        let context_at = rendered.find("<|context:diff|>").unwrap();
        let prefix_at = rendered.find("<|fim_prefix|>").unwrap();
        let suffix_at = rendered.find("<|fim_suffix|>").unwrap();
        let middle_at = rendered.find("<|fim_middle|>").unwrap();
        assert!(context_at < prefix_at && prefix_at < suffix_at && suffix_at < middle_at);
        assert!(rendered.ends_with("<|fim_middle|>"));
    }

    #[test]
    fn empty_snippet_list_renders_markers_only() {
        let rendered = CompletionPrompt::build(&request(), Vec::new()).render();
        assert_eq!(rendered, "<|fim_prefix|>let x = <|fim_suffix|>;\n<|fim_middle|>");
    }
}
