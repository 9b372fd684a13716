//! Property-based tests for postprocessing, cache round-trips, and gate
//! suppression
//!
//! Postprocessing must be idempotent, the cache must return stored text
//! unchanged, and edits inside string literals must never trigger a
//! completion whatever the debounce configuration.

use std::sync::Arc;

use ghostline_cache::{CompletionCache, Fingerprint};
use ghostline_core::{
    CompletionRequest, EditEvent, EditKind, EditorStateHint, EngineConfig, SyntaxRegion,
    TriggerReason,
};
use ghostline_engine::{Gate, Postprocessor};
use proptest::prelude::*;
use uuid::Uuid;

fn request(prefix: &str, suffix: &str) -> CompletionRequest {
    EditEvent::new(
        "file:///src/lib.rs",
        prefix.len(),
        prefix,
        suffix,
        TriggerReason::Automatic,
    )
    .into()
}

/// Code-shaped completion text with unbalanced delimiters allowed
fn completion_text_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z0-9_ .,;+=\\n(){}\\[\\]\"]{0,48}")
        .expect("valid regex")
}

/// Document suffixes a cursor commonly sits in front of
fn suffix_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just(")".to_string()),
        Just(");\n".to_string()),
        Just(")]".to_string()),
        Just("\n}".to_string()),
        Just("\"".to_string()),
        Just("}\n".to_string()),
    ]
}

proptest! {
    /// Running the postprocessor over its own output changes nothing
    #[test]
    fn prop_postprocess_is_idempotent(
        text in completion_text_strategy(),
        suffix in suffix_strategy(),
    ) {
        let processor = Postprocessor::new(0.85);
        let req = request("let value = ", &suffix);
        let document = ghostline_core::DocumentState::from_request(&req);
        let id = Uuid::new_v4();

        if let Some(first) = processor.process(id, &text, &req, &document) {
            let second = processor
                .process(id, &first.text, &req, &document)
                .map(|s| s.text);
            prop_assert_eq!(second.as_deref(), Some(first.text.as_str()));
        }
    }

    /// Storing under a fingerprint and looking it straight up returns the
    /// text unchanged
    #[test]
    fn prop_cache_round_trip_preserves_text(
        text in "[ -~]{1,64}",
        prefix in "[a-z_ .]{1,32}",
    ) {
        let cache = CompletionCache::new(64, 0.6);
        let req = request(&prefix, "");
        let fingerprint = Fingerprint::provisional(&req, 2048);

        cache.store(fingerprint.clone(), fingerprint.clone(), &req, &text);
        prop_assert_eq!(cache.lookup(&fingerprint), Some(text));
    }

    /// An edit inside a string literal never triggers, for any debounce
    #[test]
    fn prop_string_literal_edit_never_triggers(
        debounce_ms in 0u64..500,
        manual in any::<bool>(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime");

        let config = EngineConfig {
            debounce_ms,
            ..EngineConfig::default()
        };
        let gate = Gate::new(&config);
        let trigger = if manual {
            TriggerReason::Manual
        } else {
            TriggerReason::Automatic
        };
        let event = EditEvent::new(
            "file:///src/lib.rs",
            20,
            "let msg = \"hello wor",
            "",
            trigger,
        );
        let hint = EditorStateHint {
            syntax_region: SyntaxRegion::StringLiteral,
            edit_kind: EditKind::Insertion,
            current_line: "let msg = \"hello wor".to_string(),
        };

        let decision = runtime.block_on(gate.admit(&event, &hint));
        prop_assert!(!decision.is_admitted());
    }
}
