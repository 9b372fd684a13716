//! Debounce and prefilter gate
//!
//! Decides whether a completion attempt should start at all. Prefilter
//! rules are cheap and synchronous and run first; the debounce delay only
//! applies to edits that pass them. Manual triggers bypass the debounce.
//! The gate keeps no state across attempts beyond its debounce counter.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use ghostline_core::{EditEvent, EditKind, EditorStateHint, EngineConfig, SyntaxRegion, TriggerReason};
use tracing::trace;

/// Outcome of asking the gate about an edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Admitted,
    Rejected(&'static str),
}

impl GateDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, GateDecision::Admitted)
    }

    pub fn reason(&self) -> Option<&'static str> {
        match self {
            GateDecision::Admitted => None,
            GateDecision::Rejected(reason) => Some(reason),
        }
    }
}

/// A composable suppression rule; every rule must allow the edit
pub trait PrefilterRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn allows(&self, event: &EditEvent, hint: &EditorStateHint) -> bool;
}

/// Suppress completion inside string literals and comments
struct SyntaxRegionRule;

impl PrefilterRule for SyntaxRegionRule {
    fn name(&self) -> &'static str {
        "syntax-region"
    }

    fn allows(&self, _event: &EditEvent, hint: &EditorStateHint) -> bool {
        hint.syntax_region == SyntaxRegion::Code
    }
}

/// Suppress pure deletions that leave no forward context
struct DeletionRule;

impl PrefilterRule for DeletionRule {
    fn name(&self) -> &'static str {
        "deletion"
    }

    fn allows(&self, event: &EditEvent, hint: &EditorStateHint) -> bool {
        hint.edit_kind != EditKind::Deletion || !event.suffix_text.is_empty()
    }
}

/// Suppress empty or very short lines unless manually triggered
struct LineLengthRule {
    min_line_length: usize,
}

impl PrefilterRule for LineLengthRule {
    fn name(&self) -> &'static str {
        "line-length"
    }

    fn allows(&self, event: &EditEvent, hint: &EditorStateHint) -> bool {
        event.trigger == TriggerReason::Manual
            || hint.current_line.trim().len() >= self.min_line_length
    }
}

/// Debounce + prefilter gate in front of the pipeline
pub struct Gate {
    debounce: Duration,
    rules: Vec<Arc<dyn PrefilterRule>>,
    generation: AtomicU64,
}

impl Gate {
    /// Gate with the built-in rule set
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_rules(
            config,
            vec![
                Arc::new(SyntaxRegionRule),
                Arc::new(DeletionRule),
                Arc::new(LineLengthRule {
                    min_line_length: config.min_line_length,
                }),
            ],
        )
    }

    /// Gate with a caller-supplied rule set
    pub fn with_rules(config: &EngineConfig, rules: Vec<Arc<dyn PrefilterRule>>) -> Self {
        Self {
            debounce: Duration::from_millis(config.debounce_ms),
            rules,
            generation: AtomicU64::new(0),
        }
    }

    /// Decide whether a completion attempt should start for this edit
    ///
    /// Every qualifying edit bumps the debounce generation; an attempt
    /// proceeds only if no further qualifying edit arrives within the
    /// debounce window. Manual triggers skip the wait.
    pub async fn admit(&self, event: &EditEvent, hint: &EditorStateHint) -> GateDecision {
        for rule in &self.rules {
            if !rule.allows(event, hint) {
                trace!(rule = rule.name(), "gate suppressed edit");
                return GateDecision::Rejected(rule.name());
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if event.trigger == TriggerReason::Manual {
            return GateDecision::Admitted;
        }

        tokio::time::sleep(self.debounce).await;

        if self.generation.load(Ordering::SeqCst) == generation {
            GateDecision::Admitted
        } else {
            trace!("gate debounced edit superseded by a newer one");
            GateDecision::Rejected("debounced")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghostline_core::SyntaxRegion;

    fn config(debounce_ms: u64) -> EngineConfig {
        EngineConfig {
            debounce_ms,
            min_line_length: 3,
            ..EngineConfig::default()
        }
    }

    fn event(trigger: TriggerReason, suffix: &str) -> EditEvent {
        EditEvent::new("file:///main.rs", 8, "let x = ", suffix, trigger)
    }

    fn code_hint(line: &str) -> EditorStateHint {
        EditorStateHint::insertion(line)
    }

    #[tokio::test]
    async fn string_literal_edits_are_suppressed_for_any_debounce() {
        for debounce_ms in [0, 10, 1_000] {
            let gate = Gate::new(&config(debounce_ms));
            let hint = EditorStateHint {
                syntax_region: SyntaxRegion::StringLiteral,
                edit_kind: EditKind::Insertion,
                current_line: "let msg = \"hello wor".to_string(),
            };
            let decision = gate.admit(&event(TriggerReason::Automatic, ""), &hint).await;
            assert_eq!(decision, GateDecision::Rejected("syntax-region"));
        }
    }

    #[tokio::test]
    async fn comment_edits_are_suppressed_even_when_manual() {
        let gate = Gate::new(&config(0));
        let hint = EditorStateHint {
            syntax_region: SyntaxRegion::Comment,
            edit_kind: EditKind::Insertion,
            current_line: "// explain the thing".to_string(),
        };
        let decision = gate.admit(&event(TriggerReason::Manual, ""), &hint).await;
        assert!(!decision.is_admitted());
    }

    #[tokio::test]
    async fn pure_deletion_without_forward_context_is_suppressed() {
        let gate = Gate::new(&config(0));
        let hint = EditorStateHint {
            syntax_region: SyntaxRegion::Code,
            edit_kind: EditKind::Deletion,
            current_line: "let x = ".to_string(),
        };
        let decision = gate.admit(&event(TriggerReason::Automatic, ""), &hint).await;
        assert_eq!(decision, GateDecision::Rejected("deletion"));
    }

    #[tokio::test]
    async fn deletion_with_forward_context_passes() {
        let gate = Gate::new(&config(0));
        let hint = EditorStateHint {
            syntax_region: SyntaxRegion::Code,
            edit_kind: EditKind::Deletion,
            current_line: "let x = ".to_string(),
        };
        let decision = gate.admit(&event(TriggerReason::Automatic, "remaining()"), &hint).await;
        assert!(decision.is_admitted());
    }

    #[tokio::test]
    async fn short_line_is_suppressed_unless_manual() {
        let gate = Gate::new(&config(0));

        let auto = gate
            .admit(&event(TriggerReason::Automatic, ""), &code_hint("ab"))
            .await;
        assert_eq!(auto, GateDecision::Rejected("line-length"));

        let manual = gate
            .admit(&event(TriggerReason::Manual, ""), &code_hint("ab"))
            .await;
        assert!(manual.is_admitted());
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edit_within_debounce_window_supersedes_the_pending_one() {
        let gate = Arc::new(Gate::new(&config(75)));

        let first = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.admit(&event(TriggerReason::Automatic, ""), &code_hint("let x = "))
                    .await
            })
        };

        // Second qualifying edit arrives 30ms later
        tokio::time::sleep(Duration::from_millis(30)).await;
        let second = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.admit(&event(TriggerReason::Automatic, ""), &code_hint("let x = 1"))
                    .await
            })
        };

        let first_decision = first.await.unwrap();
        let second_decision = second.await.unwrap();
        assert_eq!(first_decision, GateDecision::Rejected("debounced"));
        assert!(second_decision.is_admitted());
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_window_admits_the_pending_edit() {
        let gate = Gate::new(&config(75));
        let decision = gate
            .admit(&event(TriggerReason::Automatic, ""), &code_hint("let total = "))
            .await;
        assert!(decision.is_admitted());
    }

    #[tokio::test]
    async fn manual_trigger_bypasses_debounce() {
        // A long debounce window that would stall an automatic trigger
        let gate = Gate::new(&config(60_000));
        let decision = gate
            .admit(&event(TriggerReason::Manual, ""), &code_hint("let x = "))
            .await;
        assert!(decision.is_admitted());
    }
}
