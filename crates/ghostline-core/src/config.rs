//! Engine configuration
//!
//! All timing constants and thresholds in the pipeline are tunables read
//! from this struct; nothing in the stage logic hard-codes them. Debounce
//! and prefiltering are independent stages with independent knobs.

use serde::{Deserialize, Serialize};

/// Tunable configuration for the completion pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Debounce window for automatic triggers, in milliseconds
    pub debounce_ms: u64,
    /// Total token budget for assembled context
    pub token_budget: usize,
    /// Independent timeout applied to each context source, in milliseconds
    pub per_source_timeout_ms: u64,
    /// Bounded capacity of the completion cache
    pub max_cache_entries: usize,
    /// Sequences that terminate stream consumption when matched in the
    /// accumulated text
    pub stop_sequences: Vec<String>,
    /// Minimum current-line length for automatic triggers
    pub min_line_length: usize,
    /// Ceiling on generated tokens per completion
    pub max_output_tokens: usize,
    /// Cached entries whose origin context has drifted below this similarity
    /// against the live document are invalidated (0.0..=1.0)
    pub invalidation_similarity_threshold: f64,
    /// Suggestions whose request context has drifted below this similarity
    /// against the live document are discarded at delivery (0.0..=1.0)
    pub staleness_similarity_threshold: f64,
    /// Bytes of prefix/suffix around the cursor that participate in the
    /// fingerprint
    pub fingerprint_window_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 75,
            token_budget: 2048,
            per_source_timeout_ms: 150,
            max_cache_entries: 512,
            stop_sequences: vec!["\n\n\n".to_string()],
            min_line_length: 3,
            max_output_tokens: 256,
            invalidation_similarity_threshold: 0.6,
            staleness_similarity_threshold: 0.85,
            fingerprint_window_bytes: 2048,
        }
    }
}
