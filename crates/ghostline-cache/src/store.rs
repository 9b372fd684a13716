//! Bounded completion cache
//!
//! Completion text is immutable once written; reads only mutate access
//! bookkeeping (`last_accessed_at`, `hit_count`). Capacity is bounded and
//! the least-recently-accessed entry is evicted on overflow. Entries are
//! additionally invalidated when the live document has diverged from the
//! context that produced them beyond a similarity threshold.

use std::{collections::HashMap, num::NonZeroUsize, sync::Mutex};

use chrono::{DateTime, Utc};
use ghostline_core::{CompletionRequest, DocumentState};
use lru::LruCache;
use similar::TextDiff;
use tracing::debug;

use crate::{
    fingerprint::{head_window, tail_window, Fingerprint},
    metrics::{CacheMetrics, CacheStats},
};

/// Bytes of origin context kept per entry for divergence checks
const ORIGIN_WINDOW_BYTES: usize = 256;

/// One cached completion
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub completion_text: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub hit_count: u64,
    document_uri: String,
    origin_prefix_tail: String,
    origin_suffix_head: String,
}

/// Process-wide store of completed suggestions, shared by all sessions
pub struct CompletionCache {
    entries: Mutex<LruCache<Fingerprint, CacheEntry>>,
    /// Provisional (pre-assembly) fingerprint -> final fingerprint
    aliases: Mutex<HashMap<Fingerprint, Fingerprint>>,
    metrics: CacheMetrics,
    invalidation_threshold: f64,
}

impl CompletionCache {
    pub fn new(max_entries: usize, invalidation_threshold: f64) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            aliases: Mutex::new(HashMap::new()),
            metrics: CacheMetrics::new(),
            invalidation_threshold,
        }
    }

    /// Look up a completion by provisional or final fingerprint
    ///
    /// A hit refreshes the entry's LRU position and bookkeeping fields.
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<String> {
        let resolved = self.resolve(fingerprint);
        let mut entries = self.entries.lock().ok()?;
        match entries.get_mut(&resolved) {
            Some(entry) => {
                entry.last_accessed_at = Utc::now();
                entry.hit_count += 1;
                self.metrics.record_hit();
                Some(entry.completion_text.clone())
            }
            None => {
                self.metrics.record_miss();
                None
            }
        }
    }

    /// Store a completion under its final fingerprint
    ///
    /// Also records the provisional->final alias so the pre-assembly lookup
    /// of subsequent identical requests can hit without assembling context.
    pub fn store(
        &self,
        fingerprint: Fingerprint,
        provisional: Fingerprint,
        request: &CompletionRequest,
        completion_text: &str,
    ) {
        let now = Utc::now();
        let entry = CacheEntry {
            completion_text: completion_text.to_string(),
            created_at: now,
            last_accessed_at: now,
            hit_count: 0,
            document_uri: request.document_uri.clone(),
            origin_prefix_tail: tail_window(&request.prefix_text, ORIGIN_WINDOW_BYTES).to_string(),
            origin_suffix_head: head_window(&request.suffix_text, ORIGIN_WINDOW_BYTES).to_string(),
        };

        let entry_count;
        {
            let mut entries = match self.entries.lock() {
                Ok(entries) => entries,
                Err(_) => return,
            };
            if let Some((evicted_key, _)) = entries.push(fingerprint.clone(), entry) {
                if evicted_key != fingerprint {
                    self.metrics.record_eviction();
                    self.drop_aliases_for(&evicted_key);
                }
            }
            entry_count = entries.len();
        }

        self.metrics.record_insertion();
        self.metrics.set_entry_count(entry_count);

        if provisional != fingerprint {
            if let Ok(mut aliases) = self.aliases.lock() {
                aliases.insert(provisional, fingerprint);
            }
        }
    }

    /// Invalidate entries for `document_uri` whose origin context has
    /// diverged from the live document beyond the similarity threshold
    ///
    /// Best-effort cheap invalidation; entries for other documents are
    /// untouched.
    pub fn invalidate_diverged(&self, document_uri: &str, document: &DocumentState) -> usize {
        let live_prefix = tail_window(&document.prefix_text, ORIGIN_WINDOW_BYTES);
        let live_suffix = head_window(&document.suffix_text, ORIGIN_WINDOW_BYTES);

        let stale: Vec<Fingerprint> = {
            let entries = match self.entries.lock() {
                Ok(entries) => entries,
                Err(_) => return 0,
            };
            entries
                .iter()
                .filter(|(_, entry)| {
                    entry.document_uri == document_uri
                        && similarity(&entry.origin_prefix_tail, live_prefix)
                            .min(similarity(&entry.origin_suffix_head, live_suffix))
                            < self.invalidation_threshold
                })
                .map(|(fingerprint, _)| fingerprint.clone())
                .collect()
        };

        if stale.is_empty() {
            return 0;
        }

        if let Ok(mut entries) = self.entries.lock() {
            for fingerprint in &stale {
                entries.pop(fingerprint);
                self.metrics.record_invalidation();
                self.drop_aliases_for(fingerprint);
            }
            self.metrics.set_entry_count(entries.len());
        }

        debug!(document_uri, count = stale.len(), "invalidated diverged cache entries");
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
        if let Ok(mut aliases) = self.aliases.lock() {
            aliases.clear();
        }
        self.metrics.set_entry_count(0);
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot()
    }

    fn resolve(&self, fingerprint: &Fingerprint) -> Fingerprint {
        self.aliases
            .lock()
            .ok()
            .and_then(|aliases| aliases.get(fingerprint).cloned())
            .unwrap_or_else(|| fingerprint.clone())
    }

    fn drop_aliases_for(&self, fingerprint: &Fingerprint) {
        if let Ok(mut aliases) = self.aliases.lock() {
            aliases.retain(|_, target| target != fingerprint);
        }
    }
}

/// Character-level similarity ratio between two strings (0.0 to 1.0)
fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    TextDiff::from_chars(a, b).ratio() as f64
}
