//! Token estimation for context budgeting
//!
//! A provider can supply exact counts through its own tokenizer; the
//! assembler only needs a stable, cheap estimate to enforce the budget, so
//! this uses the usual ~4 characters per token heuristic with a small
//! result cache.

use std::{collections::HashMap, sync::Mutex};

/// Heuristic token counter with an interior result cache
#[derive(Debug)]
pub struct TokenEstimator {
    cache: Mutex<HashMap<String, usize>>,
}

impl TokenEstimator {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Estimate the token count of `content`
    ///
    /// Roughly 1 token per 4 characters; at least 1 for non-empty content.
    pub fn count(&self, content: &str) -> usize {
        if content.is_empty() {
            return 0;
        }

        if let Ok(cache) = self.cache.lock() {
            if let Some(&count) = cache.get(content) {
                return count;
            }
        }

        let estimated = std::cmp::max(1, (content.len() as f64 / 4.0).ceil() as usize);

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(content.to_string(), estimated);
        }

        estimated
    }

    /// Clear the result cache
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Number of cached results
    pub fn cache_size(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new()
    }
}
