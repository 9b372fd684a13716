//! Ghostline cache - fingerprinting, deduplicated completion caching
//!
//! This crate owns the process-wide shared state of the completion
//! pipeline:
//!
//! - [`Fingerprint`]: a stable key derived from a request and its assembled
//!   context; two requests with the same fingerprint are semantically
//!   identical for caching and dedup purposes.
//! - [`CompletionCache`]: a bounded, LRU-evicted store of completed
//!   suggestions. Completion text is immutable once written; only access
//!   bookkeeping mutates on reads.
//! - [`InFlightTable`]: atomic check-and-set markers guaranteeing at most
//!   one outbound model stream per distinct fingerprint, with attached
//!   waiters receiving the shared result.

pub mod fingerprint;
pub mod inflight;
pub mod metrics;
pub mod store;

pub use fingerprint::Fingerprint;
pub use inflight::{InFlightTable, Joined, StreamClaim, StreamOutcome, StreamWaiter};
pub use metrics::{CacheMetrics, CacheStats};
pub use store::{CacheEntry, CompletionCache};
