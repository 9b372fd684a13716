//! Telemetry events emitted by the pipeline
//!
//! Cache hits and misses, dedup attaches, cancellations, and failures are
//! reported through a sink trait so an external logging collaborator can
//! consume them. The pipeline itself never surfaces these as errors.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

/// Events the pipeline reports as it processes attempts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TelemetryEvent {
    /// The gate suppressed an attempt; expected no-op, not an error
    GateRejected { reason: String },

    /// A cached completion was served
    CacheHit { fingerprint: String },

    /// No cached completion was available
    CacheMiss { fingerprint: String },

    /// The attempt attached to another session's in-flight stream
    DedupAttached { fingerprint: String },

    /// The session was superseded or its caller went away
    Cancelled { session_id: Uuid },

    /// Transport or provider error mid-stream
    StreamFailed { session_id: Uuid, error: String },

    /// The raw completion did not survive validation against the live document
    PostprocessRejected { session_id: Uuid, reason: String },

    /// A suggestion was delivered to the caller
    SuggestionDelivered { session_id: Uuid, chars: usize },
}

/// Sink for telemetry events
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: TelemetryEvent);
}

/// Sink that forwards events to `tracing`
#[derive(Debug, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&self, event: TelemetryEvent) {
        match &event {
            TelemetryEvent::StreamFailed { session_id, error } => {
                warn!(%session_id, %error, "completion stream failed");
            }
            TelemetryEvent::PostprocessRejected { session_id, reason } => {
                debug!(%session_id, %reason, "suggestion rejected by postprocessor");
            }
            other => debug!(event = ?other, "completion telemetry"),
        }
    }
}

/// In-memory sink for assertions in tests
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events in arrival order
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Count of events matching a predicate
    pub fn count_matching(&self, predicate: impl Fn(&TelemetryEvent) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }
}

impl TelemetrySink for MemorySink {
    fn record(&self, event: TelemetryEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
