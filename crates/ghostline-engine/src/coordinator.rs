//! Stream coordination
//!
//! Owns the outbound model streams. For each fingerprint at most one
//! stream is open at a time; the first session to ask claims it and a
//! spawned task drives it to completion, while later sessions attach as
//! waiters. The driving task belongs to the in-flight entry, not to any
//! session, so a waiter cancelling only withdraws its own interest. The
//! stream itself is aborted when the last interested session detaches.

use std::sync::Arc;

use futures::StreamExt;
use ghostline_cache::{Fingerprint, InFlightTable, Joined, StreamClaim, StreamOutcome};
use ghostline_core::{TelemetryEvent, TelemetrySink};
use tokio::select;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::prompt::CompletionPrompt;
use crate::provider::{ModelProvider, StreamOptions};
use crate::session::StreamSession;

/// Coordinates outbound streams and waiter attachment per fingerprint
pub struct StreamCoordinator {
    provider: Arc<dyn ModelProvider>,
    inflight: Arc<InFlightTable>,
    options: StreamOptions,
    telemetry: Arc<dyn TelemetrySink>,
}

impl StreamCoordinator {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        inflight: Arc<InFlightTable>,
        options: StreamOptions,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            provider,
            inflight,
            options,
            telemetry,
        }
    }

    /// Produce the completion text for a fingerprint
    ///
    /// Claims a new stream or attaches to the in-flight one, then waits for
    /// its outcome. Returns [`EngineError::Cancelled`] as soon as the
    /// session's own token fires; the shared stream keeps running for any
    /// remaining waiters.
    pub async fn complete(
        &self,
        session: &StreamSession,
        fingerprint: &Fingerprint,
        prompt: CompletionPrompt,
    ) -> Result<String, EngineError> {
        let mut waiter = match self.inflight.join_or_claim(fingerprint) {
            Joined::Claimed { claim, waiter } => {
                debug!(fingerprint = %fingerprint, "claimed new completion stream");
                session.mark_streaming();
                let provider = self.provider.clone();
                let options = self.options.clone();
                tokio::spawn(async move {
                    drive_stream(provider, prompt, options, claim).await;
                });
                waiter
            }
            Joined::Attached(waiter) => {
                debug!(fingerprint = %fingerprint, "attached to in-flight stream");
                self.telemetry.record(TelemetryEvent::DedupAttached {
                    fingerprint: fingerprint.as_str().to_string(),
                });
                session.mark_streaming();
                waiter
            }
        };

        let cancelled = session.cancel_token();
        let outcome = select! {
            _ = cancelled.cancelled() => None,
            outcome = waiter.wait() => Some(outcome),
        };

        match outcome {
            None => {
                waiter.detach();
                Err(EngineError::Cancelled)
            }
            Some(outcome) => {
                waiter.resolve();
                match outcome {
                    StreamOutcome::Completed(text) => Ok(text.to_string()),
                    StreamOutcome::Failed(error) => Err(EngineError::StreamFailure(error)),
                    StreamOutcome::Aborted => Err(EngineError::Cancelled),
                }
            }
        }
    }
}

/// Drive one outbound stream to its terminal outcome
///
/// Accumulates deltas, truncating at the earliest stop sequence and at the
/// output token budget. A mid-stream transport error fails the whole
/// attempt; partial text is never published.
async fn drive_stream(
    provider: Arc<dyn ModelProvider>,
    prompt: CompletionPrompt,
    options: StreamOptions,
    claim: StreamClaim,
) {
    let cancel = claim.cancel_token();
    let mut stream = match provider
        .stream_completion(prompt, &options, cancel.clone())
        .await
    {
        Ok(stream) => stream,
        Err(error) => {
            warn!(%error, "provider refused to open completion stream");
            claim.publish(StreamOutcome::Failed(error.to_string()));
            return;
        }
    };

    let mut accumulated = String::new();
    loop {
        select! {
            _ = cancel.cancelled() => {
                claim.publish(StreamOutcome::Aborted);
                return;
            }
            delta = stream.next() => match delta {
                Some(Ok(delta)) => {
                    accumulated.push_str(&delta.text);

                    if let Some(at) = earliest_stop(&accumulated, &options.stop_sequences) {
                        accumulated.truncate(at);
                        claim.publish(StreamOutcome::Completed(Arc::from(accumulated.as_str())));
                        return;
                    }
                    if provider.count_tokens(&accumulated) >= options.max_output_tokens {
                        claim.publish(StreamOutcome::Completed(Arc::from(accumulated.as_str())));
                        return;
                    }
                }
                Some(Err(error)) => {
                    warn!(%error, "completion stream failed mid-flight");
                    claim.publish(StreamOutcome::Failed(error.to_string()));
                    return;
                }
                None => {
                    claim.publish(StreamOutcome::Completed(Arc::from(accumulated.as_str())));
                    return;
                }
            }
        }
    }
}

/// Byte index of the earliest stop sequence match, if any
fn earliest_stop(text: &str, stop_sequences: &[String]) -> Option<usize> {
    stop_sequences
        .iter()
        .filter_map(|stop| text.find(stop.as_str()))
        .min()
}
