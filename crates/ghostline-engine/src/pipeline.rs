//! Pipeline orchestration
//!
//! `CompletionPipeline` is the single entry point: an edit event goes in,
//! at most one suggestion comes out. Gate, cache, context assembly, stream
//! coordination, and postprocessing run in that order, and every internal
//! failure collapses to `None` with a telemetry event. Callers never see
//! an error from this type.

use std::sync::Arc;

use ghostline_cache::{CompletionCache, Fingerprint, InFlightTable};
use ghostline_context::ContextAssembler;
use ghostline_core::{
    CompletionRequest, DocumentState, EditEvent, EditorStateHint, EngineConfig, Suggestion,
    TelemetryEvent, TelemetrySink,
};
use tracing::debug;

use crate::coordinator::StreamCoordinator;
use crate::error::EngineError;
use crate::gate::Gate;
use crate::postprocess::Postprocessor;
use crate::prompt::CompletionPrompt;
use crate::provider::{ModelProvider, StreamOptions};
use crate::session::{SessionSlot, StreamSession};

/// Access to the live document at delivery time
///
/// The editor integration supplies this so staleness and anti-duplication
/// checks run against the document as it is now, not as it was when the
/// request was made. Without one, the request snapshot is used.
pub trait DocumentReader: Send + Sync {
    fn current_state(&self, document_uri: &str) -> Option<DocumentState>;
}

/// The whole completion pipeline, edit event to suggestion
pub struct CompletionPipeline {
    config: EngineConfig,
    gate: Gate,
    assembler: ContextAssembler,
    cache: Arc<CompletionCache>,
    coordinator: StreamCoordinator,
    postprocessor: Postprocessor,
    telemetry: Arc<dyn TelemetrySink>,
    slot: SessionSlot,
    reader: Option<Arc<dyn DocumentReader>>,
}

impl CompletionPipeline {
    pub fn new(
        config: EngineConfig,
        assembler: ContextAssembler,
        provider: Arc<dyn ModelProvider>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        let cache = Arc::new(CompletionCache::new(
            config.max_cache_entries,
            config.invalidation_similarity_threshold,
        ));
        let options = StreamOptions {
            max_output_tokens: config.max_output_tokens,
            stop_sequences: config.stop_sequences.clone(),
        };
        let coordinator = StreamCoordinator::new(
            provider,
            Arc::new(InFlightTable::new()),
            options,
            telemetry.clone(),
        );
        Self {
            gate: Gate::new(&config),
            assembler,
            cache,
            coordinator,
            postprocessor: Postprocessor::new(config.staleness_similarity_threshold),
            telemetry,
            slot: SessionSlot::new(),
            reader: None,
            config,
        }
    }

    /// Use `reader` for live document state at delivery time
    pub fn with_document_reader(mut self, reader: Arc<dyn DocumentReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn cache(&self) -> &CompletionCache {
        &self.cache
    }

    pub fn current_session(&self) -> Option<Arc<StreamSession>> {
        self.slot.current()
    }

    /// Process one edit event end to end
    ///
    /// Starting a new attempt supersedes the previous one for this
    /// pipeline, whatever state it was in.
    pub async fn handle_edit(
        &self,
        event: EditEvent,
        hint: &EditorStateHint,
    ) -> Option<Suggestion> {
        let decision = self.gate.admit(&event, hint).await;
        if let Some(reason) = decision.reason() {
            self.telemetry.record(TelemetryEvent::GateRejected {
                reason: reason.to_string(),
            });
            return None;
        }

        let request = CompletionRequest::from(event);
        let session = self.slot.begin(request.clone());

        // Drop cached completions whose surrounding context no longer
        // matches the live document
        let document = self.document_state(&request);
        self.cache
            .invalidate_diverged(&request.document_uri, &document);

        let provisional =
            Fingerprint::provisional(&request, self.config.fingerprint_window_bytes);
        if let Some(text) = self.cache.lookup(&provisional) {
            self.telemetry.record(TelemetryEvent::CacheHit {
                fingerprint: provisional.as_str().to_string(),
            });
            return self.deliver(&session, &text);
        }
        self.telemetry.record(TelemetryEvent::CacheMiss {
            fingerprint: provisional.as_str().to_string(),
        });

        let snippets = self
            .assembler
            .assemble(&request, session.cancel_token())
            .await;
        if session.cancel_token().is_cancelled() {
            return self.cancelled(&session);
        }

        let fingerprint =
            Fingerprint::compute(&request, &snippets, self.config.fingerprint_window_bytes);
        session.set_fingerprint(fingerprint.clone());

        // The full fingerprint can hit where the provisional one missed
        if let Some(text) = self.cache.lookup(&fingerprint) {
            self.telemetry.record(TelemetryEvent::CacheHit {
                fingerprint: fingerprint.as_str().to_string(),
            });
            return self.deliver(&session, &text);
        }

        let prompt = CompletionPrompt::build(&request, snippets);
        match self.coordinator.complete(&session, &fingerprint, prompt).await {
            Ok(text) => {
                self.cache
                    .store(fingerprint, provisional, &request, &text);
                self.deliver(&session, &text)
            }
            Err(EngineError::Cancelled) => {
                session.cancel();
                self.cancelled(&session)
            }
            Err(error) => {
                session.fail();
                self.telemetry.record(TelemetryEvent::StreamFailed {
                    session_id: session.id(),
                    error: error.to_string(),
                });
                None
            }
        }
    }

    /// Validate the raw text against the live document and surface it
    fn deliver(&self, session: &Arc<StreamSession>, text: &str) -> Option<Suggestion> {
        if session.cancel_token().is_cancelled() || !self.slot.is_current(session) {
            return self.cancelled(session);
        }
        if !session.complete(text) {
            return self.cancelled(session);
        }

        let document = self.document_state(session.request());
        match self
            .postprocessor
            .process(session.id(), text, session.request(), &document)
        {
            Some(suggestion) => {
                self.telemetry.record(TelemetryEvent::SuggestionDelivered {
                    session_id: session.id(),
                    chars: suggestion.text.chars().count(),
                });
                Some(suggestion)
            }
            None => {
                self.telemetry.record(TelemetryEvent::PostprocessRejected {
                    session_id: session.id(),
                    reason: "failed-validation".to_string(),
                });
                None
            }
        }
    }

    fn cancelled(&self, session: &Arc<StreamSession>) -> Option<Suggestion> {
        debug!(session_id = %session.id(), "completion attempt cancelled");
        self.telemetry.record(TelemetryEvent::Cancelled {
            session_id: session.id(),
        });
        None
    }

    fn document_state(&self, request: &CompletionRequest) -> DocumentState {
        self.reader
            .as_ref()
            .and_then(|reader| reader.current_state(&request.document_uri))
            .unwrap_or_else(|| DocumentState::from_request(request))
    }
}
