//! Completion attempt sessions
//!
//! A [`StreamSession`] is the lifecycle scope of one completion attempt,
//! bound to a cancellation token. The state machine is
//! `Pending -> Streaming -> {Completed, Cancelled, Failed}`; terminal
//! states are sticky. A cache hit completes straight from `Pending`
//! since no stream is ever opened for it.
//! [`SessionSlot`] enforces the single-active-session
//! rule: starting a new attempt cancels the previous non-terminal one,
//! even when it targets the same fingerprint.

use std::sync::{Arc, Mutex};

use ghostline_cache::Fingerprint;
use ghostline_core::CompletionRequest;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Lifecycle state of a completion attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Cancelled | SessionState::Failed
        )
    }
}

#[derive(Debug)]
struct SessionInner {
    state: SessionState,
    accumulated_text: String,
    fingerprint: Option<Fingerprint>,
}

/// One completion attempt
pub struct StreamSession {
    id: Uuid,
    request: CompletionRequest,
    cancel: CancellationToken,
    inner: Mutex<SessionInner>,
}

impl StreamSession {
    pub fn new(request: CompletionRequest) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            request,
            cancel: CancellationToken::new(),
            inner: Mutex::new(SessionInner {
                state: SessionState::Pending,
                accumulated_text: String::new(),
                fingerprint: None,
            }),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &CompletionRequest {
        &self.request
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> SessionState {
        self.inner
            .lock()
            .map(|inner| inner.state)
            .unwrap_or(SessionState::Failed)
    }

    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.inner.lock().ok().and_then(|inner| inner.fingerprint.clone())
    }

    /// Record the fingerprint once context assembly has finished
    pub fn set_fingerprint(&self, fingerprint: Fingerprint) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fingerprint = Some(fingerprint);
        }
    }

    /// `Pending -> Streaming`; no-op from any other state
    pub fn mark_streaming(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            if inner.state == SessionState::Pending {
                inner.state = SessionState::Streaming;
            }
        }
    }

    /// Finish the attempt with its final text; fails if already terminal
    ///
    /// Accepted from `Streaming` and from `Pending` (cache hits skip the
    /// streaming phase entirely).
    pub fn complete(&self, text: &str) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        if inner.state.is_terminal() || self.cancel.is_cancelled() {
            return false;
        }
        inner.state = SessionState::Completed;
        inner.accumulated_text = text.to_string();
        true
    }

    /// Cancel the attempt; cancels the token and any work hanging off it
    pub fn cancel(&self) {
        self.cancel.cancel();
        if let Ok(mut inner) = self.inner.lock() {
            if !inner.state.is_terminal() {
                inner.state = SessionState::Cancelled;
                // Partial text is never surfaced
                inner.accumulated_text.clear();
                debug!(session_id = %self.id, "session cancelled");
            }
        }
    }

    /// Fail the attempt; partial text is discarded
    pub fn fail(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            if !inner.state.is_terminal() {
                inner.state = SessionState::Failed;
                inner.accumulated_text.clear();
            }
        }
    }

    pub fn accumulated_text(&self) -> String {
        self.inner
            .lock()
            .map(|inner| inner.accumulated_text.clone())
            .unwrap_or_default()
    }
}

/// The single live attempt of one logical editor session
pub struct SessionSlot {
    current: Mutex<Option<Arc<StreamSession>>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    /// Install a new attempt, cancelling the previous non-terminal one
    pub fn begin(&self, request: CompletionRequest) -> Arc<StreamSession> {
        let session = StreamSession::new(request);
        if let Ok(mut current) = self.current.lock() {
            if let Some(previous) = current.replace(session.clone()) {
                if !previous.state().is_terminal() {
                    previous.cancel();
                }
            }
        }
        session
    }

    /// Whether `session` is still the slot's current occupant
    ///
    /// Delivery is gated on this: a completion finishing after its session
    /// was superseded must never overwrite a newer result.
    pub fn is_current(&self, session: &StreamSession) -> bool {
        self.current
            .lock()
            .ok()
            .and_then(|current| current.as_ref().map(|s| s.id() == session.id()))
            .unwrap_or(false)
    }

    pub fn current(&self) -> Option<Arc<StreamSession>> {
        self.current.lock().ok().and_then(|current| current.clone())
    }
}

impl Default for SessionSlot {
    fn default() -> Self {
        Self::new()
    }
}
