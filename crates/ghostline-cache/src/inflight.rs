//! In-flight markers for read-through dedup
//!
//! At most one outbound model stream exists per distinct fingerprint at any
//! instant. The first session to ask for a fingerprint claims it and drives
//! the stream; later sessions attach as waiters and receive the same
//! outcome. Interest is reference counted: a session detaching (cancelled
//! or superseded) stops observing immediately, and the underlying stream is
//! aborted only when the last interested session detaches, so one session's
//! cancellation never disturbs the others.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use dashmap::{mapref::entry::Entry, DashMap};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::fingerprint::Fingerprint;

/// Terminal outcome of an in-flight stream, shared by all waiters
#[derive(Debug, Clone)]
pub enum StreamOutcome {
    /// The stream finished; the full accumulated text
    Completed(Arc<str>),
    /// Transport or provider failure; partial text was discarded
    Failed(String),
    /// The last interested session detached before the stream finished
    Aborted,
}

struct InFlightEntry {
    tx: Arc<watch::Sender<Option<StreamOutcome>>>,
    cancel: CancellationToken,
    interested: Arc<AtomicUsize>,
}

/// Result of asking the table for a fingerprint
pub enum Joined {
    /// This caller owns the outbound stream and must publish its outcome
    Claimed {
        claim: StreamClaim,
        waiter: StreamWaiter,
    },
    /// Another caller's stream is already producing this fingerprint
    Attached(StreamWaiter),
}

/// Publisher half held by the task driving the outbound stream
///
/// Exactly one terminal outcome is published per claim. If the driving
/// task dies without publishing, dropping the claim publishes `Aborted`
/// and clears the marker, so the fingerprint can be claimed again.
pub struct StreamClaim {
    fingerprint: Fingerprint,
    tx: Arc<watch::Sender<Option<StreamOutcome>>>,
    cancel: CancellationToken,
    entries: Arc<DashMap<Fingerprint, InFlightEntry>>,
    published: bool,
}

impl StreamClaim {
    /// Token aborting the outbound call when the last waiter detaches
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Publish the stream's outcome to every waiter and clear the marker
    pub fn publish(mut self, outcome: StreamOutcome) {
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: StreamOutcome) {
        if self.published {
            return;
        }
        self.published = true;
        // Remove before sending so a caller arriving after the outcome
        // claims a fresh stream instead of attaching to a finished one
        self.entries.remove(&self.fingerprint);
        let _ = self.tx.send(Some(outcome));
    }
}

impl Drop for StreamClaim {
    fn drop(&mut self) {
        if !self.published {
            warn!(
                fingerprint = %self.fingerprint,
                "stream driver dropped its claim without publishing"
            );
            self.finish(StreamOutcome::Aborted);
        }
    }
}

/// Waiter half held by each interested session
pub struct StreamWaiter {
    rx: watch::Receiver<Option<StreamOutcome>>,
    cancel: CancellationToken,
    interested: Arc<AtomicUsize>,
    detached: bool,
}

impl StreamWaiter {
    /// Suspend until the stream publishes its outcome
    pub async fn wait(&mut self) -> StreamOutcome {
        loop {
            if let Some(outcome) = self.rx.borrow().clone() {
                return outcome;
            }
            if self.rx.changed().await.is_err() {
                // Publisher dropped without a result
                return StreamOutcome::Aborted;
            }
        }
    }

    /// Withdraw interest; aborts the stream if no waiter remains
    pub fn detach(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.detached {
            return;
        }
        self.detached = true;
        if self.interested.fetch_sub(1, Ordering::SeqCst) == 1 {
            debug!("last waiter detached, aborting in-flight stream");
            self.cancel.cancel();
        }
    }

    /// Mark this waiter as satisfied so dropping it does not count as a detach
    pub fn resolve(mut self) {
        self.detached = true;
    }
}

impl Drop for StreamWaiter {
    fn drop(&mut self) {
        self.release();
    }
}

/// Process-wide table of fingerprints currently being produced
pub struct InFlightTable {
    entries: Arc<DashMap<Fingerprint, InFlightEntry>>,
}

impl InFlightTable {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Atomically claim the fingerprint or attach to its in-flight stream
    ///
    /// The dashmap entry API makes the check-and-set atomic: two racing
    /// callers cannot both claim the same fingerprint.
    pub fn join_or_claim(&self, fingerprint: &Fingerprint) -> Joined {
        match self.entries.entry(fingerprint.clone()) {
            Entry::Occupied(occupied) => {
                let entry = occupied.get();
                entry.interested.fetch_add(1, Ordering::SeqCst);
                Joined::Attached(StreamWaiter {
                    rx: entry.tx.subscribe(),
                    cancel: entry.cancel.clone(),
                    interested: entry.interested.clone(),
                    detached: false,
                })
            }
            Entry::Vacant(vacant) => {
                let (tx, rx) = watch::channel(None);
                let tx = Arc::new(tx);
                let cancel = CancellationToken::new();
                let interested = Arc::new(AtomicUsize::new(1));

                vacant.insert(InFlightEntry {
                    tx: tx.clone(),
                    cancel: cancel.clone(),
                    interested: interested.clone(),
                });

                Joined::Claimed {
                    claim: StreamClaim {
                        fingerprint: fingerprint.clone(),
                        tx,
                        cancel: cancel.clone(),
                        entries: self.entries.clone(),
                        published: false,
                    },
                    waiter: StreamWaiter {
                        rx,
                        cancel,
                        interested,
                        detached: false,
                    },
                }
            }
        }
    }

    /// Whether a stream for this fingerprint is currently in flight
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InFlightTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ghostline_core::{CompletionRequest, TriggerReason};

    fn fingerprint(prefix: &str) -> Fingerprint {
        let request = CompletionRequest {
            document_uri: "file:///a.rs".to_string(),
            cursor_offset: prefix.len(),
            prefix_text: prefix.to_string(),
            suffix_text: String::new(),
            trigger: TriggerReason::Automatic,
            created_at: Utc::now(),
        };
        Fingerprint::provisional(&request, 2048)
    }

    #[tokio::test]
    async fn second_caller_attaches_instead_of_claiming() {
        let table = InFlightTable::new();
        let fp = fingerprint("let x = ");

        let first = table.join_or_claim(&fp);
        assert!(matches!(first, Joined::Claimed { .. }));

        let second = table.join_or_claim(&fp);
        assert!(matches!(second, Joined::Attached(_)));
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn waiters_receive_the_published_outcome() {
        let table = InFlightTable::new();
        let fp = fingerprint("let x = ");

        let Joined::Claimed { claim, waiter } = table.join_or_claim(&fp) else {
            panic!("first join must claim");
        };
        let Joined::Attached(attached) = table.join_or_claim(&fp) else {
            panic!("second join must attach");
        };

        let owner = tokio::spawn(async move {
            let mut waiter = waiter;
            waiter.wait().await
        });
        let attached_task = tokio::spawn(async move {
            let mut attached = attached;
            attached.wait().await
        });

        claim.publish(StreamOutcome::Completed(Arc::from("a + b")));

        let owner_outcome = owner.await.unwrap();
        let attached_outcome = attached_task.await.unwrap();
        assert!(matches!(owner_outcome, StreamOutcome::Completed(ref t) if &**t == "a + b"));
        assert!(matches!(attached_outcome, StreamOutcome::Completed(ref t) if &**t == "a + b"));
        assert!(!table.contains(&fp));
    }

    #[tokio::test]
    async fn detaching_one_waiter_does_not_abort_the_stream() {
        let table = InFlightTable::new();
        let fp = fingerprint("let x = ");

        let Joined::Claimed { claim, waiter } = table.join_or_claim(&fp) else {
            panic!("first join must claim");
        };
        let Joined::Attached(attached) = table.join_or_claim(&fp) else {
            panic!("second join must attach");
        };

        attached.detach();
        assert!(!claim.cancel_token().is_cancelled());

        // The remaining waiter still receives the outcome
        let mut waiter = waiter;
        claim.publish(StreamOutcome::Completed(Arc::from("done")));
        assert!(matches!(waiter.wait().await, StreamOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn dropped_claim_aborts_waiters_and_releases_the_fingerprint() {
        let table = InFlightTable::new();
        let fp = fingerprint("let x = ");

        let Joined::Claimed { claim, waiter } = table.join_or_claim(&fp) else {
            panic!("first join must claim");
        };

        // Driver dies without publishing
        drop(claim);

        let mut waiter = waiter;
        assert!(matches!(waiter.wait().await, StreamOutcome::Aborted));
        assert!(!table.contains(&fp));

        // The fingerprint is claimable again for a fresh stream
        assert!(matches!(table.join_or_claim(&fp), Joined::Claimed { .. }));
    }

    #[tokio::test]
    async fn last_detach_aborts_the_stream() {
        let table = InFlightTable::new();
        let fp = fingerprint("let x = ");

        let Joined::Claimed { claim, waiter } = table.join_or_claim(&fp) else {
            panic!("first join must claim");
        };

        waiter.detach();
        assert!(claim.cancel_token().is_cancelled());
    }
}
