//! A single grain activation and its message loop.

use std::cell::Cell;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::GrainError;
use crate::time::Clock;

use super::traits::{Grain, GrainContext};
use super::types::{ActivationId, GrainKey};

/// One queued call.
pub(crate) struct Envelope<G: Grain> {
    pub(crate) request: G::Request,
    pub(crate) cancel: CancellationToken,
    pub(crate) reply: oneshot::Sender<Result<G::Response, GrainError>>,
}

/// Handle to a running activation.
///
/// The grain instance itself lives inside the message loop task; this
/// handle only holds the mailbox and bookkeeping used by the directory.
/// Dropping the last handle closes the mailbox, and the loop exits once the
/// queue is drained.
pub(crate) struct Activation<G: Grain> {
    id: ActivationId,
    mailbox: mpsc::UnboundedSender<Envelope<G>>,
    /// Calls enqueued but not yet replied to.
    pending: Rc<Cell<usize>>,
    /// Directory tick of the last enqueue, for LRU ordering.
    last_touch: Cell<u64>,
    /// Wall-clock time of the last enqueue, for idle expiry.
    last_used_at: Cell<DateTime<Utc>>,
}

impl<G: Grain> Activation<G> {
    /// Spawn the message loop for `grain` and return its handle.
    ///
    /// Must be called from inside a `LocalSet`.
    pub(crate) fn spawn(
        id: ActivationId,
        key: GrainKey,
        grain: G,
        clock: Rc<dyn Clock>,
        touch: u64,
    ) -> Rc<Self> {
        let (mailbox, inbox) = mpsc::unbounded_channel();
        let pending = Rc::new(Cell::new(0));
        let now = clock.now();

        tracing::debug!(key = %key, activation = %id, "activating grain");
        tokio::task::spawn_local(message_loop(id, key, grain, inbox, pending.clone(), clock));

        Rc::new(Self {
            id,
            mailbox,
            pending,
            last_touch: Cell::new(touch),
            last_used_at: Cell::new(now),
        })
    }

    pub(crate) fn id(&self) -> ActivationId {
        self.id
    }

    /// Queue a call. Fails only if the message loop has died.
    pub(crate) fn enqueue(
        &self,
        envelope: Envelope<G>,
        touch: u64,
        now: DateTime<Utc>,
    ) -> Result<(), GrainError> {
        self.pending.set(self.pending.get() + 1);
        self.last_touch.set(touch);
        self.last_used_at.set(now);

        self.mailbox.send(envelope).map_err(|_| {
            self.pending.set(self.pending.get().saturating_sub(1));
            GrainError::Deactivated
        })
    }

    /// No queued or running calls.
    pub(crate) fn is_idle(&self) -> bool {
        self.pending.get() == 0
    }

    /// The message loop is still running.
    pub(crate) fn is_alive(&self) -> bool {
        !self.mailbox.is_closed()
    }

    pub(crate) fn last_touch(&self) -> u64 {
        self.last_touch.get()
    }

    pub(crate) fn last_used_at(&self) -> DateTime<Utc> {
        self.last_used_at.get()
    }
}

/// Processes calls for one activation, strictly one at a time.
///
/// Calls whose token is already cancelled when dequeued are answered with
/// [`GrainError::Cancelled`] without touching the grain. A call whose token
/// fires mid-flight is dropped at its current await point.
async fn message_loop<G: Grain>(
    id: ActivationId,
    key: GrainKey,
    mut grain: G,
    mut inbox: mpsc::UnboundedReceiver<Envelope<G>>,
    pending: Rc<Cell<usize>>,
    clock: Rc<dyn Clock>,
) {
    while let Some(Envelope {
        request,
        cancel,
        reply,
    }) = inbox.recv().await
    {
        if cancel.is_cancelled() || reply.is_closed() {
            tracing::debug!(key = %key, activation = %id, "skipping abandoned call");
            let _ = reply.send(Err(GrainError::Cancelled));
        } else {
            let ctx = GrainContext {
                key: key.clone(),
                now: clock.now(),
                cancel: cancel.clone(),
            };

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(GrainError::Cancelled),
                result = grain.handle(&ctx, request) => result,
            };

            if let Err(e) = &result {
                if !e.is_cancelled() {
                    tracing::warn!(key = %key, activation = %id, error = %e, "grain call failed");
                }
            }
            let _ = reply.send(result);
        }
        pending.set(pending.get().saturating_sub(1));
    }

    tracing::debug!(key = %key, activation = %id, "grain deactivated");
}
