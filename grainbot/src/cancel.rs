//! Scoped cancellation for per-call work.
//!
//! The receive loop runs under one session-wide [`CancellationToken`]. Every
//! grain or handler invocation gets its own child token through a
//! [`CallScope`]:
//!
//! ```text
//! session token ──cancel──▶ child token (one per in-flight call)
//!                               ▲
//!            CallScope::drop ───┘  cancel + unlink
//! ```
//!
//! The child fires when the session is cancelled or when the scope is
//! dropped, whichever happens first. Dropping the scope also releases the
//! link to the session token, so a long-running process does not accumulate
//! one registration per handled update.
//!
//! # Example
//!
//! ```rust,ignore
//! let bridge = CancellationBridge::new(session.clone());
//! let scope = bridge.scope();
//! let result = grain.call(request, scope.token()).await;
//! drop(scope); // also dropped on `?` or panic
//! ```

use std::cell::Cell;
use std::rc::Rc;

use tokio_util::sync::CancellationToken;

/// Derives per-call cancellation scopes from a session token.
#[derive(Debug, Clone)]
pub struct CancellationBridge {
    session: CancellationToken,
    active_links: Rc<Cell<usize>>,
}

impl CancellationBridge {
    /// Bridge calls to `session`.
    pub fn new(session: CancellationToken) -> Self {
        Self {
            session,
            active_links: Rc::new(Cell::new(0)),
        }
    }

    /// The long-lived session token.
    pub fn session(&self) -> &CancellationToken {
        &self.session
    }

    /// Open a scope for one call.
    pub fn scope(&self) -> CallScope {
        self.active_links.set(self.active_links.get() + 1);
        CallScope {
            token: self.session.child_token(),
            active_links: self.active_links.clone(),
        }
    }

    /// Number of live [`CallScope`]s.
    ///
    /// Counts scopes, not token clones. A call queued behind a busy grain
    /// keeps a clone of its (by then cancelled) child token until the
    /// grain's loop dequeues and drops it, after the scope is gone and no
    /// longer counted here.
    pub fn active_links(&self) -> usize {
        self.active_links.get()
    }
}

/// Cancellation scope for a single call.
///
/// Holds a child of the session token. Dropping the scope cancels the child
/// and unlinks it from the session token on every exit path.
#[derive(Debug)]
pub struct CallScope {
    token: CancellationToken,
    active_links: Rc<Cell<usize>>,
}

impl CallScope {
    /// The derived token to hand to the call.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for CallScope {
    fn drop(&mut self) {
        // The child leaves the session's tree once its last clone drops;
        // clones still held by a finishing grain observe it as cancelled.
        self.token.cancel();
        self.active_links.set(self.active_links.get().saturating_sub(1));
    }
}
