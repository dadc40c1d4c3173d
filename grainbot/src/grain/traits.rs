//! Grain behaviour and activation traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::GrainError;

use super::types::GrainKey;

/// Context handed to a grain for one call.
#[derive(Debug, Clone)]
pub struct GrainContext {
    /// Key of the grain being invoked.
    pub key: GrainKey,
    /// Wall-clock time at which the call started running.
    pub now: DateTime<Utc>,
    /// Cancellation scope of the caller.
    pub cancel: CancellationToken,
}

/// A stateful grain.
///
/// The runtime guarantees `handle` is never entered concurrently for one
/// instance. Implementations should commit state changes only after their
/// last await point: a cancelled call is dropped at whichever await it is
/// suspended on.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct Counter { value: i64 }
///
/// #[async_trait(?Send)]
/// impl Grain for Counter {
///     type Request = i64;
///     type Response = i64;
///
///     async fn handle(&mut self, _ctx: &GrainContext, amount: i64) -> Result<i64, GrainError> {
///         self.value += amount;
///         Ok(self.value)
///     }
/// }
/// ```
#[async_trait(?Send)]
pub trait Grain: 'static {
    /// Request accepted by [`handle`](Grain::handle).
    type Request: 'static;
    /// Response produced by [`handle`](Grain::handle).
    type Response: 'static;

    /// Process one call.
    async fn handle(
        &mut self,
        ctx: &GrainContext,
        request: Self::Request,
    ) -> Result<Self::Response, GrainError>;
}

/// Creates grain instances on activation.
///
/// Closures `Fn(&GrainKey) -> G` implement this trait, which covers most
/// dependency-injection needs.
pub trait GrainFactory<G: Grain> {
    /// Build a fresh, empty instance for `key`.
    fn create(&self, key: &GrainKey) -> G;
}

impl<G, F> GrainFactory<G> for F
where
    G: Grain,
    F: Fn(&GrainKey) -> G,
{
    fn create(&self, key: &GrainKey) -> G {
        self(key)
    }
}
