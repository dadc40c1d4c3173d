//! Grain runtime and grain references.
//!
//! [`GrainRuntime`] is the key-to-instance resolver: it owns the activation
//! directory, the factory, and the clock for one grain type. A [`GrainRef`]
//! is just a key plus a runtime handle. It holds no activation, so a
//! reference kept across an eviction transparently reaches the next
//! activation.
//!
//! # Example
//!
//! ```rust,ignore
//! let runtime = GrainRuntime::new(|_key: &GrainKey| Counter::default(), clock, limits);
//!
//! let counter = runtime.resolve("alice");
//! let value = counter.call(5, &token).await?;
//! ```

use std::rc::Rc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::GrainError;
use crate::time::Clock;

use super::activation::{Activation, Envelope};
use super::directory::{ActivationDirectory, ActivationLimits};
use super::traits::{Grain, GrainFactory};
use super::types::GrainKey;

struct RuntimeInner<G: Grain> {
    directory: ActivationDirectory<G>,
    factory: Box<dyn GrainFactory<G>>,
    clock: Rc<dyn Clock>,
}

/// Resolves keys to activations of grain type `G`.
///
/// Cloning is cheap and every clone shares the same activations.
pub struct GrainRuntime<G: Grain> {
    inner: Rc<RuntimeInner<G>>,
}

impl<G: Grain> Clone for GrainRuntime<G> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<G: Grain> GrainRuntime<G> {
    /// Create a runtime activating grains through `factory`.
    pub fn new(
        factory: impl GrainFactory<G> + 'static,
        clock: Rc<dyn Clock>,
        limits: ActivationLimits,
    ) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                directory: ActivationDirectory::new(limits),
                factory: Box::new(factory),
                clock,
            }),
        }
    }

    /// Get a reference to the grain for `key`.
    ///
    /// Returns immediately; activation happens on the first call.
    pub fn resolve(&self, key: impl Into<GrainKey>) -> GrainRef<G> {
        GrainRef {
            key: key.into(),
            runtime: self.clone(),
        }
    }

    /// Activation bounds this runtime enforces.
    pub fn limits(&self) -> &ActivationLimits {
        self.inner.directory.limits()
    }

    /// Number of live activations.
    pub fn activation_count(&self) -> usize {
        self.inner.directory.len()
    }

    /// Deactivate idle grains past their idle timeout. Returns how many
    /// were dropped.
    pub fn deactivate_idle(&self) -> usize {
        let swept = self.inner.directory.deactivate_idle(self.inner.clock.now());
        if swept > 0 {
            tracing::debug!(swept, remaining = self.activation_count(), "idle sweep");
        }
        swept
    }

    /// Run [`deactivate_idle`](Self::deactivate_idle) every `interval` until
    /// `cancel` fires.
    ///
    /// A zero `interval` disables sweeping: the task logs a warning and
    /// returns at once.
    pub fn spawn_idle_sweeper(
        &self,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let runtime = self.clone();
        tokio::task::spawn_local(async move {
            if interval.is_zero() {
                tracing::warn!("idle sweep interval is zero, sweeping disabled");
                return;
            }
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        runtime.deactivate_idle();
                    }
                }
            }
        })
    }

    fn activation_for(&self, key: &GrainKey) -> Rc<Activation<G>> {
        let inner = &self.inner;
        inner.directory.get_or_activate(key, |id, touch| {
            let grain = inner.factory.create(key);
            Activation::spawn(id, key.clone(), grain, inner.clock.clone(), touch)
        })
    }
}

/// Reference to one logical grain.
pub struct GrainRef<G: Grain> {
    key: GrainKey,
    runtime: GrainRuntime<G>,
}

impl<G: Grain> Clone for GrainRef<G> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            runtime: self.runtime.clone(),
        }
    }
}

impl<G: Grain> GrainRef<G> {
    /// The key this reference addresses.
    pub fn key(&self) -> &GrainKey {
        &self.key
    }

    /// Call the grain.
    ///
    /// Queues behind any call already in flight for the same key. Returns
    /// [`GrainError::Cancelled`] as soon as `cancel` fires, whether the call
    /// is still queued or already running.
    pub async fn call(
        &self,
        request: G::Request,
        cancel: &CancellationToken,
    ) -> Result<G::Response, GrainError> {
        if cancel.is_cancelled() {
            return Err(GrainError::Cancelled);
        }

        let (reply, response) = oneshot::channel();
        let envelope = Envelope {
            request,
            cancel: cancel.clone(),
            reply,
        };

        {
            let directory = &self.runtime.inner.directory;
            let activation = self.runtime.activation_for(&self.key);
            activation.enqueue(envelope, directory.touch(), self.runtime.inner.clock.now())?;
        }

        tokio::select! {
            biased;
            response = response => response.unwrap_or(Err(GrainError::Deactivated)),
            _ = cancel.cancelled() => Err(GrainError::Cancelled),
        }
    }
}

impl<G: Grain> std::fmt::Debug for GrainRef<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrainRef").field("key", &self.key).finish()
    }
}
