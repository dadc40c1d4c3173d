//! Local activation directory with bounded size.
//!
//! Maps each [`GrainKey`] to its live activation. Growth is bounded two
//! ways:
//!
//! - **Capacity**: activating a new key while at `max_activations` evicts
//!   the least recently used idle activation.
//! - **Idle expiry**: [`ActivationDirectory::deactivate_idle`] drops idle
//!   activations unused for longer than `idle_timeout`, plus activations
//!   whose loop stopped (a grain that panicked).
//!
//! Only idle activations (no queued or running call) are ever evicted, so a
//! key never has two live activations at once. When every activation is
//! busy the directory temporarily exceeds its cap rather than break that
//! rule.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use chrono::{DateTime, TimeDelta, Utc};

use super::activation::Activation;
use super::traits::Grain;
use super::types::{ActivationId, GrainKey};

/// Bounds on the number and lifetime of activations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationLimits {
    /// Maximum number of live activations before LRU eviction kicks in.
    pub max_activations: usize,
    /// Idle time after which an activation may be swept.
    pub idle_timeout: TimeDelta,
}

impl Default for ActivationLimits {
    fn default() -> Self {
        Self {
            max_activations: 10_000,
            idle_timeout: TimeDelta::minutes(10),
        }
    }
}

pub(crate) struct ActivationDirectory<G: Grain> {
    activations: RefCell<HashMap<GrainKey, Rc<Activation<G>>>>,
    limits: ActivationLimits,
    /// Monotonic counter ordering touches for LRU.
    tick: Cell<u64>,
    next_activation_id: Cell<u64>,
}

impl<G: Grain> ActivationDirectory<G> {
    pub(crate) fn new(limits: ActivationLimits) -> Self {
        Self {
            activations: RefCell::new(HashMap::new()),
            limits,
            tick: Cell::new(0),
            next_activation_id: Cell::new(1),
        }
    }

    pub(crate) fn limits(&self) -> &ActivationLimits {
        &self.limits
    }

    pub(crate) fn len(&self) -> usize {
        self.activations.borrow().len()
    }

    /// Advance and return the LRU tick.
    pub(crate) fn touch(&self) -> u64 {
        let next = self.tick.get() + 1;
        self.tick.set(next);
        next
    }

    /// Find the live activation for `key`, or create one with `activate`.
    ///
    /// Synchronous on purpose: no await point separates the lookup from the
    /// insert, so two callers cannot both miss and activate the same key.
    pub(crate) fn get_or_activate(
        &self,
        key: &GrainKey,
        activate: impl FnOnce(ActivationId, u64) -> Rc<Activation<G>>,
    ) -> Rc<Activation<G>> {
        if let Some(existing) = self.activations.borrow().get(key) {
            if existing.is_alive() {
                return existing.clone();
            }
        }

        if let Some(dead) = self.activations.borrow_mut().remove(key) {
            tracing::warn!(key = %key, activation = %dead.id(), "replacing stopped activation");
        }

        if self.len() >= self.limits.max_activations {
            self.evict_lru();
        }

        let id = ActivationId(self.next_activation_id.get());
        self.next_activation_id.set(id.0 + 1);
        let activation = activate(id, self.touch());
        self.activations
            .borrow_mut()
            .insert(key.clone(), activation.clone());
        activation
    }

    /// Evict the least recently used idle activation, if any.
    fn evict_lru(&self) {
        let mut activations = self.activations.borrow_mut();
        // Linear scan; eviction only runs on activation at capacity.
        let victim = activations
            .iter()
            .filter(|(_, a)| a.is_idle())
            .min_by_key(|(_, a)| a.last_touch())
            .map(|(k, _)| k.clone());

        match victim {
            Some(key) => {
                if let Some(evicted) = activations.remove(&key) {
                    tracing::debug!(key = %key, activation = %evicted.id(), "evicting least recently used grain");
                }
            }
            None => tracing::warn!(
                live = activations.len(),
                max = self.limits.max_activations,
                "all activations busy, exceeding capacity"
            ),
        }
    }

    /// Drop idle activations unused since before `now - idle_timeout`, and
    /// any activation whose message loop has stopped.
    pub(crate) fn deactivate_idle(&self, now: DateTime<Utc>) -> usize {
        let mut activations = self.activations.borrow_mut();
        let before = activations.len();
        activations.retain(|key, activation| {
            if !activation.is_alive() {
                tracing::debug!(key = %key, activation = %activation.id(), "dropping stopped activation");
                return false;
            }
            let expired = activation.is_idle()
                && now - activation.last_used_at() >= self.limits.idle_timeout;
            if expired {
                tracing::debug!(key = %key, activation = %activation.id(), "deactivating idle grain");
            }
            !expired
        });
        before - activations.len()
    }
}
