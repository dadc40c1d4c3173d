//! Per-grain candidate state.
//!
//! A [`CandidateCache`] holds the identifiers drawn for the current window,
//! the instant they were drawn, and the corpus size once it is known. It is
//! plain data: exclusive access comes from the grain activation that owns it.

use std::collections::BTreeSet;
use std::future::Future;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::error::SourceError;

use super::policy::{is_still_valid, CachePolicy};

/// Identifiers drawn for one window, in ascending order.
pub type CandidateSet = BTreeSet<u64>;

/// Randomized candidate cache with a time-bucketed validity window.
///
/// # Invariants
///
/// - `known_total`, once learned, never changes for this instance.
/// - `candidates.len() <= policy.max_candidates`.
/// - State is only written after the last await point of a call, so an
///   abandoned call never leaves a half-updated cache behind.
#[derive(Debug, Clone, Default)]
pub struct CandidateCache {
    policy: CachePolicy,
    candidates: CandidateSet,
    last_computed_at: Option<DateTime<Utc>>,
    known_total: Option<u64>,
}

impl CandidateCache {
    /// Create an empty cache.
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// The policy this cache applies.
    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Candidates drawn in the most recent window.
    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    /// When the current candidates were drawn.
    pub fn last_computed_at(&self) -> Option<DateTime<Utc>> {
        self.last_computed_at
    }

    /// Corpus size, once learned.
    pub fn known_total(&self) -> Option<u64> {
        self.known_total
    }

    /// Return the cached candidates if still valid, otherwise draw new ones.
    ///
    /// `learn_total` is only awaited while the corpus size is unknown. Its
    /// failures are transient: they yield an empty set and leave the cache
    /// untouched so the next call asks again. Corpora below
    /// `policy.min_corpus` always yield an empty set and are never stamped
    /// as a valid window.
    pub async fn get_or_compute<F, Fut, R>(
        &mut self,
        now: DateTime<Utc>,
        learn_total: F,
        rng: &mut R,
    ) -> CandidateSet
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<u64, SourceError>>,
        R: Rng + ?Sized,
    {
        if !self.candidates.is_empty()
            && is_still_valid(self.last_computed_at, now, self.policy.bucket_width)
        {
            return self.candidates.clone();
        }

        let total = match self.known_total {
            Some(total) => total,
            None => match learn_total().await {
                Ok(0) => {
                    tracing::warn!("corpus reported zero entries, not caching");
                    return CandidateSet::new();
                }
                Ok(total) => {
                    self.known_total = Some(total);
                    total
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to learn corpus size");
                    return CandidateSet::new();
                }
            },
        };

        if total < self.policy.min_corpus {
            tracing::debug!(
                total,
                min_corpus = self.policy.min_corpus,
                "corpus too small to sample without collisions"
            );
            return CandidateSet::new();
        }

        // The set grows up to the cap; a window that already reached it is
        // replaced wholesale.
        let mut next = if self.candidates.len() >= self.policy.max_candidates {
            CandidateSet::new()
        } else {
            self.candidates.clone()
        };
        let target = usize::try_from(total)
            .map_or(self.policy.max_candidates, |t| t.min(self.policy.max_candidates));
        while next.len() < target {
            next.insert(rng.random_range(0..total));
        }

        self.candidates = next;
        self.last_computed_at = Some(now);
        self.candidates.clone()
    }
}
