//! Window behaviour of the candidate cache against a fixed corpus.

mod common;

use std::cell::Cell;

use chrono::TimeDelta;
use grainbot::cache::{CachePolicy, CandidateCache};
use grainbot::error::SourceError;
use grainbot::time::{Clock, ManualClock};
use rand::rngs::StdRng;
use rand::SeedableRng;

async fn total(n: u64, calls: &Cell<usize>) -> Result<u64, SourceError> {
    calls.set(calls.get() + 1);
    Ok(n)
}

#[tokio::test]
async fn test_repeated_calls_within_a_window_are_stable() {
    let clock = ManualClock::new(common::noon());
    let mut cache = CandidateCache::new(CachePolicy::default());
    let mut rng = StdRng::seed_from_u64(11);
    let calls = Cell::new(0);

    let first = cache
        .get_or_compute(clock.now(), || total(500, &calls), &mut rng)
        .await;
    let stamped = cache.last_computed_at();

    clock.advance(TimeDelta::seconds(10));
    let second = cache
        .get_or_compute(clock.now(), || total(500, &calls), &mut rng)
        .await;

    assert_eq!(first.len(), 6);
    assert!(first.iter().all(|id| *id < 500));
    assert_eq!(first, second);
    assert_eq!(cache.last_computed_at(), stamped);
    assert_eq!(calls.get(), 1);
}

#[tokio::test]
async fn test_next_window_redraws_and_restamps() {
    let clock = ManualClock::new(common::noon());
    let mut cache = CandidateCache::new(CachePolicy::default());
    let mut rng = StdRng::seed_from_u64(12);
    let calls = Cell::new(0);

    cache
        .get_or_compute(clock.now(), || total(500, &calls), &mut rng)
        .await;
    clock.advance(TimeDelta::seconds(10));
    cache
        .get_or_compute(clock.now(), || total(500, &calls), &mut rng)
        .await;

    clock.advance(TimeDelta::minutes(1));
    let refreshed = cache
        .get_or_compute(clock.now(), || total(500, &calls), &mut rng)
        .await;

    assert_eq!(refreshed.len(), 6);
    assert_eq!(cache.last_computed_at(), Some(clock.now()));
    // The corpus size is learned once per instance.
    assert_eq!(calls.get(), 1);
    assert_eq!(cache.known_total(), Some(500));
}

#[tokio::test]
async fn test_small_corpus_never_yields_candidates() {
    let clock = ManualClock::new(common::noon());
    let mut cache = CandidateCache::new(CachePolicy::default());
    let mut rng = StdRng::seed_from_u64(13);
    let calls = Cell::new(0);

    for _ in 0..3 {
        let set = cache
            .get_or_compute(clock.now(), || total(5, &calls), &mut rng)
            .await;
        assert!(set.is_empty());
        clock.advance(TimeDelta::minutes(1));
    }

    assert_eq!(cache.last_computed_at(), None);
    assert!(cache.candidates().is_empty());
}
