//! Cache validity windows.
//!
//! Two instants share a window iff truncating both to the bucket width
//! gives the same value. With the default one-minute width this is "same
//! UTC calendar minute": `12:00:00` and `12:00:59` share a window while
//! `12:00:59` and `12:01:00` do not, even though they are one second apart.
//! The date takes part in the comparison, so the same minute on two
//! different days never matches.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};

/// Whether a value computed at `last_computed_at` is still valid at `now`.
///
/// An absent timestamp, a non-positive bucket width, or a timestamp that
/// cannot be truncated all count as invalid, forcing a recompute.
pub fn is_still_valid(
    last_computed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    bucket_width: TimeDelta,
) -> bool {
    let Some(last) = last_computed_at else {
        return false;
    };
    if bucket_width <= TimeDelta::zero() {
        return false;
    }

    match (
        last.duration_trunc(bucket_width),
        now.duration_trunc(bucket_width),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Parameters of the candidate cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Width of a validity window.
    pub bucket_width: TimeDelta,
    /// Number of candidates drawn per window.
    pub max_candidates: usize,
    /// Corpora smaller than this are never sampled.
    pub min_corpus: u64,
}

/// One-minute windows, six candidates, corpora of at least 100 entries.
impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            bucket_width: TimeDelta::minutes(1),
            max_candidates: 6,
            min_corpus: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_absent_timestamp_is_invalid() {
        assert!(!is_still_valid(None, at(12, 0, 0), TimeDelta::minutes(1)));
    }

    #[test]
    fn test_same_minute_is_valid() {
        assert!(is_still_valid(Some(at(12, 0, 0)), at(12, 0, 59), TimeDelta::minutes(1)));
        assert!(is_still_valid(Some(at(12, 0, 10)), at(12, 0, 20), TimeDelta::minutes(1)));
    }

    #[test]
    fn test_minute_boundary_invalidates_even_one_second_apart() {
        // Boundary sensitivity: validity follows calendar minutes, not elapsed time.
        assert!(!is_still_valid(Some(at(12, 0, 59)), at(12, 1, 0), TimeDelta::minutes(1)));
    }

    #[test]
    fn test_fifty_nine_seconds_apart_can_go_either_way() {
        assert!(is_still_valid(Some(at(12, 0, 0)), at(12, 0, 59), TimeDelta::minutes(1)));
        assert!(!is_still_valid(Some(at(12, 0, 30)), at(12, 1, 29), TimeDelta::minutes(1)));
    }

    #[test]
    fn test_same_minute_on_another_day_is_invalid() {
        let yesterday = at(12, 0, 0) - TimeDelta::days(1);
        assert!(!is_still_valid(Some(yesterday), at(12, 0, 0), TimeDelta::minutes(1)));
    }

    #[test]
    fn test_non_positive_bucket_is_invalid() {
        assert!(!is_still_valid(
            Some(at(12, 0, 0)),
            at(12, 0, 0),
            TimeDelta::zero()
        ));
    }

    #[test]
    fn test_wider_buckets() {
        let hour = TimeDelta::hours(1);
        assert!(is_still_valid(Some(at(12, 0, 0)), at(12, 59, 59), hour));
        assert!(!is_still_valid(Some(at(12, 59, 59)), at(13, 0, 0), hour));
    }
}
