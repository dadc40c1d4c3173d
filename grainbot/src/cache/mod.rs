//! Time-bucketed randomized candidate cache.
//!
//! [`policy`] decides whether a previously computed set is still valid;
//! [`CandidateCache`] applies that decision to a grain's candidate state.

pub mod cell;
pub mod policy;

pub use cell::{CandidateCache, CandidateSet};
pub use policy::{is_still_valid, CachePolicy};
