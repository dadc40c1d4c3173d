//! In-process virtual actor ("grain") runtime.
//!
//! A grain is addressed by a [`GrainKey`]. The first call for a key
//! activates it through a [`GrainFactory`]; later calls reach the same
//! activation until it is evicted, after which the next call starts over
//! from a fresh instance.
//!
//! # Turn-Based Concurrency
//!
//! ```text
//! GrainRef::call ──▶ ActivationDirectory ──▶ Activation (one per key)
//!                     key → activation         mailbox ──▶ message loop
//!                     LRU + idle eviction                  owns G, one call
//!                                                          at a time
//! ```
//!
//! Each activation owns its grain inside a local task fed by a mailbox, so
//! calls to the same key are processed strictly in arrival order while
//! calls to different keys run on independent tasks. Nothing takes a
//! runtime-wide lock across an await point.
//!
//! All activations are spawned with [`tokio::task::spawn_local`]; the
//! runtime must be driven from inside a [`tokio::task::LocalSet`].

mod activation;
mod directory;
mod runtime;
mod traits;
mod types;

pub use directory::ActivationLimits;
pub use runtime::{GrainRef, GrainRuntime};
pub use traits::{Grain, GrainContext, GrainFactory};
pub use types::{ActivationId, GrainKey};
