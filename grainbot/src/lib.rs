//! # Grainbot
//!
//! A chat bot front end built on in-process virtual actors ("grains").
//!
//! Inbound updates are decoded, classified, and routed either to a command
//! handler or to a per-key grain. Grains are activated lazily, own their
//! state exclusively, and process one call at a time, so two concurrent
//! calls for the same key never race while unrelated keys never block each
//! other.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  bot::UpdateDispatcher                                      │
//! │   • classifies updates, resolves commands                   │
//! │   • one local task per update (failure isolation)           │
//! │   • CancellationBridge: session token → per-call scope      │
//! ├──────────────────────────┬──────────────────────────────────┤
//! │  grain::GrainRuntime     │  bot::CommandTable               │
//! │  • key → activation      │  • "/cmd@bot" → handler          │
//! │  • one mailbox per key   │                                  │
//! │  • LRU + idle eviction   │                                  │
//! ├──────────────────────────┴──────────────────────────────────┤
//! │  cache::CandidateCache + cache::policy                      │
//! │  time-bucketed randomized candidate cache                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Orleans Model
//!
//! Grains follow Orleans' turn-based concurrency: an activation dequeues a
//! call, runs it to completion, replies, then takes the next one. There is
//! no explicit destroy; an evicted activation is simply re-created on the
//! next call, starting from empty state.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use grainbot::prelude::*;
//!
//! let config = BotConfig::builder().bot_username("mybot").build()?;
//! let dispatcher = UpdateDispatcher::builder(config, transport, source)
//!     .error_reporter(reporter)
//!     .build();
//!
//! tokio::task::LocalSet::new()
//!     .run_until(dispatcher.run(updates, session_token))
//!     .await;
//! ```

#![deny(missing_docs)]

pub mod bot;
pub mod cache;
pub mod cancel;
pub mod config;
pub mod error;
pub mod grain;
pub mod prelude;
pub mod time;
