//! Common imports.
//!
//! ```rust
//! use grainbot::prelude::*;
//! ```

pub use crate::bot::{
    BotTransport, CommandHandler, ErrorReporter, InMemoryJokeSource, InlineResult, JokeSource,
    JsonLinesTransport, LogErrorReporter, ReplyErrorReporter, TextMessage, Update,
    UpdateDispatcher,
};
pub use crate::cache::{CachePolicy, CandidateCache};
pub use crate::cancel::{CallScope, CancellationBridge};
pub use crate::config::{BotConfig, BotConfigBuilder};
pub use crate::error::{
    ConfigError, DispatchError, GrainError, HandlerError, SourceError, TransportError,
};
pub use crate::grain::{Grain, GrainContext, GrainKey, GrainRef, GrainRuntime};
pub use crate::time::{Clock, ManualClock, SystemClock};
