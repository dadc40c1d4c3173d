//! Bot front end: updates, commands, jokes, and the dispatcher.
//!
//! - [`update`]: inbound wire types
//! - [`command`]: `/command@bot` resolution and the command table
//! - [`transport`]: outbound platform calls and error reporting
//! - [`jokes`]: the cached joke grain and `/joke`
//! - [`dispatcher`]: routes updates, one isolated task each
//! - [`stdio`]: JSON-lines transport and the threaded update reader

pub mod command;
pub mod dispatcher;
pub mod jokes;
pub mod stdio;
pub mod transport;
pub mod update;

pub use command::{resolve_command, CommandHandler, CommandResolution, CommandTable, ParsedCommand};
pub use dispatcher::{inline_query_key, UpdateDispatcher, UpdateDispatcherBuilder};
pub use jokes::{InMemoryJokeSource, Joke, JokeCommand, JokeGrain, JokeSource, DAD_JOKE_KEY};
pub use stdio::{spawn_json_lines_reader, JsonLinesTransport, OutboundAction};
pub use transport::{BotTransport, ErrorReporter, LogErrorReporter, ReplyErrorReporter};
pub use update::{
    EntityKind, InlineQuery, InlineResult, MessageEntity, TextMessage, Update, UpdateKind, User,
};
