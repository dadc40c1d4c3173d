//! Command resolution and the command table.
//!
//! Resolution turns the leading `/command[@bot]` entity of a message into a
//! normalized token:
//!
//! ```text
//! "/Flip@MyBot heads"  ──▶ Resolved { token: "flip", target: Some("MyBot") }
//! "/flip@otherbot"     ──▶ WrongAddressee { target: "otherbot" }
//! "hello"              ──▶ NotACommand
//! ```
//!
//! None of these outcomes is an error; the dispatcher silently skips
//! anything that is not resolved to a registered handler.

use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;

use super::update::{MessageEntity, TextMessage};

/// A command addressed to this bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Lowercased command token, without `/` or `@target`.
    pub token: String,
    /// The explicit `@target`, if the command carried one.
    pub target: Option<String>,
}

/// Outcome of resolving a command entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResolution {
    /// A command for this bot.
    Resolved(ParsedCommand),
    /// A command explicitly addressed to another bot.
    WrongAddressee {
        /// The bot the command was meant for.
        target: String,
    },
    /// The span is not a well-formed command.
    NotACommand,
}

/// Resolve the command at `span` in `text` for the bot `self_username`.
///
/// The `@target` comparison and the token are folded with Unicode
/// lowercasing, independent of any locale.
pub fn resolve_command(
    text: &str,
    span: &MessageEntity,
    self_username: &str,
) -> CommandResolution {
    let Some(raw) = utf16_slice(text, span.offset, span.length) else {
        return CommandResolution::NotACommand;
    };
    let Some(body) = raw.strip_prefix('/') else {
        return CommandResolution::NotACommand;
    };

    let (name, target) = match body.split_once('@') {
        Some((name, target)) => (name, Some(target)),
        None => (body, None),
    };
    if name.is_empty() {
        return CommandResolution::NotACommand;
    }

    if let Some(target) = target {
        let me = self_username.trim_start_matches('@');
        if target.to_lowercase() != me.to_lowercase() {
            return CommandResolution::WrongAddressee {
                target: target.to_string(),
            };
        }
    }

    CommandResolution::Resolved(ParsedCommand {
        token: name.to_lowercase(),
        target: target.map(str::to_string),
    })
}

/// Slice `text` by UTF-16 offset and length.
///
/// Returns `None` when the range is out of bounds or splits a surrogate
/// pair.
fn utf16_slice(text: &str, offset: usize, length: usize) -> Option<&str> {
    let end_units = offset.checked_add(length)?;
    let mut units = 0;
    let mut start = None;
    let mut end = None;

    for (byte_idx, ch) in text.char_indices() {
        if units == offset {
            start = Some(byte_idx);
        }
        if units == end_units {
            end = Some(byte_idx);
            break;
        }
        units += ch.len_utf16();
    }
    if units == offset && start.is_none() {
        start = Some(text.len());
    }
    if units == end_units && end.is_none() {
        end = Some(text.len());
    }

    text.get(start?..end?)
}

/// A bound command.
///
/// Handlers are fire-and-forget: they reply through whatever collaborators
/// they hold and surface failures as [`HandlerError`].
#[async_trait(?Send)]
pub trait CommandHandler {
    /// Run the command for `message`, observing `cancel` at await points.
    async fn handle(
        &self,
        message: &TextMessage,
        cancel: &CancellationToken,
    ) -> Result<(), HandlerError>;
}

/// Registered commands, keyed by lowercased token.
#[derive(Default, Clone)]
pub struct CommandTable {
    handlers: HashMap<String, Rc<dyn CommandHandler>>,
}

impl CommandTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` (with or without a leading `/`, any case) to `handler`.
    /// Rebinding a name replaces the previous handler.
    pub fn register(&mut self, name: &str, handler: Rc<dyn CommandHandler>) {
        let token = name.trim_start_matches('/').to_lowercase();
        self.handlers.insert(token, handler);
    }

    /// Resolve like [`resolve_command`], additionally treating commands with
    /// no registered handler as [`CommandResolution::NotACommand`].
    pub fn resolve(
        &self,
        text: &str,
        span: &MessageEntity,
        self_username: &str,
    ) -> CommandResolution {
        match resolve_command(text, span, self_username) {
            CommandResolution::Resolved(command) if !self.handlers.contains_key(&command.token) => {
                tracing::debug!(command = %command.token, "no handler registered");
                CommandResolution::NotACommand
            }
            resolution => resolution,
        }
    }

    /// Handler bound to a resolved token.
    pub fn get(&self, token: &str) -> Option<Rc<dyn CommandHandler>> {
        self.handlers.get(token).cloned()
    }

    /// Registered tokens, sorted.
    pub fn tokens(&self) -> Vec<&str> {
        let mut tokens: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        tokens.sort_unstable();
        tokens
    }
}

impl std::fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandTable")
            .field("tokens", &self.tokens())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::update::EntityKind;

    fn span(offset: usize, length: usize) -> MessageEntity {
        MessageEntity {
            kind: EntityKind::BotCommand,
            offset,
            length,
        }
    }

    fn resolve(text: &str) -> CommandResolution {
        let length = text
            .split_whitespace()
            .next()
            .map_or(0, |w| w.encode_utf16().count());
        resolve_command(text, &span(0, length), "mybot")
    }

    #[test]
    fn test_plain_command() {
        assert_eq!(
            resolve("/flip"),
            CommandResolution::Resolved(ParsedCommand {
                token: "flip".to_string(),
                target: None,
            })
        );
    }

    #[test]
    fn test_command_for_other_bot_is_ignored() {
        assert_eq!(
            resolve("/flip@otherbot"),
            CommandResolution::WrongAddressee {
                target: "otherbot".to_string()
            }
        );
    }

    #[test]
    fn test_addressed_command_matches_case_insensitively() {
        let CommandResolution::Resolved(cmd) = resolve("/flip@MyBot") else {
            panic!("expected resolved command");
        };
        assert_eq!(cmd.token, "flip");
        assert_eq!(cmd.target.as_deref(), Some("MyBot"));
    }

    #[test]
    fn test_token_is_lowercased() {
        let CommandResolution::Resolved(cmd) = resolve("/FLIP heads") else {
            panic!("expected resolved command");
        };
        assert_eq!(cmd.token, "flip");
    }

    #[test]
    fn test_not_a_command() {
        assert_eq!(resolve("flip"), CommandResolution::NotACommand);
        assert_eq!(resolve("/"), CommandResolution::NotACommand);
        assert_eq!(resolve("/@mybot"), CommandResolution::NotACommand);
    }

    #[test]
    fn test_out_of_range_span() {
        assert_eq!(
            resolve_command("/flip", &span(0, 50), "mybot"),
            CommandResolution::NotACommand
        );
    }

    #[test]
    fn test_span_counts_utf16_units() {
        // "😀" is two UTF-16 units; the command starts after it and a space.
        let text = "😀 /joke";
        assert_eq!(utf16_slice(text, 3, 5), Some("/joke"));
        assert_eq!(
            resolve_command(text, &span(3, 5), "mybot"),
            CommandResolution::Resolved(ParsedCommand {
                token: "joke".to_string(),
                target: None,
            })
        );
    }

    #[test]
    fn test_span_splitting_surrogate_pair_is_rejected() {
        assert_eq!(utf16_slice("😀x", 1, 2), None);
    }

    #[test]
    fn test_table_normalizes_names() {
        struct Noop;

        #[async_trait(?Send)]
        impl CommandHandler for Noop {
            async fn handle(
                &self,
                _message: &TextMessage,
                _cancel: &CancellationToken,
            ) -> Result<(), HandlerError> {
                Ok(())
            }
        }

        let mut table = CommandTable::new();
        table.register("/Joke", Rc::new(Noop));

        assert!(table.get("joke").is_some());
        assert!(table.get("flip").is_none());
        assert_eq!(table.tokens(), vec!["joke"]);

        assert!(matches!(
            table.resolve("/JOKE@mybot", &span(0, 11), "mybot"),
            CommandResolution::Resolved(ref cmd) if cmd.token == "joke"
        ));
        assert_eq!(
            table.resolve("/flip", &span(0, 5), "mybot"),
            CommandResolution::NotACommand
        );
    }
}
