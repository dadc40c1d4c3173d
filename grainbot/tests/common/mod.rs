//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use grainbot::bot::{
    BotTransport, EntityKind, ErrorReporter, InlineQuery, InlineResult, JokeSource,
    MessageEntity, OutboundAction, TextMessage, Update, User,
};
use grainbot::error::{HandlerError, SourceError, TransportError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn jokes(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("joke #{i}")).collect()
}

/// Text message whose leading word is marked as a bot command when it
/// starts with `/`.
pub fn command_update(update_id: i64, chat_id: i64, text: &str) -> Update {
    let first = text.split_whitespace().next().unwrap_or("");
    let entities = if first.starts_with('/') {
        vec![MessageEntity {
            kind: EntityKind::BotCommand,
            offset: 0,
            length: first.encode_utf16().count(),
        }]
    } else {
        Vec::new()
    };

    Update {
        update_id,
        message: Some(TextMessage {
            message_id: update_id,
            chat_id,
            from: Some(User {
                id: 42,
                username: Some("alice".to_string()),
            }),
            text: text.to_string(),
            entities,
        }),
        inline_query: None,
    }
}

pub fn inline_update(update_id: i64, from: i64, query: &str) -> Update {
    Update {
        update_id,
        message: None,
        inline_query: Some(InlineQuery {
            id: format!("q{update_id}"),
            from: User {
                id: from,
                username: None,
            },
            query: query.to_string(),
        }),
    }
}

/// Records every outbound call.
#[derive(Default)]
pub struct RecordingTransport {
    pub actions: RefCell<Vec<OutboundAction>>,
}

impl RecordingTransport {
    pub fn messages(&self) -> Vec<(i64, String)> {
        self.actions
            .borrow()
            .iter()
            .filter_map(|a| match a {
                OutboundAction::SendMessage { chat_id, text } => Some((*chat_id, text.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn answers(&self) -> Vec<(String, Vec<InlineResult>)> {
        self.actions
            .borrow()
            .iter()
            .filter_map(|a| match a {
                OutboundAction::AnswerInlineQuery { query_id, results } => {
                    Some((query_id.clone(), results.clone()))
                }
                _ => None,
            })
            .collect()
    }
}

#[async_trait(?Send)]
impl BotTransport for RecordingTransport {
    async fn answer_inline_query(
        &self,
        query_id: &str,
        results: Vec<InlineResult>,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        self.actions
            .borrow_mut()
            .push(OutboundAction::AnswerInlineQuery {
                query_id: query_id.to_string(),
                results,
            });
        Ok(())
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        self.actions.borrow_mut().push(OutboundAction::SendMessage {
            chat_id,
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Counts reports.
#[derive(Default)]
pub struct CountingReporter {
    pub reports: Cell<usize>,
}

#[async_trait(?Send)]
impl ErrorReporter for CountingReporter {
    async fn report(&self, _error: &HandlerError, _message: &TextMessage, _cancel: &CancellationToken) {
        self.reports.set(self.reports.get() + 1);
    }
}

/// Joke source whose fetches block until released.
pub struct GatedSource {
    pub total: u64,
    pub gate: Rc<Notify>,
}

#[async_trait(?Send)]
impl JokeSource for GatedSource {
    async fn total(&self) -> Result<u64, SourceError> {
        Ok(self.total)
    }

    async fn joke(&self, id: u64) -> Result<String, SourceError> {
        self.gate.notified().await;
        Ok(format!("joke #{id}"))
    }
}
