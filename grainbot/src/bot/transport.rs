//! Outbound collaborators: the platform transport and error reporting.

use std::rc::Rc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{HandlerError, TransportError};

use super::update::{InlineResult, TextMessage};

/// Outbound half of the bot platform.
#[async_trait(?Send)]
pub trait BotTransport {
    /// Answer inline query `query_id` with `results`, in order.
    async fn answer_inline_query(
        &self,
        query_id: &str,
        results: Vec<InlineResult>,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError>;

    /// Send a text message to `chat_id`.
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError>;
}

/// Receives command handler faults before they are re-raised.
///
/// Never sees cancellations.
#[async_trait(?Send)]
pub trait ErrorReporter {
    /// Report `error`, raised while handling `message`.
    async fn report(&self, error: &HandlerError, message: &TextMessage, cancel: &CancellationToken);
}

/// Reporter that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogErrorReporter;

#[async_trait(?Send)]
impl ErrorReporter for LogErrorReporter {
    async fn report(&self, error: &HandlerError, message: &TextMessage, _cancel: &CancellationToken) {
        tracing::warn!(
            chat_id = message.chat_id,
            message_id = message.message_id,
            error = %error,
            "command failed"
        );
    }
}

/// Reporter that tells the user something went wrong.
pub struct ReplyErrorReporter {
    transport: Rc<dyn BotTransport>,
}

impl ReplyErrorReporter {
    /// Reply through `transport`.
    pub fn new(transport: Rc<dyn BotTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait(?Send)]
impl ErrorReporter for ReplyErrorReporter {
    async fn report(&self, error: &HandlerError, message: &TextMessage, cancel: &CancellationToken) {
        tracing::debug!(chat_id = message.chat_id, error = %error, "replying with failure notice");
        if let Err(e) = self
            .transport
            .send_message(message.chat_id, "Sorry, something went wrong.", cancel)
            .await
        {
            tracing::warn!(chat_id = message.chat_id, error = %e, "failed to send failure notice");
        }
    }
}
