//! JSON-lines transport.
//!
//! Inbound: one [`Update`] per line. Outbound: one [`OutboundAction`] per
//! line, tagged by `action`:
//!
//! ```text
//! {"action":"send_message","chat_id":99,"text":"..."}
//! {"action":"answer_inline_query","query_id":"q1","results":[...]}
//! ```
//!
//! Lets the bot run against a pipe, which is how the binary and the
//! integration tests drive it. Updates are read on a plain thread so a
//! blocked stdin never holds the runtime open.

use std::io::BufRead;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;

use super::transport::BotTransport;
use super::update::{InlineResult, Update};

/// One outbound platform call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OutboundAction {
    /// Answer to an inline query.
    AnswerInlineQuery {
        /// Query being answered.
        query_id: String,
        /// Offered results, in order.
        results: Vec<InlineResult>,
    },
    /// A text message.
    SendMessage {
        /// Destination chat.
        chat_id: i64,
        /// Message text.
        text: String,
    },
}

/// [`BotTransport`] writing one JSON action per line to `W`.
pub struct JsonLinesTransport<W> {
    writer: Mutex<W>,
}

impl<W: AsyncWrite + Unpin> JsonLinesTransport<W> {
    /// Write actions to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Take back the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    async fn emit(
        &self,
        action: &OutboundAction,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        let mut line = serde_json::to_vec(action)?;
        line.push(b'\n');

        let mut writer = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            writer = self.writer.lock() => writer,
        };
        // A line is never abandoned half-written.
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[async_trait(?Send)]
impl<W: AsyncWrite + Unpin> BotTransport for JsonLinesTransport<W> {
    async fn answer_inline_query(
        &self,
        query_id: &str,
        results: Vec<InlineResult>,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        tracing::debug!(query_id, results = results.len(), "answering inline query");
        let action = OutboundAction::AnswerInlineQuery {
            query_id: query_id.to_string(),
            results,
        };
        self.emit(&action, cancel).await
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        tracing::debug!(chat_id, "sending message");
        let action = OutboundAction::SendMessage {
            chat_id,
            text: text.to_string(),
        };
        self.emit(&action, cancel).await
    }
}

/// Decode updates from `reader`, one per line, into `updates`, on a
/// dedicated thread.
///
/// Blank lines are skipped and malformed lines are logged and skipped.
/// Stops at end of input, on a read error, when the receiver is dropped, or
/// at the first line read after `cancel` fires; `updates` is dropped on
/// return, closing the stream.
///
/// Reading blocks an OS thread the runtime does not own, so shutdown never
/// waits on a read that may not return (stdin left open by the parent).
/// Callers that are shutting down drop the handle instead of joining it.
pub fn spawn_json_lines_reader<R>(
    reader: R,
    updates: mpsc::Sender<Update>,
    cancel: CancellationToken,
) -> std::io::Result<std::thread::JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    std::thread::Builder::new()
        .name("grainbot-updates".to_string())
        .spawn(move || {
            let mut line_no = 0u64;
            for line in reader.lines() {
                if cancel.is_cancelled() {
                    tracing::debug!(lines = line_no, "update reader cancelled");
                    return;
                }
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to read update input");
                        return;
                    }
                };
                line_no += 1;
                if line.trim().is_empty() {
                    continue;
                }

                let update = match serde_json::from_str::<Update>(&line) {
                    Ok(update) => update,
                    Err(e) => {
                        tracing::warn!(line = line_no, error = %e, "skipping malformed update");
                        continue;
                    }
                };
                if updates.blocking_send(update).is_err() {
                    tracing::debug!("update receiver dropped");
                    return;
                }
            }
            tracing::debug!(lines = line_no, "update input exhausted");
        })
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    use tokio::sync::mpsc::error::TryRecvError;

    use super::*;

    #[tokio::test]
    async fn test_actions_are_written_as_lines() {
        let transport = JsonLinesTransport::new(Vec::new());
        let token = CancellationToken::new();

        transport.send_message(99, "hi", &token).await.expect("send");
        transport
            .answer_inline_query(
                "q1",
                vec![InlineResult {
                    id: "1".to_string(),
                    title: "t".to_string(),
                    text: "body".to_string(),
                }],
                &token,
            )
            .await
            .expect("answer");

        let out = String::from_utf8(transport.into_inner()).expect("utf8");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            r#"{"action":"send_message","chat_id":99,"text":"hi"}"#
        );
        let answer: OutboundAction = serde_json::from_str(lines[1]).expect("decode");
        assert!(matches!(
            answer,
            OutboundAction::AnswerInlineQuery { ref query_id, ref results }
                if query_id == "q1" && results.len() == 1
        ));
    }

    #[tokio::test]
    async fn test_cancelled_send_writes_nothing() {
        let transport = JsonLinesTransport::new(Vec::new());
        let token = CancellationToken::new();
        token.cancel();

        let err = transport.send_message(1, "late", &token).await.unwrap_err();

        assert!(matches!(err, TransportError::Cancelled));
        assert!(transport.into_inner().is_empty());
    }

    #[test]
    fn test_reader_skips_malformed_lines() {
        let input = std::io::Cursor::new(b"{\"update_id\": 1}\nnot json\n\n{\"update_id\": 2}\n".to_vec());
        let (tx, mut rx) = mpsc::channel(8);

        spawn_json_lines_reader(input, tx, CancellationToken::new())
            .expect("spawn reader")
            .join()
            .expect("reader thread");

        assert_eq!(rx.try_recv().map(|u| u.update_id), Ok(1));
        assert_eq!(rx.try_recv().map(|u| u.update_id), Ok(2));
        assert_eq!(rx.try_recv().map(|u| u.update_id), Err(TryRecvError::Disconnected));
    }

    /// Input that blocks until bytes are pushed, like a terminal on stdin.
    /// Reads end of input once the pushing side is dropped.
    struct HeldOpenInput(std_mpsc::Receiver<Vec<u8>>);

    impl Read for HeldOpenInput {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.0.recv() {
                Ok(bytes) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    Ok(n)
                }
                Err(_) => Ok(0),
            }
        }
    }

    #[test]
    fn test_runtime_shuts_down_while_input_is_held_open() {
        let (push, held) = std_mpsc::channel::<Vec<u8>>();
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = std_mpsc::channel();

        let reader_cancel = cancel.clone();
        let runtime_thread = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime");
            let reader = runtime.block_on(async move {
                let reader = spawn_json_lines_reader(
                    std::io::BufReader::new(HeldOpenInput(held)),
                    tx,
                    reader_cancel.clone(),
                )
                .expect("spawn reader");
                reader_cancel.cancel();
                reader
            });
            drop(runtime);
            done_tx.send(()).expect("signal shutdown");
            reader
        });

        done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("runtime dropped while the reader was blocked");
        let reader = runtime_thread.join().expect("runtime thread");

        // The next line wakes the reader, which sees the cancel and stops
        // without forwarding it.
        push.send(b"{\"update_id\": 1}\n".to_vec()).expect("push");
        reader.join().expect("reader thread");
        assert_eq!(
            rx.try_recv().map(|u| u.update_id),
            Err(TryRecvError::Disconnected)
        );
    }
}
