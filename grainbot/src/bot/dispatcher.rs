//! Update dispatcher.
//!
//! The dispatcher receives updates one at a time and hands each to its own
//! local task, so a slow grain call or upstream request never holds up the
//! receive loop. Per update:
//!
//! ```text
//! Update ──▶ Message ── leading /command? ──▶ resolve ──▶ handler(scope)
//!        │                                       └─ not for us ─▶ skip
//!        ├─▶ InlineQuery ── blank? ─▶ skip
//!        │        └─▶ key "query|user" ─▶ JokeGrain(scope) ─▶ answer(session)
//!        └─▶ Other ─▶ skip
//! ```
//!
//! # Failure isolation
//!
//! Every update runs behind a boundary that logs its error and swallows it,
//! so a failing update never stops the loop. Cancellation is not a failure:
//! it is logged at debug level and never reaches the [`ErrorReporter`].

use std::rc::Rc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::cancel::CancellationBridge;
use crate::config::BotConfig;
use crate::error::DispatchError;
use crate::grain::{GrainKey, GrainRuntime};
use crate::time::{Clock, SystemClock};

use super::command::{CommandHandler, CommandResolution, CommandTable};
use super::jokes::{JokeCommand, JokeGrain, JokeSource, DAD_JOKE_KEY};
use super::transport::{BotTransport, ErrorReporter, LogErrorReporter};
use super::update::{InlineQuery, InlineResult, TextMessage, Update, UpdateKind};

/// Grain key for an inline query, or `None` for a blank query.
///
/// The query is trimmed and lowercased so that `"  Hello World  "` and
/// `"hello world"` from the same user share one grain.
pub fn inline_query_key(query: &str, requester_id: i64) -> Option<GrainKey> {
    let normalized = query.trim().to_lowercase();
    if normalized.is_empty() {
        None
    } else {
        Some(GrainKey::new(format!("{normalized}|{requester_id}")))
    }
}

struct DispatcherInner {
    config: BotConfig,
    commands: CommandTable,
    jokes: GrainRuntime<JokeGrain>,
    transport: Rc<dyn BotTransport>,
    reporter: Rc<dyn ErrorReporter>,
}

/// Routes updates to command handlers and grains.
#[derive(Clone)]
pub struct UpdateDispatcher {
    inner: Rc<DispatcherInner>,
}

impl UpdateDispatcher {
    /// Start building a dispatcher.
    pub fn builder(
        config: BotConfig,
        transport: Rc<dyn BotTransport>,
        source: Rc<dyn JokeSource>,
    ) -> UpdateDispatcherBuilder {
        UpdateDispatcherBuilder {
            config,
            transport,
            source,
            reporter: None,
            clock: None,
            commands: CommandTable::new(),
        }
    }

    /// The joke grain runtime.
    pub fn jokes(&self) -> &GrainRuntime<JokeGrain> {
        &self.inner.jokes
    }

    /// Registered commands.
    pub fn commands(&self) -> &CommandTable {
        &self.inner.commands
    }

    /// Receive and dispatch updates until `session` is cancelled or the
    /// stream ends.
    ///
    /// On end of stream, in-flight updates are drained before returning. On
    /// cancellation they observe their derived tokens and wind down on
    /// their own. Must run inside a `LocalSet`.
    pub async fn run(&self, mut updates: mpsc::Receiver<Update>, session: CancellationToken) {
        let bridge = CancellationBridge::new(session.clone());
        let sweeper = self
            .inner
            .jokes
            .spawn_idle_sweeper(self.inner.config.sweep_interval(), session.child_token());
        let mut in_flight = JoinSet::new();

        tracing::info!(
            bot = self.inner.config.bot_username(),
            commands = ?self.inner.commands.tokens(),
            "dispatcher started"
        );

        loop {
            tokio::select! {
                biased;
                _ = session.cancelled() => {
                    tracing::info!("session cancelled, stopping receive loop");
                    break;
                }
                Some(joined) = in_flight.join_next() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!("update handler panicked");
                        }
                    }
                }
                update = updates.recv() => {
                    let Some(update) = update else {
                        tracing::info!("update stream closed");
                        break;
                    };
                    let dispatcher = self.clone();
                    let bridge = bridge.clone();
                    in_flight.spawn_local(async move {
                        dispatcher.dispatch_isolated(update, &bridge).await;
                    });
                }
            }
        }

        if !session.is_cancelled() {
            while let Some(joined) = in_flight.join_next().await {
                if matches!(&joined, Err(e) if e.is_panic()) {
                    tracing::error!("update handler panicked");
                }
            }
        } else {
            in_flight.detach_all();
        }
        sweeper.abort();
        tracing::info!("dispatcher stopped");
    }

    /// Handle one update behind the isolation boundary.
    ///
    /// Never fails: faults are logged, cancellation is noted.
    pub async fn dispatch_isolated(&self, update: Update, bridge: &CancellationBridge) {
        let update_id = update.update_id;
        match self.handle_update(update, bridge).await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {
                tracing::debug!(update_id, "update handling cancelled");
            }
            Err(e) => {
                tracing::error!(update_id, error = %e, "update handling failed");
            }
        }
    }

    /// Handle one update, returning its error.
    pub async fn handle_update(
        &self,
        update: Update,
        bridge: &CancellationBridge,
    ) -> Result<(), DispatchError> {
        let update_id = update.update_id;
        match update.into_kind() {
            UpdateKind::Message(message) => self.on_message(message, bridge).await,
            UpdateKind::InlineQuery(query) => self.on_inline_query(query, bridge).await,
            UpdateKind::Other => {
                tracing::trace!(update_id, "ignoring update");
                Ok(())
            }
        }
    }

    async fn on_message(
        &self,
        message: TextMessage,
        bridge: &CancellationBridge,
    ) -> Result<(), DispatchError> {
        let Some(entity) = message.leading_command() else {
            return Ok(());
        };

        let commands = &self.inner.commands;
        let command = match commands.resolve(&message.text, entity, self.inner.config.bot_username()) {
            CommandResolution::Resolved(command) => command,
            CommandResolution::WrongAddressee { target } => {
                tracing::debug!(%target, "command addressed to another bot");
                return Ok(());
            }
            CommandResolution::NotACommand => return Ok(()),
        };
        let Some(handler) = commands.get(&command.token) else {
            return Ok(());
        };

        let result = {
            let scope = bridge.scope();
            handler.handle(&message, scope.token()).await
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() => Err(DispatchError::Cancelled),
            Err(e) => {
                self.inner
                    .reporter
                    .report(&e, &message, bridge.session())
                    .await;
                tracing::error!(
                    command = %command.token,
                    chat_id = message.chat_id,
                    error = %e,
                    "command handler failed"
                );
                Err(DispatchError::Handler(e))
            }
        }
    }

    async fn on_inline_query(
        &self,
        query: InlineQuery,
        bridge: &CancellationBridge,
    ) -> Result<(), DispatchError> {
        let Some(key) = inline_query_key(&query.query, query.from.id) else {
            tracing::trace!(query_id = %query.id, "ignoring blank inline query");
            return Ok(());
        };

        let jokes = {
            let scope = bridge.scope();
            self.inner.jokes.resolve(key).call((), scope.token()).await?
        };
        let results: Vec<InlineResult> = jokes.iter().map(InlineResult::from).collect();

        // The call scope is gone by now; the answer still belongs to the session.
        self.inner
            .transport
            .answer_inline_query(&query.id, results, bridge.session())
            .await?;
        Ok(())
    }
}

/// Builder for [`UpdateDispatcher`].
pub struct UpdateDispatcherBuilder {
    config: BotConfig,
    transport: Rc<dyn BotTransport>,
    source: Rc<dyn JokeSource>,
    reporter: Option<Rc<dyn ErrorReporter>>,
    clock: Option<Rc<dyn Clock>>,
    commands: CommandTable,
}

impl UpdateDispatcherBuilder {
    /// Report handler faults to `reporter` (defaults to [`LogErrorReporter`]).
    pub fn error_reporter(mut self, reporter: Rc<dyn ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Read time from `clock` (defaults to [`SystemClock`]).
    pub fn clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Bind an additional command. Overrides the built-in `/joke` if named
    /// `joke`.
    pub fn command(mut self, name: &str, handler: Rc<dyn CommandHandler>) -> Self {
        self.commands.register(name, handler);
        self
    }

    /// Build the dispatcher.
    pub fn build(self) -> UpdateDispatcher {
        let clock = self.clock.unwrap_or_else(|| Rc::new(SystemClock));
        let policy = self.config.policy();
        let seed = self.config.rng_seed();
        let source = self.source;

        let jokes = GrainRuntime::new(
            move |_key: &GrainKey| {
                let rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_rng(&mut rand::rng()),
                };
                JokeGrain::new(policy, source.clone(), rng)
            },
            clock,
            self.config.limits(),
        );

        let mut commands = CommandTable::new();
        commands.register(
            "joke",
            Rc::new(JokeCommand::new(
                jokes.resolve(DAD_JOKE_KEY),
                self.transport.clone(),
            )),
        );
        for token in self.commands.tokens() {
            if let Some(handler) = self.commands.get(token) {
                commands.register(token, handler);
            }
        }

        UpdateDispatcher {
            inner: Rc::new(DispatcherInner {
                config: self.config,
                commands,
                jokes,
                transport: self.transport,
                reporter: self.reporter.unwrap_or_else(|| Rc::new(LogErrorReporter)),
            }),
        }
    }
}
