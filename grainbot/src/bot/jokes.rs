//! Dad jokes: the cached grain, its upstream source, and the `/joke` command.
//!
//! A [`JokeGrain`] keeps a small randomized selection of joke ids per cache
//! window and remembers the text of the jokes it has already fetched. Inline
//! queries use one grain per `"{query}|{requester}"` key so results stay
//! stable while a user keeps typing; the `/joke` command shares the
//! singleton [`DAD_JOKE_KEY`] grain.

use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::cache::{CachePolicy, CandidateCache};
use crate::error::{GrainError, HandlerError, SourceError};
use crate::grain::{Grain, GrainContext, GrainRef};

use super::command::CommandHandler;
use super::transport::BotTransport;
use super::update::{InlineResult, TextMessage};

/// Key of the singleton grain behind `/joke`.
pub const DAD_JOKE_KEY: &str = "dadjoke";

/// Upstream joke corpus.
#[async_trait(?Send)]
pub trait JokeSource {
    /// Number of jokes in the corpus. Ids range over `0..total`.
    async fn total(&self) -> Result<u64, SourceError>;

    /// Text of joke `id`.
    async fn joke(&self, id: u64) -> Result<String, SourceError>;
}

/// Joke source backed by an in-memory list.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJokeSource {
    jokes: Vec<String>,
}

impl InMemoryJokeSource {
    /// Serve `jokes`, addressed by position.
    pub fn new(jokes: Vec<String>) -> Self {
        Self { jokes }
    }
}

#[async_trait(?Send)]
impl JokeSource for InMemoryJokeSource {
    async fn total(&self) -> Result<u64, SourceError> {
        Ok(self.jokes.len() as u64)
    }

    async fn joke(&self, id: u64) -> Result<String, SourceError> {
        usize::try_from(id)
            .ok()
            .and_then(|idx| self.jokes.get(idx))
            .cloned()
            .ok_or(SourceError::NotFound(id))
    }
}

/// A joke with its corpus id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Joke {
    /// Corpus id.
    pub id: u64,
    /// Joke text.
    pub text: String,
}

impl From<&Joke> for InlineResult {
    fn from(joke: &Joke) -> Self {
        let title: String = joke.text.chars().take(64).collect();
        InlineResult {
            id: joke.id.to_string(),
            title,
            text: joke.text.clone(),
        }
    }
}

/// Grain serving the current window's selection of jokes.
pub struct JokeGrain {
    cache: CandidateCache,
    texts: HashMap<u64, String>,
    source: Rc<dyn JokeSource>,
    rng: StdRng,
}

impl JokeGrain {
    /// Create an empty grain.
    pub fn new(policy: CachePolicy, source: Rc<dyn JokeSource>, rng: StdRng) -> Self {
        Self {
            cache: CandidateCache::new(policy),
            texts: HashMap::new(),
            source,
            rng,
        }
    }
}

#[async_trait(?Send)]
impl Grain for JokeGrain {
    type Request = ();
    type Response = Vec<Joke>;

    async fn handle(&mut self, ctx: &GrainContext, _request: ()) -> Result<Vec<Joke>, GrainError> {
        let source = self.source.clone();
        let ids = self
            .cache
            .get_or_compute(ctx.now, || async move { source.total().await }, &mut self.rng)
            .await;

        let mut fetched = HashMap::new();
        for id in ids.iter().filter(|id| !self.texts.contains_key(*id)) {
            match self.source.joke(*id).await {
                Ok(text) => {
                    fetched.insert(*id, text);
                }
                Err(e) => tracing::warn!(key = %ctx.key, id, error = %e, "failed to fetch joke"),
            }
        }

        // Texts land only once every fetch has returned. The ids are already
        // stamped for this window, so any text missing now (failed fetch or
        // cancelled call) is fetched again on the next call.
        self.texts.extend(fetched);
        self.texts.retain(|id, _| ids.contains(id));

        Ok(ids
            .iter()
            .filter_map(|id| {
                self.texts.get(id).map(|text| Joke {
                    id: *id,
                    text: text.clone(),
                })
            })
            .collect())
    }
}

/// `/joke`: reply with one joke from the shared selection.
pub struct JokeCommand {
    jokes: GrainRef<JokeGrain>,
    transport: Rc<dyn BotTransport>,
}

impl JokeCommand {
    /// Serve jokes from `jokes`, replying through `transport`.
    pub fn new(jokes: GrainRef<JokeGrain>, transport: Rc<dyn BotTransport>) -> Self {
        Self { jokes, transport }
    }
}

#[async_trait(?Send)]
impl CommandHandler for JokeCommand {
    async fn handle(
        &self,
        message: &TextMessage,
        cancel: &CancellationToken,
    ) -> Result<(), HandlerError> {
        let batch = self.jokes.call((), cancel).await?;
        let text = batch
            .choose(&mut rand::rng())
            .map_or("No jokes right now, try again in a minute.", |joke| {
                joke.text.as_str()
            });

        self.transport
            .send_message(message.chat_id, text, cancel)
            .await?;
        Ok(())
    }
}
