//! Grainbot over stdin/stdout.
//!
//! Reads one JSON update per line from stdin and writes one JSON action per
//! line to stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! grainbot --username mybot --jokes jokes.txt < updates.jsonl
//! RUST_LOG=grainbot=debug grainbot --config bot.json --jokes jokes.txt
//! ```
//!
//! The jokes file holds one joke per line. Stops at end of input or on
//! Ctrl-C.

use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use grainbot::bot::spawn_json_lines_reader;
use grainbot::prelude::*;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "grainbot")]
#[command(about = "Chat bot front end on in-process virtual actors", long_about = None)]
struct Args {
    /// Bot username, used to recognize `/command@bot`
    #[arg(short, long, env = "GRAINBOT_USERNAME")]
    username: Option<String>,

    /// JSON config file; flags override its values
    #[arg(short, long, env = "GRAINBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Joke corpus, one joke per line
    #[arg(short, long, env = "GRAINBOT_JOKES")]
    jokes: PathBuf,

    /// Cache window width in seconds
    #[arg(long)]
    bucket_secs: Option<u64>,

    /// Jokes drawn per window
    #[arg(long)]
    max_candidates: Option<usize>,

    /// Minimum corpus size that may be sampled
    #[arg(long)]
    min_corpus: Option<u64>,

    /// Maximum live grain activations
    #[arg(long)]
    max_activations: Option<usize>,

    /// Seconds before an idle activation is dropped
    #[arg(long)]
    idle_timeout_secs: Option<u64>,

    /// Fixed RNG seed for reproducible sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Reply to the user when a command fails
    #[arg(long)]
    reply_on_error: bool,
}

impl Args {
    fn bot_config(&self) -> Result<BotConfig, ConfigError> {
        let base = match &self.config {
            Some(path) => BotConfig::from_json_file(path)?,
            None => BotConfig::default(),
        };
        let mut builder = BotConfigBuilder::from_config(base);

        if let Some(username) = &self.username {
            builder = builder.bot_username(username.as_str());
        }
        if let Some(secs) = self.bucket_secs {
            builder = builder.bucket_secs(secs);
        }
        if let Some(max) = self.max_candidates {
            builder = builder.max_candidates(max);
        }
        if let Some(min) = self.min_corpus {
            builder = builder.min_corpus(min);
        }
        if let Some(max) = self.max_activations {
            builder = builder.max_activations(max);
        }
        if let Some(secs) = self.idle_timeout_secs {
            builder = builder.idle_timeout_secs(secs);
        }
        if let Some(seed) = self.seed {
            builder = builder.rng_seed(seed);
        }
        builder.build()
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // stdout carries the protocol, so logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = args.bot_config()?;
    let corpus = tokio::fs::read_to_string(&args.jokes).await?;
    let jokes: Vec<String> = corpus
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    tracing::info!(
        bot = config.bot_username(),
        jokes = jokes.len(),
        path = %args.jokes.display(),
        "loaded joke corpus"
    );

    let session = CancellationToken::new();
    let local = tokio::task::LocalSet::new();

    local
        .run_until(async move {
            let transport: Rc<dyn BotTransport> =
                Rc::new(JsonLinesTransport::new(tokio::io::stdout()));
            let source: Rc<dyn JokeSource> = Rc::new(InMemoryJokeSource::new(jokes));

            let mut builder = UpdateDispatcher::builder(config, transport.clone(), source);
            if args.reply_on_error {
                builder = builder.error_reporter(Rc::new(ReplyErrorReporter::new(transport)));
            }
            let dispatcher = builder.build();

            let ctrl_c = session.clone();
            tokio::task::spawn_local(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupt received, shutting down");
                    ctrl_c.cancel();
                }
            });

            let (tx, rx) = mpsc::channel(64);
            // Not joined: on Ctrl-C the thread may sit in a stdin read
            // forever, and process exit takes it down.
            let _reader = spawn_json_lines_reader(
                std::io::BufReader::new(std::io::stdin()),
                tx,
                session.child_token(),
            )?;

            dispatcher.run(rx, session.clone()).await;
            session.cancel();
            Ok::<_, std::io::Error>(())
        })
        .await?;

    Ok(())
}
