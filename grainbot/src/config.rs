//! Bot configuration.
//!
//! [`BotConfig`] gathers the knobs of the front end: the bot's own username
//! (for command addressing), the candidate cache policy, and the activation
//! bounds of the grain runtime.
//!
//! # Example
//!
//! ```rust
//! use grainbot::config::BotConfig;
//!
//! let config = BotConfig::builder()
//!     .bot_username("mybot")
//!     .max_candidates(6)
//!     .build()
//!     .expect("valid config");
//! assert_eq!(config.policy().max_candidates, 6);
//! ```

use std::path::Path;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::cache::CachePolicy;
use crate::error::ConfigError;
use crate::grain::ActivationLimits;

/// Configuration for the bot front end.
///
/// Only [`BotConfigBuilder::build`] validates; `Default`,
/// [`BotConfig::from_json_file`] and raw `Deserialize` do not. Consumers tolerate an invalid
/// value where they can (a zero sweep interval disables sweeping).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    bot_username: String,
    bucket_secs: u64,
    max_candidates: usize,
    min_corpus: u64,
    max_activations: usize,
    idle_timeout_secs: u64,
    sweep_interval_secs: u64,
    rng_seed: Option<u64>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_username: String::new(),
            bucket_secs: 60,
            max_candidates: 6,
            min_corpus: 100,
            max_activations: 10_000,
            idle_timeout_secs: 600,
            sweep_interval_secs: 60,
            rng_seed: None,
        }
    }
}

impl BotConfig {
    /// Start building a configuration from defaults.
    pub fn builder() -> BotConfigBuilder {
        BotConfigBuilder::default()
    }

    /// Load a JSON configuration file. Missing fields take their defaults.
    ///
    /// The result is not validated; pass it through
    /// [`BotConfigBuilder::from_config`] to override and validate.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// The bot's own username, without the leading `@`.
    pub fn bot_username(&self) -> &str {
        &self.bot_username
    }

    /// Candidate cache policy for joke grains.
    pub fn policy(&self) -> CachePolicy {
        CachePolicy {
            bucket_width: secs(self.bucket_secs),
            max_candidates: self.max_candidates,
            min_corpus: self.min_corpus,
        }
    }

    /// Activation bounds for the grain runtime.
    pub fn limits(&self) -> ActivationLimits {
        ActivationLimits {
            max_activations: self.max_activations,
            idle_timeout: secs(self.idle_timeout_secs),
        }
    }

    /// How often idle activations are swept.
    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }

    /// Fixed RNG seed for grain sampling, if any.
    pub fn rng_seed(&self) -> Option<u64> {
        self.rng_seed
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.bot_username.trim().is_empty() {
            return invalid("bot_username is required");
        }
        if self.bot_username.contains(char::is_whitespace) {
            return invalid("bot_username must not contain whitespace");
        }
        if self.bucket_secs == 0 || i64::try_from(self.bucket_secs).is_err() {
            return invalid("bucket_secs must be positive");
        }
        if self.max_candidates == 0 {
            return invalid("max_candidates must be positive");
        }
        if self.min_corpus < self.max_candidates as u64 {
            return invalid("min_corpus must be at least max_candidates");
        }
        if self.max_activations == 0 {
            return invalid("max_activations must be positive");
        }
        if self.sweep_interval_secs == 0 {
            return invalid("sweep_interval_secs must be positive");
        }
        Ok(())
    }
}

fn secs(value: u64) -> TimeDelta {
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

/// Builder for [`BotConfig`].
#[derive(Debug, Clone, Default)]
pub struct BotConfigBuilder {
    config: BotConfig,
}

impl BotConfigBuilder {
    /// Start from an existing configuration, e.g. one loaded from a file.
    pub fn from_config(config: BotConfig) -> Self {
        Self { config }
    }

    /// Set the bot username. A leading `@` is stripped.
    pub fn bot_username(mut self, username: impl Into<String>) -> Self {
        let username = username.into();
        self.config.bot_username = username.trim_start_matches('@').to_string();
        self
    }

    /// Set the cache window width in seconds.
    pub fn bucket_secs(mut self, secs: u64) -> Self {
        self.config.bucket_secs = secs;
        self
    }

    /// Set the number of candidates drawn per window.
    pub fn max_candidates(mut self, max: usize) -> Self {
        self.config.max_candidates = max;
        self
    }

    /// Set the minimum corpus size that may be sampled.
    pub fn min_corpus(mut self, min: u64) -> Self {
        self.config.min_corpus = min;
        self
    }

    /// Set the activation cap of the grain runtime.
    pub fn max_activations(mut self, max: usize) -> Self {
        self.config.max_activations = max;
        self
    }

    /// Set the idle timeout of activations in seconds.
    pub fn idle_timeout_secs(mut self, secs: u64) -> Self {
        self.config.idle_timeout_secs = secs;
        self
    }

    /// Set the idle sweep interval in seconds.
    pub fn sweep_interval_secs(mut self, secs: u64) -> Self {
        self.config.sweep_interval_secs = secs;
        self
    }

    /// Fix the RNG seed used by grains.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.config.rng_seed = Some(seed);
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<BotConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
