//! Configuration types for the Wagerpot engine.
//!
//! Everything here is runtime-tunable: the engine keeps the live
//! [`EngineConfig`] behind a lock and re-reads it on every call.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Result, WagerpotError, constants};

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Points seeded into a ledger entry on first reference.
    pub starting_balance: u64,
    /// Points credited for a completed scouting session.
    pub scouting_reward: u64,
    /// Admission control parameters.
    pub rate_limit: RateLimitConfig,
    /// Idle buckets older than this are swept (seconds).
    pub bucket_idle_ttl_secs: u64,
    /// Upstream match feed credentials.
    pub feed: FeedConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            starting_balance: constants::DEFAULT_STARTING_BALANCE,
            scouting_reward: constants::DEFAULT_SCOUTING_REWARD,
            rate_limit: RateLimitConfig::default(),
            bucket_idle_ttl_secs: constants::DEFAULT_BUCKET_IDLE_TTL_SECS,
            feed: FeedConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Build a config from the process environment over the defaults.
    ///
    /// Recognised variables: `WAGERPOT_STARTING_BALANCE`, `SCOUTING_REWARD`,
    /// `RATE_LIMIT_PER_SECOND`, `RATE_LIMIT_CAPACITY`, `FEED_API_KEY`,
    /// `FEED_EVENT_KEY`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] but with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = parse_var::<u64, _>(&lookup, "WAGERPOT_STARTING_BALANCE")? {
            cfg.starting_balance = v;
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "SCOUTING_REWARD")? {
            cfg.scouting_reward = v;
        }
        if let Some(rate) = parse_var::<f64, _>(&lookup, "RATE_LIMIT_PER_SECOND")? {
            cfg.rate_limit = RateLimitConfig::per_second(rate);
        }
        if let Some(cap) = parse_var::<u32, _>(&lookup, "RATE_LIMIT_CAPACITY")? {
            cfg.rate_limit.capacity = cap;
        }
        cfg.feed.api_key = lookup("FEED_API_KEY").filter(|s| !s.trim().is_empty());
        cfg.feed.event_key = lookup("FEED_EVENT_KEY").filter(|s| !s.trim().is_empty());

        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings that would make the engine misbehave.
    pub fn validate(&self) -> Result<()> {
        self.rate_limit.validate()
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| WagerpotError::Configuration(format!("{key}={raw:?} is not valid"))),
    }
}

/// Token-bucket parameters applied to every caller key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum tokens (burst size). At least 1.
    pub capacity: u32,
    /// Tokens added per second. Finite and > 0.
    pub refill_per_second: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: constants::DEFAULT_RATE_LIMIT_CAPACITY,
            refill_per_second: constants::DEFAULT_RATE_LIMIT_PER_SECOND,
        }
    }
}

impl RateLimitConfig {
    /// Single-knob form: burst size follows the per-second rate (rounded up).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn per_second(rate: f64) -> Self {
        let capacity = if rate.is_finite() && rate >= 1.0 {
            rate.ceil().min(f64::from(u32::MAX)) as u32
        } else {
            1
        };
        Self {
            capacity,
            refill_per_second: rate,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(WagerpotError::Configuration(
                "rate limit capacity must be at least 1".into(),
            ));
        }
        if !self.refill_per_second.is_finite() || self.refill_per_second <= 0.0 {
            return Err(WagerpotError::Configuration(format!(
                "rate limit refill must be a positive number, got {}",
                self.refill_per_second
            )));
        }
        Ok(())
    }
}

/// Credentials for the upstream match feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub api_key: Option<String>,
    pub event_key: Option<String>,
}

impl FeedConfig {
    /// Both the API key and the event key are present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.event_key.is_some()
    }
}
