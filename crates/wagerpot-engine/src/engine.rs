//! The wagering engine aggregate.
//!
//! [`WagerEngine`] owns the match registry, ledger and wager book
//! behind a single mutex. Every operation that reads or writes any of them
//! takes that lock for its whole duration, so:
//!
//! - two concurrent `schedule` calls cannot both see "no open match"
//! - a wager is never admitted against a match that is mid-resolution
//! - a settlement never observes a half-placed wager
//!
//! Configuration lives behind its own `RwLock` and is copied out before
//! the aggregate lock is taken; the two are never held together.
//! Admission control has per-bucket locks and never touches the aggregate.

use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use wagerpot_ingress::{AdmissionController, Ledger, MatchRegistry, PlacedWager, WagerBook};
use wagerpot_settlement::{PotStats, SettlementOutcome, Settler, pot_stats};
use wagerpot_types::{
    EngineConfig, FeedConfig, Identity, Match, MatchId, MatchSource, RateLimitConfig, Result,
    Wager, WagerpotError, constants,
};

use crate::feed::MatchProposal;
use crate::leaderboard::{self, PointsRow, PredictionRow};

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// A caller's own ledger entry with its wagers expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerView {
    pub identity: Identity,
    pub name: String,
    pub balance: u64,
    pub wagers: Vec<Wager>,
}

/// Result of crediting a scouting reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoutingAward {
    pub identity: Identity,
    pub name: String,
    pub awarded: u64,
    pub balance: u64,
}

/// A match with totals over all of its wagers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    #[serde(flatten)]
    pub contest: Match,
    pub total_wagers: usize,
    pub total_points_wagered: u64,
}

/// Runtime-tunable settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AppSettings {
    pub scouting_reward: u64,
    pub rate_limit: RateLimitConfig,
}

/// Requested settings change. Invalid fields are skipped, valid ones applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct SettingsUpdate {
    /// Must be ≥ 0.
    pub scouting_reward: Option<i64>,
    /// Must be finite and > 0. Capacity follows it unless given explicitly.
    pub rate_limit_per_second: Option<f64>,
    /// Must be ≥ 1.
    pub rate_limit_capacity: Option<i64>,
}

/// Feed credentials as reported back to an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedSettings {
    pub has_api_key: bool,
    pub event_key: Option<String>,
}

// ---------------------------------------------------------------------------
// WagerEngine
// ---------------------------------------------------------------------------

struct Book {
    registry: MatchRegistry,
    ledger: Ledger,
    wagers: WagerBook,
}

/// Shared engine state. Cheap to wrap in an `Arc` and call from any thread.
pub struct WagerEngine {
    book: Mutex<Book>,
    config: RwLock<EngineConfig>,
    admission: AdmissionController,
}

impl WagerEngine {
    /// Create an engine with empty state.
    ///
    /// # Errors
    /// `Configuration` if `config` does not validate.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            starting_balance = config.starting_balance,
            scouting_reward = config.scouting_reward,
            rate_capacity = config.rate_limit.capacity,
            rate_per_second = config.rate_limit.refill_per_second,
            feed_configured = config.feed.is_configured(),
            "Engine started"
        );
        Ok(Self::with_config(config))
    }

    fn with_config(config: EngineConfig) -> Self {
        Self {
            book: Mutex::new(Book {
                registry: MatchRegistry::new(),
                ledger: Ledger::new(config.starting_balance),
                wagers: WagerBook::new(),
            }),
            admission: AdmissionController::new(Duration::from_secs(config.bucket_idle_ttl_secs)),
            config: RwLock::new(config),
        }
    }

    // ── Admission ────────────────────────────────────────────────────────

    /// Consume one token from `key`'s bucket.
    ///
    /// # Errors
    /// `RateLimited` with a retry-after hint.
    pub fn admit(&self, key: &str) -> Result<()> {
        self.admit_at(key, Instant::now())
    }

    /// [`WagerEngine::admit`] at an explicit instant.
    pub fn admit_at(&self, key: &str, now: Instant) -> Result<()> {
        let limits = self.config.read().rate_limit;
        self.admission.admit(key, &limits, now).into_result()
    }

    /// Evict idle buckets now. Returns the number removed.
    pub fn sweep_idle_buckets(&self, now: Instant) -> usize {
        let limits = self.config.read().rate_limit;
        self.admission.sweep_idle(&limits, now)
    }

    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.admission.bucket_count()
    }

    // ── Matches ──────────────────────────────────────────────────────────

    /// Schedule a manually entered match.
    ///
    /// # Errors
    /// `Conflict` while another match is open, `Validation` on empty labels.
    pub fn schedule(&self, side_a: &str, side_b: &str) -> Result<Match> {
        self.book
            .lock()
            .registry
            .schedule(side_a, side_b, MatchSource::Manual)
    }

    /// Schedule the match a feed proposed, remembering its upstream key.
    pub fn schedule_from_feed(&self, proposal: &MatchProposal) -> Result<Match> {
        self.book.lock().registry.schedule(
            &proposal.side_a,
            &proposal.side_b,
            MatchSource::Feed {
                feed_key: proposal.feed_key.clone(),
                match_number: proposal.match_number,
            },
        )
    }

    #[must_use]
    pub fn active_match(&self) -> Option<Match> {
        self.book.lock().registry.active().cloned()
    }

    pub fn get_match(&self, id: MatchId) -> Result<Match> {
        self.book.lock().registry.require(id).cloned()
    }

    /// Every match in creation order.
    #[must_use]
    pub fn list_matches(&self) -> Vec<Match> {
        self.book.lock().registry.list().to_vec()
    }

    /// Every match with wager totals across all statuses.
    #[must_use]
    pub fn admin_match_summaries(&self) -> Vec<MatchSummary> {
        let book = self.book.lock();
        book.registry
            .list()
            .iter()
            .map(|m| {
                let wagers = book.wagers.for_match(m.id);
                MatchSummary {
                    contest: m.clone(),
                    total_wagers: wagers.len(),
                    total_points_wagered: wagers.iter().map(|w| w.stake).sum(),
                }
            })
            .collect()
    }

    /// Live pot statistics over pending wagers.
    ///
    /// # Errors
    /// `MatchNotFound`.
    pub fn stats(&self, id: MatchId) -> Result<PotStats> {
        let book = self.book.lock();
        let m = book.registry.require(id)?;
        pot_stats(m, &book.wagers.for_match(id))
    }

    /// All wagers on a match regardless of status. Unknown matches have none.
    #[must_use]
    pub fn wagers_for_match(&self, id: MatchId) -> Vec<Wager> {
        self.book
            .lock()
            .wagers
            .for_match(id)
            .into_iter()
            .cloned()
            .collect()
    }

    // ── Wagers & settlement ──────────────────────────────────────────────

    /// Place a wager, debiting the stake.
    ///
    /// # Errors
    /// `Validation`, `MatchNotFound`, `MatchClosed`, `InvalidSide`, or
    /// `InsufficientBalance`, checked in that order.
    pub fn place_wager(
        &self,
        identity: &Identity,
        match_id: MatchId,
        side: &str,
        stake: u64,
    ) -> Result<PlacedWager> {
        let mut guard = self.book.lock();
        let book = &mut *guard;
        book.wagers
            .place(&book.registry, &mut book.ledger, identity, match_id, side, stake)
    }

    /// Resolve a match and settle every pending wager on it.
    ///
    /// # Errors
    /// `MatchNotFound`, `AlreadyResolved`, `InvalidSide`, or
    /// `PotInvariantViolation`. Nothing changes on error.
    pub fn resolve(&self, match_id: MatchId, winning_side: &str) -> Result<SettlementOutcome> {
        let mut guard = self.book.lock();
        let book = &mut *guard;
        Settler::settle(
            &mut book.registry,
            &mut book.wagers,
            &mut book.ledger,
            match_id,
            winning_side,
            Utc::now(),
        )
    }

    // ── Ledger ───────────────────────────────────────────────────────────

    /// The caller's entry, created with the starting balance on first use.
    pub fn ledger_view(&self, identity: &Identity) -> LedgerView {
        let mut book = self.book.lock();
        let entry = book.ledger.get_or_create(identity).clone();
        LedgerView {
            wagers: book.wagers.lookup_all(&entry.wagers),
            identity: entry.identity,
            name: entry.name,
            balance: entry.balance,
        }
    }

    /// Set the display name used for scouting rewards and leaderboards.
    pub fn set_display_name(&self, identity: &Identity, name: &str) -> LedgerView {
        self.book.lock().ledger.set_display_name(identity, name);
        self.ledger_view(identity)
    }

    /// Balance without creating an entry.
    #[must_use]
    pub fn balance_of(&self, identity: &Identity) -> u64 {
        self.book.lock().ledger.balance_of(identity)
    }

    /// Overwrite every balance. Returns how many entries were reset.
    pub fn reset_all_balances(&self, new_balance: u64) -> usize {
        let reset = self.book.lock().ledger.reset_all(new_balance);
        tracing::info!(new_balance, reset, "All balances reset");
        reset
    }

    /// Credit the configured scouting reward to whoever goes by `full_name`.
    ///
    /// # Errors
    /// `Validation` for a blank name, `IdentityNotFound` if nobody matches.
    pub fn award_scouting_reward(&self, full_name: &str) -> Result<ScoutingAward> {
        let name = full_name.trim();
        if name.is_empty() {
            return Err(WagerpotError::validation("full name cannot be empty"));
        }
        let reward = self.config.read().scouting_reward;

        let mut book = self.book.lock();
        let identity = book
            .ledger
            .find_by_display_name(name)
            .map(|e| e.identity.clone())
            .ok_or_else(|| WagerpotError::IdentityNotFound(Identity::new(name)))?;
        let balance = book.ledger.credit(&identity, reward)?;
        let display = book
            .ledger
            .get(&identity)
            .map_or_else(|| identity.as_str().to_string(), |e| e.name.clone());

        tracing::info!(identity = %identity, awarded = reward, balance, "Scouting reward credited");
        Ok(ScoutingAward {
            identity,
            name: display,
            awarded: reward,
            balance,
        })
    }

    /// Sum of every balance.
    #[must_use]
    pub fn total_points(&self) -> u128 {
        self.book.lock().ledger.total_points()
    }

    #[must_use]
    pub fn starting_balance(&self) -> u64 {
        self.book.lock().ledger.starting_balance()
    }

    // ── Leaderboards ─────────────────────────────────────────────────────

    #[must_use]
    pub fn points_leaderboard(&self) -> Vec<PointsRow> {
        leaderboard::points(&self.book.lock().ledger, constants::LEADERBOARD_SIZE)
    }

    #[must_use]
    pub fn predictions_leaderboard(&self) -> Vec<PredictionRow> {
        let book = self.book.lock();
        leaderboard::predictions(&book.ledger, &book.wagers, constants::LEADERBOARD_SIZE)
    }

    // ── Settings ─────────────────────────────────────────────────────────

    #[must_use]
    pub fn config(&self) -> EngineConfig {
        self.config.read().clone()
    }

    #[must_use]
    pub fn settings(&self) -> AppSettings {
        let cfg = self.config.read();
        AppSettings {
            scouting_reward: cfg.scouting_reward,
            rate_limit: cfg.rate_limit,
        }
    }

    /// Apply the valid parts of `update` and return the resulting settings.
    pub fn update_settings(&self, update: &SettingsUpdate) -> AppSettings {
        {
            let mut cfg = self.config.write();

            match update.scouting_reward.map(u64::try_from) {
                Some(Ok(reward)) => cfg.scouting_reward = reward,
                Some(Err(_)) => tracing::warn!(
                    value = ?update.scouting_reward,
                    "Ignoring negative scouting reward"
                ),
                None => {}
            }

            let mut limits = cfg.rate_limit;
            if let Some(rate) = update.rate_limit_per_second {
                if rate.is_finite() && rate > 0.0 {
                    limits = RateLimitConfig::per_second(rate);
                } else {
                    tracing::warn!(value = rate, "Ignoring non-positive rate limit");
                }
            }
            if let Some(capacity) = update.rate_limit_capacity {
                match u32::try_from(capacity) {
                    Ok(c) if c >= 1 => limits.capacity = c,
                    _ => tracing::warn!(value = capacity, "Ignoring rate limit capacity below 1"),
                }
            }
            if limits.validate().is_ok() {
                cfg.rate_limit = limits;
            }
        }

        let settings = self.settings();
        tracing::info!(
            scouting_reward = settings.scouting_reward,
            rate_capacity = settings.rate_limit.capacity,
            rate_per_second = settings.rate_limit.refill_per_second,
            "Settings updated"
        );
        settings
    }

    /// Replace whichever feed credentials are given; blank strings clear them.
    /// Store new feed credentials. Missing or blank values keep the current ones.
    pub fn configure_feed(&self, api_key: Option<&str>, event_key: Option<&str>) -> FeedSettings {
        {
            let mut cfg = self.config.write();
            let present = |s: Option<&str>| s.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);
            if let Some(key) = present(api_key) {
                cfg.feed.api_key = Some(key);
            }
            if let Some(key) = present(event_key) {
                cfg.feed.event_key = Some(key);
            }
        }
        let settings = self.feed_settings();
        tracing::info!(
            has_api_key = settings.has_api_key,
            event_key = settings.event_key.as_deref().unwrap_or(""),
            "Feed configuration updated"
        );
        settings
    }

    #[must_use]
    pub fn feed_settings(&self) -> FeedSettings {
        let cfg = self.config.read();
        FeedSettings {
            has_api_key: cfg.feed.api_key.is_some(),
            event_key: cfg.feed.event_key.clone(),
        }
    }

    #[must_use]
    pub fn feed_config(&self) -> FeedConfig {
        self.config.read().feed.clone()
    }
}

impl Default for WagerEngine {
    fn default() -> Self {
        Self::with_config(EngineConfig::default())
    }
}
