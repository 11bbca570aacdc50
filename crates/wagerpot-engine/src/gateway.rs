//! Caller-facing entry points.
//!
//! Every [`Gateway`] method does the same two things before touching the
//! engine:
//! 1. **Admit** the caller's rate key, failing with `RateLimited`. Tokens
//!    are looked up first; only a live admin session or user identity gets
//!    its own bucket, anything else is charged to the caller's address.
//! 2. **Authorize**: admin operations need a live admin session, wager and
//!    ledger operations need a live user session. Public reads skip this.
//!
//! Feed operations fetch from the upstream feed *before* entering the
//! engine, so a slow or failing feed never holds the engine lock.

use std::sync::Arc;

use serde::Serialize;
use wagerpot_ingress::PlacedWager;
use wagerpot_settlement::{PotStats, SettlementOutcome};
use wagerpot_types::{FeedConfig, Identity, Match, MatchId, Result, Wager, WagerpotError};

use crate::engine::{
    AppSettings, FeedSettings, LedgerView, MatchSummary, ScoutingAward, SettingsUpdate, WagerEngine,
};
use crate::feed::{FeedAdapter, MatchFeed};
use crate::leaderboard::{PointsRow, PredictionRow};
use crate::session::{Credentials, SessionLookup, VerifiedCaller};

/// Outcome of asking the feed for the next match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SyncOutcome {
    Scheduled { scheduled: Match, remaining: usize },
    /// Every qualification match has been played.
    NoUpcoming,
}

/// Outcome of asking the feed to resolve the active match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AutoResolveOutcome {
    Resolved(Box<SettlementOutcome>),
    /// The feed has no result yet.
    NotPlayed { match_id: MatchId },
    NoActiveMatch,
}

/// Admission- and session-checked access to a [`WagerEngine`].
pub struct Gateway {
    engine: Arc<WagerEngine>,
    sessions: Arc<dyn SessionLookup>,
    feed: Option<Arc<dyn MatchFeed>>,
}

impl Gateway {
    #[must_use]
    pub fn new(engine: Arc<WagerEngine>, sessions: Arc<dyn SessionLookup>) -> Self {
        Self {
            engine,
            sessions,
            feed: None,
        }
    }

    #[must_use]
    pub fn with_feed(mut self, feed: Arc<dyn MatchFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<WagerEngine> {
        &self.engine
    }

    // ── Checks ───────────────────────────────────────────────────────────

    /// Verify sessions, then charge the resulting rate key.
    fn admit(&self, creds: &Credentials) -> Result<VerifiedCaller> {
        let caller = creds.verify(self.sessions.as_ref());
        self.engine.admit(&caller.rate_key().to_string())?;
        Ok(caller)
    }

    fn require_admin(&self, creds: &Credentials) -> Result<()> {
        if self.admit(creds)?.is_admin() {
            Ok(())
        } else {
            Err(WagerpotError::Unauthorized)
        }
    }

    fn require_user(&self, creds: &Credentials) -> Result<Identity> {
        self.admit(creds)?.user.ok_or(WagerpotError::Unauthorized)
    }

    fn configured_feed(&self) -> Result<(Arc<dyn MatchFeed>, FeedConfig)> {
        let config = self.engine.feed_config();
        match &self.feed {
            Some(feed) if config.is_configured() => Ok((Arc::clone(feed), config)),
            _ => Err(WagerpotError::FeedUnconfigured),
        }
    }

    // ── Public ───────────────────────────────────────────────────────────

    pub fn active_match(&self, creds: &Credentials) -> Result<Option<Match>> {
        self.admit(creds)?;
        Ok(self.engine.active_match())
    }

    pub fn get_match(&self, creds: &Credentials, id: MatchId) -> Result<Match> {
        self.admit(creds)?;
        self.engine.get_match(id)
    }

    pub fn list_matches(&self, creds: &Credentials) -> Result<Vec<Match>> {
        self.admit(creds)?;
        Ok(self.engine.list_matches())
    }

    pub fn stats(&self, creds: &Credentials, id: MatchId) -> Result<PotStats> {
        self.admit(creds)?;
        self.engine.stats(id)
    }

    pub fn wagers_for_match(&self, creds: &Credentials, id: MatchId) -> Result<Vec<Wager>> {
        self.admit(creds)?;
        Ok(self.engine.wagers_for_match(id))
    }

    pub fn points_leaderboard(&self, creds: &Credentials) -> Result<Vec<PointsRow>> {
        self.admit(creds)?;
        Ok(self.engine.points_leaderboard())
    }

    pub fn predictions_leaderboard(&self, creds: &Credentials) -> Result<Vec<PredictionRow>> {
        self.admit(creds)?;
        Ok(self.engine.predictions_leaderboard())
    }

    pub fn award_scouting_reward(
        &self,
        creds: &Credentials,
        full_name: &str,
    ) -> Result<ScoutingAward> {
        self.admit(creds)?;
        self.engine.award_scouting_reward(full_name)
    }

    // ── User ─────────────────────────────────────────────────────────────

    pub fn place_wager(
        &self,
        creds: &Credentials,
        match_id: MatchId,
        side: &str,
        stake: u64,
    ) -> Result<PlacedWager> {
        let identity = self.require_user(creds)?;
        self.engine.place_wager(&identity, match_id, side, stake)
    }

    pub fn my_ledger(&self, creds: &Credentials) -> Result<LedgerView> {
        let identity = self.require_user(creds)?;
        Ok(self.engine.ledger_view(&identity))
    }

    pub fn set_display_name(&self, creds: &Credentials, name: &str) -> Result<LedgerView> {
        let identity = self.require_user(creds)?;
        Ok(self.engine.set_display_name(&identity, name))
    }

    // ── Admin ────────────────────────────────────────────────────────────

    pub fn schedule(&self, creds: &Credentials, side_a: &str, side_b: &str) -> Result<Match> {
        self.require_admin(creds)?;
        self.engine.schedule(side_a, side_b)
    }

    pub fn resolve(
        &self,
        creds: &Credentials,
        match_id: MatchId,
        winning_side: &str,
    ) -> Result<SettlementOutcome> {
        self.require_admin(creds)?;
        self.engine.resolve(match_id, winning_side)
    }

    /// Reset every balance, to the starting balance unless one is given.
    pub fn reset_all_balances(&self, creds: &Credentials, new_balance: Option<u64>) -> Result<usize> {
        self.require_admin(creds)?;
        let balance = new_balance.unwrap_or_else(|| self.engine.starting_balance());
        Ok(self.engine.reset_all_balances(balance))
    }

    pub fn admin_match_summaries(&self, creds: &Credentials) -> Result<Vec<MatchSummary>> {
        self.require_admin(creds)?;
        Ok(self.engine.admin_match_summaries())
    }

    pub fn settings(&self, creds: &Credentials) -> Result<AppSettings> {
        self.require_admin(creds)?;
        Ok(self.engine.settings())
    }

    pub fn update_settings(&self, creds: &Credentials, update: &SettingsUpdate) -> Result<AppSettings> {
        self.require_admin(creds)?;
        Ok(self.engine.update_settings(update))
    }

    pub fn configure_feed(
        &self,
        creds: &Credentials,
        api_key: Option<&str>,
        event_key: Option<&str>,
    ) -> Result<FeedSettings> {
        self.require_admin(creds)?;
        Ok(self.engine.configure_feed(api_key, event_key))
    }

    pub fn feed_settings(&self, creds: &Credentials) -> Result<FeedSettings> {
        self.require_admin(creds)?;
        Ok(self.engine.feed_settings())
    }

    /// Schedule the next unplayed qualification match from the feed.
    ///
    /// # Errors
    /// `FeedUnconfigured`, `FeedUnavailable`, or `Conflict` while a match is open.
    pub fn sync_from_feed(&self, creds: &Credentials) -> Result<SyncOutcome> {
        self.require_admin(creds)?;
        let (feed, config) = self.configured_feed()?;

        let upstream = feed.schedule(&config).inspect_err(|e| {
            tracing::warn!(error = %e, "Feed schedule fetch failed");
        })?;

        let Some(proposal) = FeedAdapter::propose(&upstream) else {
            tracing::info!(fetched = upstream.len(), "Feed has no upcoming matches");
            return Ok(SyncOutcome::NoUpcoming);
        };

        let scheduled = self.engine.schedule_from_feed(&proposal)?;
        tracing::info!(
            match_id = scheduled.id.0,
            feed_key = %proposal.feed_key,
            remaining = proposal.remaining,
            "Scheduled match from feed"
        );
        Ok(SyncOutcome::Scheduled {
            scheduled,
            remaining: proposal.remaining,
        })
    }

    /// Resolve the active match from the feed's result.
    ///
    /// # Errors
    /// `FeedUnconfigured`, `FeedUnavailable`, `FeedResultUndecidable`,
    /// `Validation` if the active match was entered manually, or any
    /// settlement error.
    pub fn auto_resolve_from_feed(&self, creds: &Credentials) -> Result<AutoResolveOutcome> {
        self.require_admin(creds)?;
        let (feed, config) = self.configured_feed()?;

        let Some(active) = self.engine.active_match() else {
            return Ok(AutoResolveOutcome::NoActiveMatch);
        };
        let Some(feed_key) = active.source.feed_key() else {
            return Err(WagerpotError::validation(format!(
                "{} was not scheduled from the feed; resolve it manually",
                active.id
            )));
        };

        let upstream = feed.lookup(&config, feed_key).inspect_err(|e| {
            tracing::warn!(match_id = active.id.0, error = %e, "Feed result fetch failed");
        })?;

        match FeedAdapter::resolution(&active, &upstream)? {
            None => Ok(AutoResolveOutcome::NotPlayed {
                match_id: active.id,
            }),
            Some(winner) => {
                let outcome = self.engine.resolve(active.id, &winner)?;
                Ok(AutoResolveOutcome::Resolved(Box::new(outcome)))
            }
        }
    }
}
