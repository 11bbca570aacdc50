//! Upstream match feed adapter.
//!
//! The feed is an opaque collaborator: it proposes the next match to
//! schedule and reports results for matches it created. Fetching happens
//! outside the engine lock; only the plain [`MatchProposal`] or winning
//! label produced here ever reaches the engine.
//!
//! Upstream records follow the public FRC event schedule format:
//! ```json
//! { "key": "2024casj_qm12", "comp_level": "qm", "match_number": 12,
//!   "actual_time": null, "winning_alliance": "",
//!   "alliances": { "red":  { "team_keys": ["frc254", "frc1678", "frc971"] },
//!                  "blue": { "team_keys": ["frc118", "frc148", "frc2056"] } } }
//! ```

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use wagerpot_types::{FeedConfig, Match, Result, WagerpotError, constants};

// ---------------------------------------------------------------------------
// Upstream records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedAlliance {
    #[serde(default)]
    pub team_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedAlliances {
    #[serde(default)]
    pub red: FeedAlliance,
    #[serde(default)]
    pub blue: FeedAlliance,
}

/// One upstream match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedMatch {
    pub key: String,
    pub comp_level: String,
    pub match_number: u32,
    /// Unix seconds the match was played; absent until then.
    #[serde(default)]
    pub actual_time: Option<i64>,
    /// `"red"`, `"blue"`, or empty for a tie / no result.
    #[serde(default)]
    pub winning_alliance: Option<String>,
    #[serde(default)]
    pub alliances: FeedAlliances,
}

impl FeedMatch {
    #[must_use]
    pub fn is_played(&self) -> bool {
        self.actual_time.is_some_and(|t| t != 0)
    }
}

/// Parse an upstream schedule document.
///
/// # Errors
/// `FeedUnavailable` if the payload is not a list of matches.
pub fn parse_schedule(json: &str) -> Result<Vec<FeedMatch>> {
    serde_json::from_str(json).map_err(|e| WagerpotError::FeedUnavailable {
        reason: format!("malformed schedule: {e}"),
    })
}

// ---------------------------------------------------------------------------
// MatchFeed port
// ---------------------------------------------------------------------------

/// Source of upstream matches.
///
/// Implementations may block on network I/O; the gateway never calls them
/// while holding the engine lock.
pub trait MatchFeed: Send + Sync {
    /// Every match of the configured event.
    fn schedule(&self, config: &FeedConfig) -> Result<Vec<FeedMatch>>;

    /// A single match by upstream key.
    fn lookup(&self, config: &FeedConfig, feed_key: &str) -> Result<FeedMatch>;
}

/// In-memory feed, for tests and offline events.
#[derive(Default)]
pub struct StaticFeed {
    matches: RwLock<Vec<FeedMatch>>,
    outage: RwLock<Option<String>>,
}

impl StaticFeed {
    #[must_use]
    pub fn new(matches: Vec<FeedMatch>) -> Self {
        Self {
            matches: RwLock::new(matches),
            outage: RwLock::new(None),
        }
    }

    /// Build from an upstream schedule document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(parse_schedule(json)?))
    }

    /// Record a played result for `feed_key`. Returns false if unknown.
    pub fn record_result(&self, feed_key: &str, actual_time: i64, winning_alliance: &str) -> bool {
        let mut matches = self.matches.write();
        match matches.iter_mut().find(|m| m.key == feed_key) {
            Some(m) => {
                m.actual_time = Some(actual_time);
                m.winning_alliance = Some(winning_alliance.to_string());
                true
            }
            None => false,
        }
    }

    /// Make every call fail with `FeedUnavailable` until cleared with `None`.
    pub fn set_outage(&self, reason: Option<&str>) {
        *self.outage.write() = reason.map(str::to_string);
    }

    fn check_outage(&self) -> Result<()> {
        match self.outage.read().as_ref() {
            Some(reason) => Err(WagerpotError::FeedUnavailable {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl MatchFeed for StaticFeed {
    fn schedule(&self, _config: &FeedConfig) -> Result<Vec<FeedMatch>> {
        self.check_outage()?;
        Ok(self.matches.read().clone())
    }

    fn lookup(&self, _config: &FeedConfig, feed_key: &str) -> Result<FeedMatch> {
        self.check_outage()?;
        self.matches
            .read()
            .iter()
            .find(|m| m.key == feed_key)
            .cloned()
            .ok_or_else(|| WagerpotError::FeedUnavailable {
                reason: format!("unknown upstream match {feed_key}"),
            })
    }
}

// ---------------------------------------------------------------------------
// FeedAdapter
// ---------------------------------------------------------------------------

/// Next upstream match to schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchProposal {
    pub side_a: String,
    pub side_b: String,
    pub feed_key: String,
    pub match_number: u32,
    /// Unplayed qualification matches left after this one.
    pub remaining: usize,
}

/// Translates upstream records into engine inputs.
pub struct FeedAdapter;

impl FeedAdapter {
    /// The lowest-numbered unplayed qualification match, if any.
    ///
    /// Red's first team becomes side A and blue's first team side B.
    #[must_use]
    pub fn propose(upstream: &[FeedMatch]) -> Option<MatchProposal> {
        let mut upcoming: Vec<&FeedMatch> = upstream
            .iter()
            .filter(|m| m.comp_level == constants::FEED_QUALIFICATION_LEVEL && !m.is_played())
            .collect();
        upcoming.sort_by(|a, b| {
            a.match_number
                .cmp(&b.match_number)
                .then_with(|| a.key.cmp(&b.key))
        });

        let next = upcoming.first()?;
        let first_team = |keys: &[String]| keys.first().map(|k| team_label(k)).unwrap_or_default();
        Some(MatchProposal {
            side_a: first_team(&next.alliances.red.team_keys),
            side_b: first_team(&next.alliances.blue.team_keys),
            feed_key: next.key.clone(),
            match_number: next.match_number,
            remaining: upcoming.len() - 1,
        })
    }

    /// Winning label for `active` given its upstream record.
    ///
    /// `Ok(None)` while the match has not been played.
    ///
    /// # Errors
    /// `FeedResultUndecidable` for a played match with no red/blue winner.
    pub fn resolution(active: &Match, upstream: &FeedMatch) -> Result<Option<String>> {
        if !upstream.is_played() {
            return Ok(None);
        }
        match upstream.winning_alliance.as_deref() {
            Some("red") => Ok(Some(active.side_a.clone())),
            Some("blue") => Ok(Some(active.side_b.clone())),
            other => Err(WagerpotError::FeedResultUndecidable {
                reason: format!(
                    "{} reported winning alliance {:?}",
                    upstream.key,
                    other.unwrap_or_default()
                ),
            }),
        }
    }
}

/// `frc254` → `Team 254`; anything else is returned unchanged.
#[must_use]
pub fn team_label(team_key: &str) -> String {
    if let Some(pos) = team_key.find("frc") {
        let digits: String = team_key[pos + 3..]
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        if !digits.is_empty() {
            return format!("Team {digits}");
        }
    }
    team_key.to_string()
}
