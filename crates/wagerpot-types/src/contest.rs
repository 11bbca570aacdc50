//! Match lifecycle types.
//!
//! A [`Match`] is a two-sided contest that accepts wagers while `Open` and
//! transitions to `Resolved` exactly once, irreversibly, when a winner is
//! declared.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{MatchId, Result, WagerpotError};

/// The two lifecycle states of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchStatus {
    /// Accepting wagers. At most one match system-wide is in this state.
    Open,
    /// Winner declared and all wagers settled.
    Resolved,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Resolved => write!(f, "RESOLVED"),
        }
    }
}

/// Where a match came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchSource {
    /// Scheduled by an administrator.
    Manual,
    /// Scheduled from the upstream match feed.
    Feed {
        /// Upstream match key, used later to look up the result.
        feed_key: String,
        /// Upstream match number within the event.
        match_number: u32,
    },
}

impl MatchSource {
    /// The upstream key, if this match came from the feed.
    #[must_use]
    pub fn feed_key(&self) -> Option<&str> {
        match self {
            Self::Manual => None,
            Self::Feed { feed_key, .. } => Some(feed_key),
        }
    }
}

/// A two-sided contest that wagers are placed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub side_a: String,
    pub side_b: String,
    pub status: MatchStatus,
    /// The winning label, set exactly once on resolution.
    pub winner: Option<String>,
    pub source: MatchSource,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Match {
    /// Create a new `Open` match.
    #[must_use]
    pub fn open(
        id: MatchId,
        side_a: impl Into<String>,
        side_b: impl Into<String>,
        source: MatchSource,
    ) -> Self {
        Self {
            id,
            side_a: side_a.into(),
            side_b: side_b.into(),
            status: MatchStatus::Open,
            winner: None,
            source,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == MatchStatus::Open
    }

    /// Exact, case-sensitive comparison against both labels.
    #[must_use]
    pub fn has_side(&self, side: &str) -> bool {
        side == self.side_a || side == self.side_b
    }

    /// Both labels, side A first.
    #[must_use]
    pub fn sides(&self) -> [&str; 2] {
        [&self.side_a, &self.side_b]
    }

    /// Check that `winning_side` can resolve this match, without mutating it.
    ///
    /// # Errors
    /// - `AlreadyResolved` if the match is no longer open
    /// - `InvalidSide` if `winning_side` is not one of the labels
    pub fn check_resolvable(&self, winning_side: &str) -> Result<()> {
        if !self.is_open() {
            return Err(WagerpotError::AlreadyResolved(self.id));
        }
        if !self.has_side(winning_side) {
            return Err(WagerpotError::InvalidSide {
                match_id: self.id,
                side: winning_side.to_string(),
            });
        }
        Ok(())
    }

    /// Apply the one-way `Open → Resolved` transition.
    ///
    /// # Errors
    /// Same as [`Match::check_resolvable`].
    pub fn mark_resolved(&mut self, winning_side: &str, at: DateTime<Utc>) -> Result<()> {
        self.check_resolvable(winning_side)?;
        self.status = MatchStatus::Resolved;
        self.winner = Some(winning_side.to_string());
        self.resolved_at = Some(at);
        Ok(())
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Match[{}] {} vs {} ({})",
            self.id.0, self.side_a, self.side_b, self.status
        )
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl Match {
    pub fn dummy_open(id: u64) -> Self {
        Self::open(MatchId(id), "Team 254", "Team 1678", MatchSource::Manual)
    }
}
