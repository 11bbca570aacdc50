//! Wager types.
//!
//! A [`Wager`] is immutable once placed, except for the settlement fields
//! (`status`, `payout`, `multiplier`) which are written exactly once when
//! its match resolves.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Identity, MatchId, Result, WagerId, WagerpotError};

/// Settlement state of a wager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WagerStatus {
    Pending,
    Won,
    Lost,
}

impl fmt::Display for WagerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Won => write!(f, "WON"),
            Self::Lost => write!(f, "LOST"),
        }
    }
}

/// A point-denominated stake on one side of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wager {
    pub id: WagerId,
    pub identity: Identity,
    pub match_id: MatchId,
    /// Equals one of the match's two labels.
    pub side: String,
    /// Always > 0.
    pub stake: u64,
    pub status: WagerStatus,
    /// Points credited on a win.
    pub payout: Option<u64>,
    /// Pot ÷ winning stakes, recorded on a win.
    pub multiplier: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl Wager {
    /// Create a new `Pending` wager.
    #[must_use]
    pub fn pending(
        id: WagerId,
        identity: Identity,
        match_id: MatchId,
        side: impl Into<String>,
        stake: u64,
    ) -> Self {
        Self {
            id,
            identity,
            match_id,
            side: side.into(),
            stake,
            status: WagerStatus::Pending,
            payout: None,
            multiplier: None,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == WagerStatus::Pending
    }

    /// Record a win. Only valid from `Pending`.
    pub fn mark_won(&mut self, payout: u64, multiplier: Decimal) -> Result<()> {
        self.ensure_pending()?;
        self.status = WagerStatus::Won;
        self.payout = Some(payout);
        self.multiplier = Some(multiplier);
        Ok(())
    }

    /// Record a loss. Only valid from `Pending`.
    pub fn mark_lost(&mut self) -> Result<()> {
        self.ensure_pending()?;
        self.status = WagerStatus::Lost;
        Ok(())
    }

    fn ensure_pending(&self) -> Result<()> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(WagerpotError::AlreadyResolved(self.match_id))
        }
    }
}

impl fmt::Display for Wager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Wager[{}] {} {} on {:?} ({})",
            self.id.0, self.identity, self.stake, self.side, self.status
        )
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl Wager {
    pub fn dummy_pending(id: u64, identity: &str, side: &str, stake: u64) -> Self {
        Self::pending(WagerId(id), Identity::from(identity), MatchId(1), side, stake)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn won_records_payout_and_multiplier() {
        let mut w = Wager::dummy_pending(1, "alice", "Team 254", 300);
        w.mark_won(399, Decimal::new(1333, 3)).unwrap();
        assert_eq!(w.status, WagerStatus::Won);
        assert_eq!(w.payout, Some(399));
        assert_eq!(w.multiplier, Some(Decimal::new(1333, 3)));
    }

    #[test]
    fn settlement_fields_written_once() {
        let mut w = Wager::dummy_pending(1, "bob", "Team 1678", 100);
        w.mark_lost().unwrap();
        assert!(w.mark_won(10, Decimal::ONE).is_err());
        assert!(w.mark_lost().is_err());
        assert_eq!(w.status, WagerStatus::Lost);
        assert_eq!(w.payout, None);
    }

    #[test]
    fn wager_serde_roundtrip() {
        let w = Wager::dummy_pending(3, "carol", "Team 254", 40);
        let json = serde_json::to_string(&w).unwrap();
        let back: Wager = serde_json::from_str(&json).unwrap();
        assert_eq!(w, back);
    }
}
