//! Settlement receipts.
//!
//! Every settlement returns a [`SettlementOutcome`] carrying a SHA-256
//! digest over the match, the winner, and each resolved wager's
//! `(id, status, payout)`. Replaying the same wagers against the same
//! winner always produces the same digest.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sha2::{Digest, Sha256};
use wagerpot_types::{Match, MatchId, Wager, WagerStatus};

/// Result of resolving a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementOutcome {
    /// The match after its `Open → Resolved` transition.
    #[serde(rename = "match")]
    pub resolved_match: Match,
    pub total_pot: u64,
    pub winning_stakes: u64,
    pub multiplier: Decimal,
    /// Every wager settled by this resolution, in placement order.
    pub wagers: Vec<Wager>,
    pub total_paid: u64,
    pub forfeited: u64,
    /// Hex SHA-256 over the settled lines.
    pub digest: String,
    pub settled_at: DateTime<Utc>,
}

impl SettlementOutcome {
    #[must_use]
    pub fn match_id(&self) -> MatchId {
        self.resolved_match.id
    }

    #[must_use]
    pub fn winning_side(&self) -> Option<&str> {
        self.resolved_match.winner.as_deref()
    }
}

/// Deterministic digest over a settlement.
#[must_use]
pub fn settlement_digest(match_id: MatchId, winning_side: &str, wagers: &[Wager]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"wagerpot:settlement:v1:");
    hasher.update(match_id.0.to_le_bytes());
    hasher.update((winning_side.len() as u64).to_le_bytes());
    hasher.update(winning_side.as_bytes());
    for w in wagers {
        hasher.update(w.id.0.to_le_bytes());
        hasher.update([status_tag(w.status)]);
        hasher.update(w.payout.unwrap_or(0).to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

fn status_tag(status: WagerStatus) -> u8 {
    match status {
        WagerStatus::Pending => 0,
        WagerStatus::Won => 1,
        WagerStatus::Lost => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settled() -> Vec<Wager> {
        let mut a = Wager::dummy_pending(1, "alice", "A", 300);
        a.mark_won(399, Decimal::ONE).unwrap();
        let mut b = Wager::dummy_pending(2, "bob", "B", 100);
        b.mark_lost().unwrap();
        vec![a, b]
    }

    #[test]
    fn digest_is_deterministic() {
        let ws = settled();
        let d1 = settlement_digest(MatchId(1), "A", &ws);
        let d2 = settlement_digest(MatchId(1), "A", &ws);
        assert_eq!(d1, d2);
        assert_eq!(d1.len(), 64);
    }

    #[test]
    fn digest_changes_with_inputs() {
        let ws = settled();
        let base = settlement_digest(MatchId(1), "A", &ws);
        assert_ne!(base, settlement_digest(MatchId(2), "A", &ws));
        assert_ne!(base, settlement_digest(MatchId(1), "B", &ws));

        let mut tweaked = ws.clone();
        tweaked[0].payout = Some(398);
        assert_ne!(base, settlement_digest(MatchId(1), "A", &tweaked));
    }
}
