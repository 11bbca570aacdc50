//! Pari-mutuel pot computation.
//!
//! Pure functions: nothing here touches the ledger or the registry.
//!
//! ```text
//! total_pot      = Σ stake            (pending wagers, both sides)
//! winning_stakes = Σ stake            (pending wagers on the winning side)
//! multiplier     = total_pot / winning_stakes   (0 when winning_stakes == 0)
//! payout         = floor(stake × multiplier)    (winners only)
//! ```
//!
//! When nobody backed the winner, the multiplier is zero and the whole
//! pot is forfeited; nothing is refunded.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use wagerpot_types::{Identity, Match, MatchId, Result, Wager, WagerId, WagerpotError, constants};

/// How a single pending wager ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WagerResult {
    Won { payout: u64 },
    Lost,
}

/// One line of a settlement plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedWager {
    pub wager_id: WagerId,
    pub identity: Identity,
    pub stake: u64,
    pub result: WagerResult,
}

impl PlannedWager {
    #[must_use]
    pub fn payout(&self) -> u64 {
        match self.result {
            WagerResult::Won { payout } => payout,
            WagerResult::Lost => 0,
        }
    }
}

/// Everything settlement will do, computed before any state changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementPlan {
    pub match_id: MatchId,
    pub winning_side: String,
    pub total_pot: u64,
    pub winning_stakes: u64,
    pub multiplier: Decimal,
    /// In the same order as the pending wagers passed in.
    pub wagers: Vec<PlannedWager>,
    /// Σ payout.
    pub total_paid: u64,
    /// `total_pot - total_paid`: rounding loss, or the whole pot with no winners.
    pub forfeited: u64,
}

impl SettlementPlan {
    #[must_use]
    pub fn winner_count(&self) -> usize {
        self.wagers
            .iter()
            .filter(|w| matches!(w.result, WagerResult::Won { .. }))
            .count()
    }

    /// `(identity, payout)` for every winning line with a non-zero payout.
    pub fn credits(&self) -> impl Iterator<Item = (&Identity, u64)> {
        self.wagers
            .iter()
            .map(|w| (&w.identity, w.payout()))
            .filter(|(_, p)| *p > 0)
    }
}

fn sum_stakes<'a>(mut wagers: impl Iterator<Item = &'a Wager>) -> Result<u64> {
    wagers.try_fold(0u64, |acc, w| {
        acc.checked_add(w.stake)
            .ok_or_else(|| WagerpotError::Internal("pot total overflows u64".into()))
    })
}

/// Compute the settlement plan for `pending` wagers on `match_id`.
///
/// Wagers that are not `Pending` or belong to another match are ignored.
pub fn compute_plan(
    match_id: MatchId,
    winning_side: &str,
    pending: &[&Wager],
) -> Result<SettlementPlan> {
    let eligible: Vec<&Wager> = pending
        .iter()
        .copied()
        .filter(|w| w.match_id == match_id && w.is_pending())
        .collect();

    let total_pot = sum_stakes(eligible.iter().copied())?;
    let winning_stakes = sum_stakes(eligible.iter().copied().filter(|w| w.side == winning_side))?;

    let multiplier = if winning_stakes > 0 {
        Decimal::from(total_pot)
            .checked_div(Decimal::from(winning_stakes))
            .ok_or_else(|| WagerpotError::Internal("multiplier out of range".into()))?
    } else {
        Decimal::ZERO
    };

    let mut total_paid: u64 = 0;
    let mut wagers = Vec::with_capacity(eligible.len());
    for w in eligible {
        let result = if w.side == winning_side {
            let payout = payout_for(w.stake, multiplier, total_pot, winning_stakes)?;
            total_paid = total_paid
                .checked_add(payout)
                .ok_or_else(|| WagerpotError::Internal("payout total overflows u64".into()))?;
            WagerResult::Won { payout }
        } else {
            WagerResult::Lost
        };
        wagers.push(PlannedWager {
            wager_id: w.id,
            identity: w.identity.clone(),
            stake: w.stake,
            result,
        });
    }

    Ok(SettlementPlan {
        match_id,
        winning_side: winning_side.to_string(),
        total_pot,
        winning_stakes,
        multiplier,
        wagers,
        total_paid,
        forfeited: total_pot.saturating_sub(total_paid),
    })
}

/// `floor(stake × multiplier)`, never above the exact share
/// `floor(stake × total_pot / winning_stakes)`.
fn payout_for(stake: u64, multiplier: Decimal, total_pot: u64, winning_stakes: u64) -> Result<u64> {
    let scaled = Decimal::from(stake)
        .checked_mul(multiplier)
        .ok_or_else(|| WagerpotError::Internal("payout out of range".into()))?
        .floor()
        .to_u64()
        .ok_or_else(|| WagerpotError::Internal("payout out of range".into()))?;

    let exact = u128::from(stake) * u128::from(total_pot) / u128::from(winning_stakes);
    let exact = u64::try_from(exact).unwrap_or(u64::MAX);
    Ok(scaled.min(exact))
}

// ---------------------------------------------------------------------------
// Live pot statistics
// ---------------------------------------------------------------------------

/// Per-side view of the live pot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideStats {
    pub label: String,
    pub staked: u64,
    /// Implied multiplier if this side wins, 2 decimal places.
    pub multiplier: Decimal,
    pub wager_count: usize,
}

/// Live statistics for a match, over pending wagers only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PotStats {
    pub match_id: MatchId,
    pub side_a: SideStats,
    pub side_b: SideStats,
    pub total_pot: u64,
}

/// Implied multiplier for display.
///
/// A side nobody has backed shows the cap (999.99) while the pot has
/// points in it, and 1.00 while the pot is empty.
#[must_use]
pub fn implied_multiplier(total_pot: u64, side_staked: u64) -> Decimal {
    if side_staked > 0 {
        (Decimal::from(total_pot) / Decimal::from(side_staked)).round_dp_with_strategy(
            constants::STATS_MULTIPLIER_DP,
            RoundingStrategy::MidpointAwayFromZero,
        )
    } else if total_pot > 0 {
        Decimal::new(constants::STATS_MULTIPLIER_CAP_CENTS, constants::STATS_MULTIPLIER_DP)
    } else {
        Decimal::new(constants::STATS_MULTIPLIER_NEUTRAL_CENTS, constants::STATS_MULTIPLIER_DP)
    }
}

/// Compute live statistics for `m` from its wagers.
pub fn pot_stats(m: &Match, wagers: &[&Wager]) -> Result<PotStats> {
    let pending: Vec<&Wager> = wagers
        .iter()
        .copied()
        .filter(|w| w.match_id == m.id && w.is_pending())
        .collect();
    let on = |label: &str| -> Result<(u64, usize)> {
        let backing: Vec<&Wager> = pending.iter().copied().filter(|w| w.side == label).collect();
        Ok((sum_stakes(backing.iter().copied())?, backing.len()))
    };

    let (a_staked, a_count) = on(&m.side_a)?;
    let (b_staked, b_count) = on(&m.side_b)?;
    let total_pot = sum_stakes(pending.iter().copied())?;

    Ok(PotStats {
        match_id: m.id,
        side_a: SideStats {
            label: m.side_a.clone(),
            staked: a_staked,
            multiplier: implied_multiplier(total_pot, a_staked),
            wager_count: a_count,
        },
        side_b: SideStats {
            label: m.side_b.clone(),
            staked: b_staked,
            multiplier: implied_multiplier(total_pot, b_staked),
            wager_count: b_count,
        },
        total_pot,
    })
}
