//! Pot conservation invariant checker.
//!
//! Invariants checked on every settlement plan before it is applied:
//! ```text
//! Σ payout + forfeited == total_pot
//! Σ payout ≤ total_pot
//! winners exist    ⇒ forfeited ≤ number of winning wagers   (≤ 1 point lost per floor)
//! no winners exist ⇒ Σ payout == 0 and multiplier == 0
//! ```
//! and on the ledger after it is applied:
//! ```text
//! ledger_total_after == ledger_total_before + Σ payout
//! ```
//!
//! A failure here means the pot math is wrong; the plan is discarded.

use rust_decimal::Decimal;
use wagerpot_types::{Result, WagerpotError};

use crate::pari_mutuel::{SettlementPlan, WagerResult};

/// Stateless conservation checks for settlement plans.
pub struct PotConservation;

impl PotConservation {
    /// Verify a plan before any state is touched.
    ///
    /// # Errors
    /// [`WagerpotError::PotInvariantViolation`] describing the first broken rule.
    pub fn verify_plan(plan: &SettlementPlan) -> Result<()> {
        let violation = |reason: String| {
            Err(WagerpotError::PotInvariantViolation {
                reason: format!("{}: {reason}", plan.match_id),
            })
        };

        let summed: u128 = plan.wagers.iter().map(|w| u128::from(w.payout())).sum();
        if summed != u128::from(plan.total_paid) {
            return violation(format!(
                "payout lines sum to {summed} but plan records {}",
                plan.total_paid
            ));
        }
        if plan.total_paid > plan.total_pot {
            return violation(format!(
                "paid {} out of a pot of {}",
                plan.total_paid, plan.total_pot
            ));
        }
        if plan.total_paid + plan.forfeited != plan.total_pot {
            return violation(format!(
                "paid {} + forfeited {} != pot {}",
                plan.total_paid, plan.forfeited, plan.total_pot
            ));
        }

        let winners = plan.winner_count() as u64;
        if winners == 0 {
            if plan.total_paid != 0 || plan.multiplier != Decimal::ZERO {
                return violation("payout without any winning wager".into());
            }
        } else if plan.forfeited > winners {
            return violation(format!(
                "rounding lost {} points across {winners} winning wagers",
                plan.forfeited
            ));
        }

        let staked_on_winner: u128 = plan
            .wagers
            .iter()
            .filter(|w| matches!(w.result, WagerResult::Won { .. }))
            .map(|w| u128::from(w.stake))
            .sum();
        if staked_on_winner != u128::from(plan.winning_stakes) {
            return violation(format!(
                "winning stakes {} but winning lines stake {staked_on_winner}",
                plan.winning_stakes
            ));
        }
        Ok(())
    }

    /// Verify the ledger moved by exactly the amount paid out.
    ///
    /// # Errors
    /// [`WagerpotError::PotInvariantViolation`] if `after != before + paid`.
    pub fn verify_ledger_delta(before: u128, after: u128, paid: u64) -> Result<()> {
        let expected = before + u128::from(paid);
        if after != expected {
            return Err(WagerpotError::PotInvariantViolation {
                reason: format!(
                    "ledger total {after} != {before} before settlement + {paid} paid"
                ),
            });
        }
        Ok(())
    }
}
