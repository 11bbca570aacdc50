//! Match settlement.
//!
//! Resolving a match settles every pending wager on it in one step:
//! 1. Check the match is open and the winner is one of its labels. A
//!    resolved match fails here with `AlreadyResolved`, which is what
//!    makes a second resolve a no-op.
//! 2. Compute the pari-mutuel plan
//! 3. Verify pot conservation on the plan
//! 4. Pre-check every ledger credit
//! 5. Apply: match → Resolved, wagers → Won/Lost, credit winners
//! 6. Produce the settlement receipt
//!
//! Steps 1–4 only read state, so any failure leaves everything untouched.
//! Step 5 runs only once every write it performs is known to succeed.

use chrono::{DateTime, Utc};
use wagerpot_ingress::{Ledger, MatchRegistry, WagerBook};
use wagerpot_types::{MatchId, Result, Wager, WagerpotError};

use crate::pari_mutuel::{SettlementPlan, WagerResult, compute_plan};
use crate::pot_conservation::PotConservation;
use crate::receipt::{SettlementOutcome, settlement_digest};

/// Settles matches against the registry, wager book, and ledger.
///
/// Holds no state of its own. Callers must hold exclusive access to all
/// three for the duration of [`Settler::settle`]; the engine does this
/// with its aggregate lock.
#[derive(Debug)]
pub struct Settler;

impl Settler {
    /// Compute the plan for resolving `match_id` with `winning_side`, without
    /// applying it.
    ///
    /// # Errors
    /// `AlreadyResolved`, `MatchNotFound`, `InvalidSide`, or
    /// `PotInvariantViolation`.
    pub fn plan(
        registry: &MatchRegistry,
        book: &WagerBook,
        ledger: &Ledger,
        match_id: MatchId,
        winning_side: &str,
    ) -> Result<SettlementPlan> {
        registry.check_resolvable(match_id, winning_side)?;

        let pending = book.pending_for_match(match_id);
        let plan = compute_plan(match_id, winning_side, &pending)?;

        PotConservation::verify_plan(&plan)?;
        ledger.check_credits(plan.credits())?;
        Ok(plan)
    }

    /// Resolve `match_id` with `winning_side` and settle all its pending wagers.
    ///
    /// # Errors
    /// - `AlreadyResolved` if the match is no longer open
    /// - `MatchNotFound` if the match does not exist
    /// - `InvalidSide` if `winning_side` is not one of the match's labels
    /// - `PotInvariantViolation` if the computed plan fails conservation
    ///
    /// On error nothing has been modified.
    pub fn settle(
        registry: &mut MatchRegistry,
        book: &mut WagerBook,
        ledger: &mut Ledger,
        match_id: MatchId,
        winning_side: &str,
        at: DateTime<Utc>,
    ) -> Result<SettlementOutcome> {
        let plan = Self::plan(registry, book, ledger, match_id, winning_side)?;

        // ── APPLY ────────────────────────────────────────────────────────
        let ledger_before = ledger.total_points();
        let resolved_match = registry.resolve(match_id, winning_side, at)?;

        let mut settled: Vec<Wager> = Vec::with_capacity(plan.wagers.len());
        for line in &plan.wagers {
            let wager = book.get_mut(line.wager_id).ok_or_else(|| {
                WagerpotError::Internal(format!("{} vanished during settlement", line.wager_id))
            })?;
            match line.result {
                WagerResult::Won { payout } => {
                    wager.mark_won(payout, plan.multiplier)?;
                    ledger.credit(&line.identity, payout)?;
                }
                WagerResult::Lost => wager.mark_lost()?,
            }
            settled.push(wager.clone());
        }

        if let Err(err) = PotConservation::verify_ledger_delta(
            ledger_before,
            ledger.total_points(),
            plan.total_paid,
        ) {
            tracing::error!(match_id = match_id.0, error = %err, "Ledger moved by more than the payout");
        }

        if plan.winning_stakes == 0 && plan.total_pot > 0 {
            tracing::warn!(
                match_id = match_id.0,
                winner = winning_side,
                forfeited = plan.forfeited,
                "Nobody backed the winner; pot forfeited"
            );
        }
        tracing::info!(
            match_id = match_id.0,
            winner = winning_side,
            total_pot = plan.total_pot,
            winning_stakes = plan.winning_stakes,
            multiplier = %plan.multiplier,
            wagers = settled.len(),
            total_paid = plan.total_paid,
            forfeited = plan.forfeited,
            "Match settled"
        );

        let digest = settlement_digest(match_id, winning_side, &settled);
        Ok(SettlementOutcome {
            resolved_match,
            total_pot: plan.total_pot,
            winning_stakes: plan.winning_stakes,
            multiplier: plan.multiplier,
            wagers: settled,
            total_paid: plan.total_paid,
            forfeited: plan.forfeited,
            digest,
            settled_at: at,
        })
    }
}
