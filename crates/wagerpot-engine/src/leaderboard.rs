//! Points and prediction leaderboards.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use wagerpot_ingress::{Ledger, WagerBook};
use wagerpot_types::{Identity, WagerStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointsRow {
    pub identity: Identity,
    pub name: String,
    pub balance: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredictionRow {
    pub identity: Identity,
    pub name: String,
    pub correct: usize,
    pub total: usize,
    /// Percentage of wagers won, 1 decimal place.
    pub win_rate: Decimal,
}

/// Richest identities first; ties broken by identity.
#[must_use]
pub fn points(ledger: &Ledger, limit: usize) -> Vec<PointsRow> {
    let mut rows: Vec<PointsRow> = ledger
        .entries()
        .map(|e| PointsRow {
            identity: e.identity.clone(),
            name: e.name.clone(),
            balance: e.balance,
        })
        .collect();
    rows.sort_by(|a, b| b.balance.cmp(&a.balance).then_with(|| a.identity.cmp(&b.identity)));
    rows.truncate(limit);
    rows
}

/// Identities with at least one wager, ranked by wins then win rate.
#[must_use]
pub fn predictions(ledger: &Ledger, book: &WagerBook, limit: usize) -> Vec<PredictionRow> {
    let mut rows: Vec<PredictionRow> = ledger
        .entries()
        .filter(|e| !e.wagers.is_empty())
        .map(|e| {
            let total = e.wagers.len();
            let correct = e
                .wagers
                .iter()
                .filter_map(|id| book.get(*id))
                .filter(|w| w.status == WagerStatus::Won)
                .count();
            PredictionRow {
                identity: e.identity.clone(),
                name: e.name.clone(),
                correct,
                total,
                win_rate: win_rate(correct, total),
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        b.correct
            .cmp(&a.correct)
            .then_with(|| b.win_rate.cmp(&a.win_rate))
            .then_with(|| a.identity.cmp(&b.identity))
    });
    rows.truncate(limit);
    rows
}

fn win_rate(correct: usize, total: usize) -> Decimal {
    if total == 0 {
        return Decimal::new(0, 1);
    }
    (Decimal::from(correct) * Decimal::ONE_HUNDRED / Decimal::from(total))
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}
