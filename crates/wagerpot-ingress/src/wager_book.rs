//! Wager book: validated placement and per-match wager storage.
//!
//! Wagers are placed only against an open match, debiting the ledger in
//! the same `&mut` call, so a wager either exists with its stake debited
//! or does not exist at all.

use std::collections::HashMap;

use wagerpot_types::{Identity, MatchId, Result, Wager, WagerId, WagerpotError};

use crate::ledger::Ledger;
use crate::registry::MatchRegistry;

/// A freshly placed wager and the bettor's remaining balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedWager {
    pub wager: Wager,
    pub remaining_balance: u64,
}

/// All wagers ever placed, indexed by match.
pub struct WagerBook {
    /// Wagers in placement order; `wagers[i].id == WagerId(i + 1)`.
    wagers: Vec<Wager>,
    /// Positions in `wagers` for each match.
    by_match: HashMap<MatchId, Vec<usize>>,
}

impl WagerBook {
    #[must_use]
    pub fn new() -> Self {
        Self {
            wagers: Vec::new(),
            by_match: HashMap::new(),
        }
    }

    /// Validate and place a wager, debiting `stake` from `identity`.
    ///
    /// Checks run in this order and stop at the first failure:
    /// 1. stake > 0 (`Validation`)
    /// 2. match exists (`MatchNotFound`)
    /// 3. match is open (`MatchClosed`)
    /// 4. side is one of the match's labels (`InvalidSide`)
    /// 5. balance covers the stake (`InsufficientBalance`)
    pub fn place(
        &mut self,
        registry: &MatchRegistry,
        ledger: &mut Ledger,
        identity: &Identity,
        match_id: MatchId,
        side: &str,
        stake: u64,
    ) -> Result<PlacedWager> {
        if stake == 0 {
            return Err(WagerpotError::validation("stake must be greater than 0"));
        }
        let m = registry.require(match_id)?;
        if !m.is_open() {
            return Err(WagerpotError::MatchClosed(match_id));
        }
        if !m.has_side(side) {
            return Err(WagerpotError::InvalidSide {
                match_id,
                side: side.to_string(),
            });
        }

        let remaining_balance = ledger.debit(identity, stake)?;

        let id = self.wagers.last().map_or(WagerId::FIRST, |w| w.id.next());
        let wager = Wager::pending(id, identity.clone(), match_id, side, stake);
        self.by_match
            .entry(match_id)
            .or_default()
            .push(self.wagers.len());
        self.wagers.push(wager.clone());
        ledger.record_wager(identity, id);

        tracing::debug!(
            wager_id = id.0,
            match_id = match_id.0,
            identity = %identity,
            side,
            stake,
            remaining_balance,
            "Wager placed"
        );

        Ok(PlacedWager {
            wager,
            remaining_balance,
        })
    }

    #[must_use]
    pub fn get(&self, id: WagerId) -> Option<&Wager> {
        let idx = usize::try_from(id.0.checked_sub(1)?).ok()?;
        self.wagers.get(idx).filter(|w| w.id == id)
    }

    pub fn get_mut(&mut self, id: WagerId) -> Option<&mut Wager> {
        let idx = usize::try_from(id.0.checked_sub(1)?).ok()?;
        self.wagers.get_mut(idx).filter(|w| w.id == id)
    }

    /// Every wager on `match_id`, any status, in placement order.
    #[must_use]
    pub fn for_match(&self, match_id: MatchId) -> Vec<&Wager> {
        self.by_match
            .get(&match_id)
            .map(|idxs| idxs.iter().filter_map(|&i| self.wagers.get(i)).collect())
            .unwrap_or_default()
    }

    /// Pending wagers on `match_id`, in placement order.
    #[must_use]
    pub fn pending_for_match(&self, match_id: MatchId) -> Vec<&Wager> {
        self.for_match(match_id)
            .into_iter()
            .filter(|w| w.is_pending())
            .collect()
    }

    /// Resolve a list of wager IDs to wagers, skipping unknown IDs.
    #[must_use]
    pub fn lookup_all(&self, ids: &[WagerId]) -> Vec<Wager> {
        ids.iter().filter_map(|id| self.get(*id)).cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.wagers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.wagers.is_empty()
    }
}

impl Default for WagerBook {
    fn default() -> Self {
        Self::new()
    }
}
