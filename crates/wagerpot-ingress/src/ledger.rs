//! Point ledger.
//!
//! Tracks one [`LedgerEntry`] per identity. The ledger is the only thing
//! that changes balances: wager placement debits it, settlement and
//! scouting rewards credit it, and administrators can bulk-reset it.
//! All mutations are atomic: either the full operation succeeds or the
//! balance is unchanged.

use std::collections::HashMap;

use wagerpot_types::{Identity, LedgerEntry, Result, WagerId, WagerpotError};

/// Owns every identity's balance and wager history.
pub struct Ledger {
    entries: HashMap<Identity, LedgerEntry>,
    /// Seed for lazily created entries.
    starting_balance: u64,
}

impl Ledger {
    /// Create an empty ledger seeding new entries with `starting_balance`.
    #[must_use]
    pub fn new(starting_balance: u64) -> Self {
        Self {
            entries: HashMap::new(),
            starting_balance,
        }
    }

    /// Change the seed for entries created from now on.
    pub fn set_starting_balance(&mut self, starting_balance: u64) {
        self.starting_balance = starting_balance;
    }

    #[must_use]
    pub fn starting_balance(&self) -> u64 {
        self.starting_balance
    }

    /// Fetch the entry for `identity`, creating it with the seed balance if needed.
    pub fn get_or_create(&mut self, identity: &Identity) -> &mut LedgerEntry {
        let seed = self.starting_balance;
        self.entries
            .entry(identity.clone())
            .or_insert_with(|| LedgerEntry::seeded(identity.clone(), seed))
    }

    /// Existing entry only; never creates.
    #[must_use]
    pub fn get(&self, identity: &Identity) -> Option<&LedgerEntry> {
        self.entries.get(identity)
    }

    /// Balance as the identity would see it (seed if no entry yet).
    #[must_use]
    pub fn balance_of(&self, identity: &Identity) -> u64 {
        self.entries
            .get(identity)
            .map_or(self.starting_balance, |e| e.balance)
    }

    /// Subtract `amount`, returning the remaining balance.
    ///
    /// # Errors
    /// `InsufficientBalance` if balance < amount; the balance is untouched.
    pub fn debit(&mut self, identity: &Identity, amount: u64) -> Result<u64> {
        let entry = self.get_or_create(identity);
        if entry.balance < amount {
            return Err(WagerpotError::InsufficientBalance {
                needed: amount,
                available: entry.balance,
            });
        }
        entry.balance -= amount;
        Ok(entry.balance)
    }

    /// Add `amount`, returning the new balance. Crediting zero is a no-op.
    ///
    /// # Errors
    /// `Internal` if the balance would overflow.
    pub fn credit(&mut self, identity: &Identity, amount: u64) -> Result<u64> {
        if amount == 0 {
            return Ok(self.balance_of(identity));
        }
        let entry = self.get_or_create(identity);
        entry.balance = entry
            .balance
            .checked_add(amount)
            .ok_or_else(|| WagerpotError::Internal(format!("balance overflow for {identity}")))?;
        Ok(entry.balance)
    }

    /// Check that every `(identity, amount)` credit would succeed, without applying any.
    ///
    /// Amounts for the same identity are accumulated.
    pub fn check_credits<'a, I>(&self, credits: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a Identity, u64)>,
    {
        let mut pending: HashMap<&Identity, u64> = HashMap::new();
        for (identity, amount) in credits {
            let running = pending
                .entry(identity)
                .or_insert_with(|| self.balance_of(identity));
            *running = running.checked_add(amount).ok_or_else(|| {
                WagerpotError::Internal(format!("balance overflow for {identity}"))
            })?;
        }
        Ok(())
    }

    /// Append a wager to the identity's history.
    pub fn record_wager(&mut self, identity: &Identity, wager_id: WagerId) {
        self.get_or_create(identity).wagers.push(wager_id);
    }

    /// Overwrite every balance with `new_balance`. Wager history is kept.
    /// Returns the number of entries reset.
    pub fn reset_all(&mut self, new_balance: u64) -> usize {
        for entry in self.entries.values_mut() {
            entry.balance = new_balance;
        }
        self.entries.len()
    }

    /// Set the display name used by name lookups. Empty names are ignored.
    pub fn set_display_name(&mut self, identity: &Identity, name: &str) {
        let name = name.trim();
        if !name.is_empty() {
            self.get_or_create(identity).name = name.to_string();
        }
    }

    /// Case-insensitive, whitespace-trimmed display-name lookup.
    #[must_use]
    pub fn find_by_display_name(&self, name: &str) -> Option<&LedgerEntry> {
        let mut matches: Vec<&LedgerEntry> = self
            .entries
            .values()
            .filter(|e| e.display_name_matches(name))
            .collect();
        // Deterministic pick when two users share a display name.
        matches.sort_by(|a, b| a.identity.cmp(&b.identity));
        matches.into_iter().next()
    }

    /// Sum of all balances.
    #[must_use]
    pub fn total_points(&self) -> u128 {
        self.entries.values().map(|e| u128::from(e.balance)).sum()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(wagerpot_types::constants::DEFAULT_STARTING_BALANCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identity {
        Identity::from(s)
    }

    #[test]
    fn first_reference_seeds_balance() {
        let mut ledger = Ledger::new(100);
        let entry = ledger.get_or_create(&id("alice"));
        assert_eq!(entry.balance, 100);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn debit_reduces_balance() {
        let mut ledger = Ledger::new(100);
        assert_eq!(ledger.debit(&id("alice"), 40).unwrap(), 60);
        assert_eq!(ledger.balance_of(&id("alice")), 60);
    }

    #[test]
    fn debit_insufficient_fails_and_leaves_balance() {
        let mut ledger = Ledger::new(100);
        let err = ledger.debit(&id("alice"), 101).unwrap_err();
        assert_eq!(
            err,
            WagerpotError::InsufficientBalance {
                needed: 101,
                available: 100
            }
        );
        assert_eq!(ledger.balance_of(&id("alice")), 100);
    }

    #[test]
    fn debit_exact_balance_reaches_zero() {
        let mut ledger = Ledger::new(100);
        assert_eq!(ledger.debit(&id("alice"), 100).unwrap(), 0);
        assert!(ledger.debit(&id("alice"), 1).is_err());
    }

    #[test]
    fn credit_adds_and_zero_is_noop() {
        let mut ledger = Ledger::new(100);
        assert_eq!(ledger.credit(&id("bob"), 0).unwrap(), 100);
        assert!(ledger.get(&id("bob")).is_none());
        assert_eq!(ledger.credit(&id("bob"), 25).unwrap(), 125);
    }

    #[test]
    fn credit_overflow_is_rejected() {
        let mut ledger = Ledger::new(u64::MAX);
        let err = ledger.credit(&id("whale"), 1).unwrap_err();
        assert!(matches!(err, WagerpotError::Internal(_)));
        assert_eq!(ledger.balance_of(&id("whale")), u64::MAX);
    }

    #[test]
    fn check_credits_accumulates_per_identity() {
        let mut ledger = Ledger::new(u64::MAX - 10);
        ledger.get_or_create(&id("a"));
        let a = id("a");
        assert!(ledger.check_credits([(&a, 5), (&a, 5)]).is_ok());
        assert!(ledger.check_credits([(&a, 6), (&a, 5)]).is_err());
    }

    #[test]
    fn reset_all_keeps_history() {
        let mut ledger = Ledger::new(100);
        ledger.debit(&id("a"), 30).unwrap();
        ledger.record_wager(&id("a"), WagerId(1));
        ledger.credit(&id("b"), 50).unwrap();

        assert_eq!(ledger.reset_all(100), 2);
        assert_eq!(ledger.balance_of(&id("a")), 100);
        assert_eq!(ledger.balance_of(&id("b")), 100);
        assert_eq!(ledger.get(&id("a")).unwrap().wagers, vec![WagerId(1)]);
    }

    #[test]
    fn display_name_lookup() {
        let mut ledger = Ledger::new(100);
        ledger.set_display_name(&id("u1"), "Grace Hopper");
        ledger.get_or_create(&id("u2"));

        let found = ledger.find_by_display_name(" grace hopper").unwrap();
        assert_eq!(found.identity, id("u1"));
        assert!(ledger.find_by_display_name("u2").is_some());
        assert!(ledger.find_by_display_name("").is_none());
        assert!(ledger.find_by_display_name("nobody").is_none());
    }

    #[test]
    fn total_points_sums_all_entries() {
        let mut ledger = Ledger::new(100);
        ledger.get_or_create(&id("a"));
        ledger.debit(&id("b"), 20).unwrap();
        assert_eq!(ledger.total_points(), 180);
    }
}
