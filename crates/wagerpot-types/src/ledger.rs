//! Ledger entry type.
//!
//! Every identity owns exactly one entry, created lazily with a seeded
//! starting balance. Balances are unsigned, so they can never go negative;
//! a debit that would underflow is rejected by the ledger, not clamped.

use serde::{Deserialize, Serialize};

use crate::{Identity, WagerId};

/// Point balance and wager history for one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub identity: Identity,
    /// Display name; defaults to the identity string.
    pub name: String,
    pub balance: u64,
    /// Wager IDs in placement order.
    pub wagers: Vec<WagerId>,
}

impl LedgerEntry {
    /// Create an entry seeded with `starting_balance`.
    #[must_use]
    pub fn seeded(identity: Identity, starting_balance: u64) -> Self {
        Self {
            name: identity.as_str().to_string(),
            identity,
            balance: starting_balance,
            wagers: Vec::new(),
        }
    }

    /// Whether `name` matches this entry's display name, ignoring case and
    /// surrounding whitespace.
    #[must_use]
    pub fn display_name_matches(&self, name: &str) -> bool {
        let wanted = name.trim();
        !wanted.is_empty() && self.name.trim().to_lowercase() == wanted.to_lowercase()
    }
}
