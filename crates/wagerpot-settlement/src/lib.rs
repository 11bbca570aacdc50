//! # wagerpot-settlement
//!
//! **Settlement plane**: turns a declared winner into payouts.
//!
//! ## Architecture
//!
//! When a match resolves, the [`Settler`]:
//! 1. Refuses matches that are not open, so nothing settles twice
//! 2. Computes the pari-mutuel plan: pot, multiplier, per-wager payout
//! 3. Verifies pot conservation on the plan ([`PotConservation`])
//! 4. Pre-checks every ledger credit so the apply step cannot fail halfway
//! 5. Applies: match → Resolved, wagers → Won/Lost, winners credited
//! 6. Emits a [`SettlementOutcome`] with a SHA-256 digest for audit
//!
//! ## Numeric policy
//!
//! Stakes and balances are integers. The multiplier is an exact decimal
//! quotient `total_pot / winning_stakes`; each payout is
//! `floor(stake × multiplier)`. Fractional remainders are not
//! redistributed, so a pot may leak a few points per settlement.

pub mod pari_mutuel;
pub mod pot_conservation;
pub mod receipt;
pub mod settler;

pub use pari_mutuel::{PotStats, SettlementPlan, SideStats, WagerResult, compute_plan, pot_stats};
pub use pot_conservation::PotConservation;
pub use receipt::SettlementOutcome;
pub use settler::Settler;
