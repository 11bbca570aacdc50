//! # wagerpot-ingress
//!
//! **Ingress plane**: everything a caller action touches before settlement.
//!
//! ## Architecture
//!
//! 1. **AdmissionController**: per-caller token bucket, in front of every operation
//! 2. **Ledger**: per-identity point balances and wager history; sole balance mutator
//! 3. **MatchRegistry**: match lifecycle and the one-open-match invariant
//! 4. **WagerBook**: validated wager placement against the open match
//!
//! ## Wager Flow
//!
//! ```text
//! Caller → AdmissionController.admit() → WagerBook.place()
//!        → MatchRegistry.get() (open? side valid?) → Ledger.debit() → Wager (Pending)
//! ```
//!
//! None of these types lock internally except the admission controller;
//! the engine serializes registry, ledger, and book behind one mutex.

pub mod admission;
pub mod ledger;
pub mod registry;
pub mod wager_book;

pub use admission::{Admission, AdmissionController, RateKey};
pub use ledger::Ledger;
pub use registry::MatchRegistry;
pub use wager_book::{PlacedWager, WagerBook};
