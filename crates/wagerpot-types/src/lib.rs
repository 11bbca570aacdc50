//! # wagerpot-types
//!
//! Shared types, errors, and configuration for the **Wagerpot** wagering engine.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`MatchId`], [`WagerId`], [`Identity`]
//! - **Match model**: [`Match`], [`MatchStatus`], [`MatchSource`]
//! - **Wager model**: [`Wager`], [`WagerStatus`]
//! - **Ledger model**: [`LedgerEntry`]
//! - **Configuration**: [`EngineConfig`], [`RateLimitConfig`], [`FeedConfig`]
//! - **Errors**: [`WagerpotError`] with `WP_ERR_` prefix codes, [`ErrorKind`]
//! - **Constants**: system-wide limits and defaults

pub mod config;
pub mod constants;
pub mod contest;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod wager;

// Re-export all primary types at crate root for ergonomic imports:
//   use wagerpot_types::{Match, Wager, LedgerEntry, ...};

pub use config::*;
pub use contest::*;
pub use error::*;
pub use ids::*;
pub use ledger::*;
pub use wager::*;

// Constants are accessed via `wagerpot_types::constants::FOO`
// (not re-exported to avoid name collisions).
