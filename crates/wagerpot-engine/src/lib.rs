//! # wagerpot-engine
//!
//! The shared engine and its caller-facing surface:
//!
//! - [`WagerEngine`]: match registry, ledger and wager book behind one lock
//! - [`Gateway`]: admission and session checks in front of every engine operation
//! - [`feed`]: upstream match feed port and the adapter that turns its
//!   records into proposals and results
//! - [`session`]: caller credentials and the session lookup port
//! - [`leaderboard`]: points and prediction rankings
//! - [`telemetry`]: tracing subscriber setup
//!
//! ## Request path
//!
//! ```text
//! Credentials ──▶ verify ──▶ admit(rate key) ──▶ authorize ──▶ WagerEngine (locked)
//!                                 │                   │
//!                             RateLimited        Unauthorized
//! ```

pub mod engine;
pub mod feed;
pub mod gateway;
pub mod leaderboard;
pub mod session;
pub mod telemetry;

pub use engine::{
    AppSettings, FeedSettings, LedgerView, MatchSummary, ScoutingAward, SettingsUpdate, WagerEngine,
};
pub use feed::{FeedAdapter, FeedMatch, MatchFeed, MatchProposal, StaticFeed, parse_schedule};
pub use gateway::{AutoResolveOutcome, Gateway, SyncOutcome};
pub use leaderboard::{PointsRow, PredictionRow};
pub use session::{Credentials, InMemorySessions, SessionLookup, VerifiedCaller};
pub use telemetry::{TelemetryConfig, init_tracing};
