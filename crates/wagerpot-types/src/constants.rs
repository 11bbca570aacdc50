//! System-wide constants for the Wagerpot wagering engine.

/// Points seeded into a ledger entry the first time an identity is seen.
pub const DEFAULT_STARTING_BALANCE: u64 = 100;

/// Points awarded for a completed scouting session.
pub const DEFAULT_SCOUTING_REWARD: u64 = 25;

/// Default token-bucket capacity (burst size) per caller key.
pub const DEFAULT_RATE_LIMIT_CAPACITY: u32 = 5;

/// Default token-bucket refill rate (tokens per second).
pub const DEFAULT_RATE_LIMIT_PER_SECOND: f64 = 5.0;

/// Smallest refill rate used as a divisor when computing retry-after hints.
pub const MIN_REFILL_RATE_DIVISOR: f64 = 0.0001;

/// Buckets idle for longer than this are eligible for eviction (seconds).
pub const DEFAULT_BUCKET_IDLE_TTL_SECS: u64 = 600;

/// Number of rows returned by each leaderboard.
pub const LEADERBOARD_SIZE: usize = 50;

/// Decimal places used when reporting implied multipliers.
pub const STATS_MULTIPLIER_DP: u32 = 2;

/// Implied multiplier shown for a side with no stake while the pot is non-empty
/// (999.99).
pub const STATS_MULTIPLIER_CAP_CENTS: i64 = 99_999;

/// Implied multiplier shown for either side while the pot is empty (1.00).
pub const STATS_MULTIPLIER_NEUTRAL_CENTS: i64 = 100;

/// Competition level of upstream matches eligible for scheduling.
pub const FEED_QUALIFICATION_LEVEL: &str = "qm";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "Wagerpot";
